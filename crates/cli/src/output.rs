//! Terminal rendering of outcomes, and exit codes.

use ltm_agent::{Outcome, OutcomeStatus};
use std::fmt::Write;

pub const EXIT_SOLVED: u8 = 0;
pub const EXIT_INCOMPLETE: u8 = 2;
pub const EXIT_FAILED: u8 = 3;
pub const EXIT_BUILD_ERROR: u8 = 4;

/// Argument and result previews are cut to this many characters.
const PREVIEW_CHARS: usize = 200;

pub fn exit_code(status: &OutcomeStatus) -> u8 {
    match status {
        OutcomeStatus::Solved => EXIT_SOLVED,
        OutcomeStatus::Incomplete(_) => EXIT_INCOMPLETE,
        OutcomeStatus::Failed(_) => EXIT_FAILED,
    }
}

/// The full trace of a run: every agent, its iterations and tool calls,
/// children indented under their parent.
pub fn render_trace(outcome: &Outcome) -> String {
    let mut out = String::new();
    render_node(&mut out, outcome, 0);
    out
}

fn render_node(out: &mut String, outcome: &Outcome, depth: usize) {
    let pad = "  ".repeat(depth);
    let _ = writeln!(out, "{pad}▸ {} [{}] {}", outcome.agent, outcome.kind, outcome.status);
    if let Some(route) = &outcome.route {
        let _ = writeln!(out, "{pad}  route: {route}");
    }

    if let Some(session) = &outcome.session {
        for iteration in session.iterations() {
            let _ = writeln!(
                out,
                "{pad}  iteration {} ({})",
                iteration.sequence, iteration.status
            );
            for line in iteration.text.trim().lines() {
                let _ = writeln!(out, "{pad}    │ {line}");
            }
            for call in &iteration.tool_calls {
                let mark = if call.is_success() { "→" } else { "✗" };
                let _ = writeln!(
                    out,
                    "{pad}    {mark} {}({}) {}",
                    call.tool,
                    preview(&call.arguments.to_string()),
                    preview(&call.render_result())
                );
            }
        }
    }

    for child in &outcome.children {
        render_node(out, child, depth + 1);
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltm_agent::{IncompleteReason, IterationStatus, SessionRecorder};
    use ltm_config::AgentKind;
    use ltm_core::error::ReasoningEngineError;

    #[test]
    fn exit_codes_follow_status() {
        assert_eq!(exit_code(&OutcomeStatus::Solved), 0);
        assert_eq!(
            exit_code(&OutcomeStatus::Incomplete(IncompleteReason::MaxIterations { limit: 1 })),
            2
        );
        assert_eq!(
            exit_code(&OutcomeStatus::Failed(ReasoningEngineError::Timeout("30s".into()))),
            3
        );
    }

    #[test]
    fn trace_nests_children_and_shows_iterations() {
        let mut recorder = SessionRecorder::new("planner", "q");
        recorder.record("Plan: call fib", Vec::new(), IterationStatus::Continuing);
        recorder.record("FINAL RESULTS\n55\nSTATUS: SOLVED", Vec::new(), IterationStatus::Solved);
        let session = recorder.finish(OutcomeStatus::Solved, "55");

        let child = Outcome::new("fib_agent", AgentKind::Simple, OutcomeStatus::Solved, "55");
        let outcome = Outcome::from_session(AgentKind::Thinking, session).with_children(vec![child]);

        let trace = render_trace(&outcome);
        assert!(trace.starts_with("▸ planner [thinking] solved\n"));
        assert!(trace.contains("  iteration 1 (continuing)\n    │ Plan: call fib\n"));
        assert!(trace.contains("  iteration 2 (solved)\n"));
        assert!(trace.contains("\n  ▸ fib_agent [simple] solved\n"));
    }

    #[test]
    fn long_previews_are_cut() {
        let long = "x".repeat(500);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
