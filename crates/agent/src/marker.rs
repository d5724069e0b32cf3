//! Completion marker detection.
//!
//! Engine output is free-form text, so marker detection is policy: a set of
//! rules for "solved", a set for "unsolvable", and the delimiter that
//! separates the answer from the status block. Anything that matches
//! neither set means "keep going".

use ltm_config::{CompletionConfig, MarkerRuleConfig};
use regex_lite::Regex;

/// Delimiter the default prompts ask the engine to put before its status.
pub const DEFAULT_ANSWER_DELIMITER: &str = "FINAL RESULTS";

#[derive(Debug, Clone)]
pub enum MarkerRule {
    /// Every phrase must appear, compared case-insensitively
    AllOf(Vec<String>),
    Pattern(Regex),
}

impl MarkerRule {
    pub fn all_of<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::AllOf(
            phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        )
    }

    fn from_config(rule: &MarkerRuleConfig) -> Result<Self, regex_lite::Error> {
        Ok(match rule {
            MarkerRuleConfig::Pattern { regex } => Self::Pattern(Regex::new(regex)?),
            MarkerRuleConfig::AllOf(phrases) => Self::all_of(phrases),
            MarkerRuleConfig::Phrase(phrase) => Self::all_of([phrase]),
        })
    }

    fn matches(&self, text: &str, lowered: &str) -> bool {
        match self {
            Self::AllOf(phrases) => {
                !phrases.is_empty() && phrases.iter().all(|p| lowered.contains(p.as_str()))
            }
            Self::Pattern(regex) => regex.is_match(text),
        }
    }
}

/// What a piece of engine output says about the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Solved,
    Unsolvable,
    Continue,
}

#[derive(Debug, Clone)]
pub struct CompletionPolicy {
    solved: Vec<MarkerRule>,
    unsolvable: Vec<MarkerRule>,
    answer_delimiter: String,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            solved: vec![MarkerRule::all_of(["final results", "status: solved"])],
            unsolvable: vec![MarkerRule::all_of(["final results", "status: unsolvable"])],
            answer_delimiter: DEFAULT_ANSWER_DELIMITER.to_string(),
        }
    }
}

impl CompletionPolicy {
    /// Build a policy from the `completion` section. Empty rule lists keep
    /// the default rules.
    pub fn from_config(config: Option<&CompletionConfig>) -> Result<Self, regex_lite::Error> {
        let mut policy = Self::default();
        let Some(config) = config else {
            return Ok(policy);
        };
        if !config.solved.is_empty() {
            policy.solved = config
                .solved
                .iter()
                .map(MarkerRule::from_config)
                .collect::<Result<_, _>>()?;
        }
        if !config.unsolvable.is_empty() {
            policy.unsolvable = config
                .unsolvable
                .iter()
                .map(MarkerRule::from_config)
                .collect::<Result<_, _>>()?;
        }
        if let Some(delimiter) = config.answer_delimiter.as_deref()
            && !delimiter.trim().is_empty()
        {
            policy.answer_delimiter = delimiter.trim().to_string();
        }
        Ok(policy)
    }

    pub fn answer_delimiter(&self) -> &str {
        &self.answer_delimiter
    }

    /// Classify engine output. A solved marker wins over an unsolvable one.
    pub fn detect(&self, text: &str) -> Completion {
        let lowered = text.to_lowercase();
        if self.solved.iter().any(|r| r.matches(text, &lowered)) {
            Completion::Solved
        } else if self.unsolvable.iter().any(|r| r.matches(text, &lowered)) {
            Completion::Unsolvable
        } else {
            Completion::Continue
        }
    }

    /// The answer part of `text`: everything before the delimiter, or the
    /// whole text when nothing precedes it.
    pub fn extract_answer(&self, text: &str) -> String {
        match find_ignore_ascii_case(text, &self.answer_delimiter) {
            Some(at) => {
                let before = text[..at].trim();
                if before.is_empty() {
                    text.trim().to_string()
                } else {
                    before.to_string()
                }
            }
            None => text.trim().to_string(),
        }
    }
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        haystack
            .get(i..i + needle.len())
            .is_some_and(|window| window.eq_ignore_ascii_case(needle))
    })
}

/// Unchecked `- [ ]` items in `text`, in order.
pub fn unresolved_requirements(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim_start();
            line.strip_prefix("- [ ]")
                .or_else(|| line.strip_prefix("* [ ]"))
                .map(|item| item.trim().to_string())
        })
        .filter(|item| !item.is_empty())
        .collect()
}
