//! `ltm list`: show config files, their external tools and pipelines.

use ltm_config::{PipelineFile, load_all_configs};
use std::path::Path;
use std::process::ExitCode;

use crate::output;

pub fn run(config: &Path) -> ExitCode {
    let configs = match load_all_configs(config) {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(output::EXIT_BUILD_ERROR);
        }
    };

    if configs.is_empty() {
        println!("No pipeline files found in {}", config.display());
        return ExitCode::SUCCESS;
    }

    for (label, loaded) in &configs {
        match loaded {
            Ok(loaded) => print!("{}", render_file(label, &loaded.path, &loaded.file)),
            Err(e) => println!("[{label}] unreadable: {e}\n"),
        }
    }
    ExitCode::SUCCESS
}

fn render_file(label: &str, path: &Path, file: &PipelineFile) -> String {
    let mut text = format!("[{label}] {}\n", path.display());
    if !file.external_tools.is_empty() {
        text.push_str("  tools:\n");
        for (name, locator) in &file.external_tools {
            text.push_str(&format!("    {name} = {locator}\n"));
        }
    }
    text.push_str("  pipelines:\n");
    if file.pipelines.is_empty() {
        text.push_str("    (none)\n");
    }
    for (name, agent) in &file.pipelines {
        text.push_str(&format!("    * {label}::{name} ({})", agent.class));
        if let Some(description) = agent.description.as_deref() {
            text.push_str(&format!(" - {}", description.trim()));
        }
        text.push('\n');
    }
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_listing_shows_tools_and_qualified_names() {
        let file = PipelineFile::from_yaml(
            r#"
external_tools:
  fib: external_tools.tools:calculate_fibonacci
pipelines:
  math:
    class: ThinkingAgent
    description: Does math
    tools: [fib]
"#,
        )
        .unwrap();
        let text = render_file("demo", Path::new("pipelines/demo.yaml"), &file);
        assert!(text.starts_with("[demo] pipelines/demo.yaml\n"));
        assert!(text.contains("    fib = external_tools.tools:calculate_fibonacci\n"));
        assert!(text.contains("    * demo::math (ThinkingAgent) - Does math\n"));
    }
}
