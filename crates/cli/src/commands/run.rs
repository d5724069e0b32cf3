//! `ltm run`: build a pipeline and run one query through it.

use ltm_agent::{PipelineBuilder, RunOptions};
use ltm_config::{EngineSettings, resolve_pipeline};
use ltm_providers::OpenAiCompatEngine;
use ltm_tools::ToolCatalog;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::output;

pub async fn run(config: &Path, reference: &str, query: &str, timeout: Option<u64>) -> ExitCode {
    let spec = match resolve_pipeline(config, reference)
        .and_then(|(loaded, name)| loaded.file.pipeline_spec(&name))
    {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(output::EXIT_BUILD_ERROR);
        }
    };

    let settings = EngineSettings::from_env();
    if !settings.has_api_key() {
        warn!(env = %settings.api_key_env, "No API key set; the first engine call will fail");
    }
    let engine = OpenAiCompatEngine::from_settings(&settings);

    let pipeline = match PipelineBuilder::new(Arc::new(engine), ToolCatalog::builtin())
        .with_default_model(settings.default_model.clone())
        .build(&spec)
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("error: failed to build pipeline '{reference}': {e}");
            return ExitCode::from(output::EXIT_BUILD_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping the run");
            on_signal.cancel();
        }
    });

    let options = RunOptions {
        cancel,
        timeout: timeout.map(Duration::from_secs),
        events: None,
    };
    let outcome = pipeline.run_with(query, options).await;

    println!("{}", output::render_trace(&outcome));
    println!("Answer:\n{}\n", outcome.answer.trim());
    println!("Status: {}", outcome.status);

    ExitCode::from(output::exit_code(&outcome.status))
}
