use crate::config::CodepadConfig;
use anyhow::Result;
use codepad_runtime::language;
use codepad_runtime::{ConnectivityMonitor, Execution, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn execute(
    file: PathBuf,
    lang: Option<String>,
    offline: bool,
    json: bool,
    config: CodepadConfig,
) -> Result<bool> {
    if !file.is_file() {
        anyhow::bail!("Source file not found: {}", file.display());
    }
    let source = std::fs::read_to_string(&file)?;

    let language = match lang {
        Some(lang) => lang,
        None => match language::tag_for_path(&file) {
            Some(tag) => tag.to_string(),
            None => anyhow::bail!(
                "Cannot infer the language of {}; pass --lang",
                file.display()
            ),
        },
    };

    let monitor = ConnectivityMonitor::new(!offline);
    let orchestrator = Arc::new(Orchestrator::from_config(&config.runtime, monitor.handle())?);

    let stopper = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && orchestrator.cancel() {
                warn!("Stop requested");
            }
        })
    };

    info!("Running {} as {}", file.display(), language);
    let execution = orchestrator.execute(&source, &language).await;
    stopper.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        print_execution(&execution);
    }

    Ok(execution.result.is_success())
}

fn print_execution(execution: &Execution) {
    if let Some(advisory) = &execution.advisory {
        eprintln!("⚠️ {}", advisory);
    }

    println!("{}", execution.result.output());

    let mut stats = Vec::new();
    if let Some(status) = execution.result.status() {
        stats.push(format!("Status: {}", status));
    }
    if let Some(time) = execution.result.time() {
        stats.push(format!("Time: {}", time));
    }
    if let Some(memory) = execution.result.memory() {
        stats.push(format!("Memory: {}", memory));
    }
    if !stats.is_empty() {
        println!("\n{}", stats.join(" | "));
    }
}
