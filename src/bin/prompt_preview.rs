//! Fetch the configured feeds and print the composed prompt. Never calls the
//! generative service and never publishes.

use std::process::ExitCode;
use std::time::Duration;

use synapsed_content::compose::PromptComposer;
use synapsed_content::ingest::{aggregate, AggregateOptions};
use synapsed_content::pipeline::rss_providers;
use synapsed_content::{init_tracing, load_dotenv, PipelineConfig};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    init_tracing();

    match preview().await {
        Ok(prompt) => {
            println!("{prompt}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "prompt preview failed");
            ExitCode::FAILURE
        }
    }
}

async fn preview() -> anyhow::Result<String> {
    let cfg = PipelineConfig::load_default()?;
    let providers = rss_providers(&cfg)?;
    let headlines = aggregate(
        &providers,
        AggregateOptions {
            fetch_timeout: Duration::from_secs(cfg.ingest.fetch_timeout_secs),
            max_concurrency: cfg.ingest.max_concurrency,
        },
    )
    .await?;

    for r in &headlines.reports {
        eprintln!(
            "{:<14} {:<12} {:>2} {}",
            r.source_id,
            r.category.as_str(),
            r.kept,
            r.error.as_deref().unwrap_or("")
        );
    }

    let composer = PromptComposer::from_path(&cfg.generation.prompt_path)?;
    Ok(composer.compose_categories(&headlines)?.into_string())
}
