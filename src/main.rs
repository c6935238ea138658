//! synapsed-content: one pipeline run, for cron or any external scheduler.
//!
//! Exit codes: 0 = new content published, 2 = fallback content written.

use std::process::ExitCode;

use chrono::Utc;
use synapsed_content::fallback::FallbackHandler;
use synapsed_content::metrics::Metrics;
use synapsed_content::{init_tracing, load_dotenv, Pipeline, PipelineConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    init_tracing();

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    let cfg = match PipelineConfig::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %format!("{e:#}"), "configuration failed to load");
            let out = FallbackHandler::builtin().handle("config", &format!("{e:#}"), Utc::now());
            info!(path = ?out.path, "fallback content written");
            return ExitCode::from(2);
        }
    };

    let pipeline = match Pipeline::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %format!("{e:#}"), "pipeline setup failed");
            let out = FallbackHandler::from_config(&cfg).handle("setup", &format!("{e:#}"), Utc::now());
            info!(path = ?out.path, "fallback content written");
            return ExitCode::from(2);
        }
    };

    let report = pipeline.run().await;
    info!(
        outcome = report.outcome_label(),
        version = %report.artifact().version,
        expires = %report.artifact().expires,
        "content run complete"
    );

    if let (Some(m), Some(path)) = (&metrics, &cfg.output.metrics_file) {
        if let Err(e) = m.write_textfile(path) {
            warn!(error = %format!("{e:#}"), "metrics textfile not written");
        }
    }

    ExitCode::from(report.exit_code())
}
