//! In-process interval runner: one pipeline run immediately, then every interval.
//!
//! SCHEDULER_INTERVAL_SECS    (default 900)
//! SCHEDULER_RUN_TIMEOUT_SECS (default 120)
//!
//! The run timeout bounds fetching through building; a run cut off there still writes
//! the fallback. Config or setup failures write the fallback too. The loop keeps going
//! either way and the next tick is the retry.

use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use synapsed_content::fallback::FallbackHandler;
use synapsed_content::metrics::Metrics;
use synapsed_content::pipeline::production_budget;
use synapsed_content::{init_tracing, load_dotenv, Pipeline, PipelineConfig};
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug)]
struct SchedulerCfg {
    interval_secs: u64,
    run_timeout_secs: u64,
}

impl SchedulerCfg {
    fn from_env() -> Self {
        let read = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        Self {
            interval_secs: read("SCHEDULER_INTERVAL_SECS", 900),
            run_timeout_secs: read("SCHEDULER_RUN_TIMEOUT_SECS", 120),
        }
    }
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_tracing();

    let metrics = Metrics::init()
        .map_err(|e| warn!(error = %e, "metrics recorder unavailable"))
        .ok();
    let cfg = SchedulerCfg::from_env();
    info!(
        interval_secs = cfg.interval_secs,
        run_timeout_secs = cfg.run_timeout_secs,
        "content scheduler started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }

        // Reloaded every tick so config edits apply without a restart.
        let pipeline_cfg = match PipelineConfig::load_default() {
            Ok(c) => c,
            Err(e) => {
                error!(error = %format!("{e:#}"), "config load failed; writing fallback");
                counter!("scheduler_skipped_runs_total").increment(1);
                let out = FallbackHandler::builtin().handle("config", &format!("{e:#}"), Utc::now());
                info!(path = ?out.path, "fallback content written");
                continue;
            }
        };
        let pipeline = match Pipeline::from_config(&pipeline_cfg) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %format!("{e:#}"), "pipeline setup failed; writing fallback");
                counter!("scheduler_skipped_runs_total").increment(1);
                let out = FallbackHandler::from_config(&pipeline_cfg).handle(
                    "setup",
                    &format!("{e:#}"),
                    Utc::now(),
                );
                info!(path = ?out.path, "fallback content written");
                continue;
            }
        };

        let run_timeout = Duration::from_secs(cfg.run_timeout_secs);
        let budget = production_budget(&pipeline_cfg);
        if run_timeout < budget {
            warn!(
                run_timeout_secs = cfg.run_timeout_secs,
                budget_secs = budget.as_secs(),
                "run timeout is shorter than the fetch and generation timeouts"
            );
        }
        let report = pipeline.with_deadline(run_timeout).run().await;
        info!(
            outcome = report.outcome_label(),
            version = %report.artifact().version,
            "scheduled run finished"
        );

        if let (Some(m), Some(path)) = (&metrics, &pipeline_cfg.output.metrics_file) {
            if let Err(e) = m.write_textfile(path) {
                warn!(error = %format!("{e:#}"), "metrics textfile not written");
            }
        }
    }
}
