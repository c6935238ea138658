// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod artifact;
pub mod compose;
pub mod config;
pub mod error;
pub mod fallback;
pub mod ingest;
pub mod metrics;
pub mod parse;
pub mod pipeline;
pub mod publish;
pub mod schema;
pub mod synth;

// ---- Re-exports for stable public API ----
pub use crate::artifact::{ContentArtifact, PublishableArtifact};
pub use crate::config::PipelineConfig;
pub use crate::error::PipelineError;
pub use crate::pipeline::{Pipeline, RunOutcome, RunReport, Stage};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// Filter from `RUST_LOG`, defaulting to `synapsed_content=info,warn`.
/// `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("synapsed_content=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}

/// Load `.env.local` then `.env`; existing variables win. No-op when absent.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
}
