// src/fallback.rs
//! The pipeline's error boundary: degrade to hardcoded content, stored locally only.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{error, warn};

use crate::artifact::{fallback_artifact, ContentArtifact};
use crate::config::{ArtifactConfig, OutputConfig, PipelineConfig};
use crate::publish::blob::write_atomic;

#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub artifact: ContentArtifact,
    /// `None` when the local write failed.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FallbackHandler {
    path: PathBuf,
    ttl: Duration,
}

impl FallbackHandler {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self::new(cfg.output.fallback_path(), cfg.artifact.fallback_ttl())
    }

    /// For failures before any config is available: built-in output path and TTL.
    pub fn builtin() -> Self {
        Self::new(
            OutputConfig::default().fallback_path(),
            ArtifactConfig::default().fallback_ttl(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Never fails: a write error is logged and the in-memory artifact is still returned.
    pub fn handle(&self, stage: &str, err: &str, now: DateTime<Utc>) -> FallbackOutcome {
        warn!(target: "pipeline", stage, error = %err, "run failed; writing fallback content");
        let artifact = fallback_artifact(stage, err, now, self.ttl);

        let path = match serde_json::to_vec_pretty(&artifact) {
            Ok(json) => match write_atomic(&self.path, &json) {
                Ok(()) => Some(self.path.clone()),
                Err(e) => {
                    error!(target: "pipeline", path = %self.path.display(), error = %e, "fallback file not written");
                    None
                }
            },
            Err(e) => {
                error!(target: "pipeline", error = %e, "fallback artifact failed to serialize");
                None
            }
        };

        FallbackOutcome { artifact, path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_complete_fallback_with_short_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/dynamic-content.json");
        let h = FallbackHandler::new(&target, Duration::hours(1));
        let out = h.handle("parsing", "label `KSO` not found", Utc::now());

        assert_eq!(out.path.as_deref(), Some(target.as_path()));
        assert!(out.artifact.fallback_used);
        assert_eq!(out.artifact.ttl(), Duration::hours(1));
        out.artifact.validate().unwrap();

        let on_disk: ContentArtifact =
            serde_json::from_slice(&std::fs::read(&target).unwrap()).unwrap();
        assert_eq!(on_disk, out.artifact);
    }

    #[test]
    fn config_handler_uses_output_dir_and_bounded_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = PipelineConfig::default();
        cfg.output.dir = dir.path().join("out");
        cfg.artifact.fallback_ttl_secs = u64::MAX;

        let h = FallbackHandler::from_config(&cfg);
        assert_eq!(h.path(), cfg.output.fallback_path().as_path());
        assert_eq!(h.ttl(), Duration::hours(1));
        let out = h.handle("config", "bad ttl", Utc::now());
        assert!(out.path.is_some());

        assert_eq!(FallbackHandler::builtin().path(), Path::new("data/dynamic-content.json"));
    }

    #[test]
    fn unwritable_target_still_returns_artifact() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be
        let target = dir.path().join("taken");
        std::fs::create_dir_all(target.join("x")).unwrap();
        let out = FallbackHandler::new(&target, Duration::hours(1)).handle("fetching", "x", Utc::now());
        assert!(out.path.is_none());
        assert!(out.artifact.fallback_used);
    }
}
