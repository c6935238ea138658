// src/config/mod.rs
//! Pipeline configuration: `config/pipeline.toml`, env overrides, secret resolution.

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::config::{clean_feeds, default_feeds, load_feeds_from, validate_feeds};
use crate::ingest::types::FeedSource;
use crate::parse::ParseMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";
pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";

/// Sentinel meaning "read this secret from the environment".
const ENV_SENTINEL: &str = "ENV";

/// Upper bound for either artifact TTL: one year.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub fetch_timeout_secs: u64,
    pub max_concurrency: usize,
    pub user_agent: String,
    /// Optional separate feed list (TOML `[[feeds]]` or JSON array).
    pub feeds_file: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 10,
            max_concurrency: 9,
            user_agent: "Mozilla/5.0 (compatible; Synapsed/1.0)".to_string(),
            feeds_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// "anthropic" | "openai" (case-insensitive)
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Literal key, or "ENV" / absent to read `ANTHROPIC_API_KEY` / `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub prompt_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-opus-4-20250514".to_string(),
            temperature: 1.0,
            max_tokens: 2200,
            api_key: None,
            prompt_path: PathBuf::from("config/content-generation-prompt.md"),
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    pub mode: ParseMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub success_ttl_secs: u64,
    pub fallback_ttl_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            success_ttl_secs: 24 * 3600,
            fallback_ttl_secs: 3600,
        }
    }
}

impl ArtifactConfig {
    /// `None` when the configured value is past [`MAX_TTL_SECS`].
    pub fn success_ttl(&self) -> Option<chrono::Duration> {
        ttl_from_secs(self.success_ttl_secs)
    }

    /// Out-of-range values use the built-in hour so the fallback path stays usable.
    pub fn fallback_ttl(&self) -> chrono::Duration {
        ttl_from_secs(self.fallback_ttl_secs).unwrap_or_else(|| chrono::Duration::hours(1))
    }
}

pub fn ttl_from_secs(secs: u64) -> Option<chrono::Duration> {
    if secs > MAX_TTL_SECS {
        return None;
    }
    i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobBackend {
    Http,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub backend: BlobBackend,
    pub base_url: String,
    /// Literal token, or "ENV" / absent to read `BLOB_READ_WRITE_TOKEN`.
    pub token: Option<String>,
    pub artifact_key: String,
    pub document_key: String,
    pub cache_max_age_secs: u64,
    /// Root for the `local` backend.
    pub local_dir: PathBuf,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Http,
            base_url: "https://blob.vercel-storage.com".to_string(),
            token: None,
            artifact_key: "dynamic-content.json".to_string(),
            document_key: "athena-knowledge/dynamic-content.md".to_string(),
            cache_max_age_secs: 3600,
            local_dir: PathBuf::from("data/blob"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub fallback_file: String,
    pub document_file: String,
    /// Prometheus textfile written at the end of each run.
    pub metrics_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            fallback_file: "dynamic-content.json".to_string(),
            document_file: "dynamic-content.md".to_string(),
            metrics_file: None,
        }
    }
}

impl OutputConfig {
    pub fn fallback_path(&self) -> PathBuf {
        self.dir.join(&self.fallback_file)
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(&self.document_file)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    pub generation: GenerationConfig,
    pub parse: ParseConfig,
    pub artifact: ArtifactConfig,
    pub publish: PublishConfig,
    pub output: OutputConfig,
    pub feeds: Vec<FeedSource>,
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let cfg: PipelineConfig = toml::from_str(&data)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        cfg.finish()
    }

    /// Resolution order:
    /// 1) $PIPELINE_CONFIG_PATH (must exist)
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        tracing::info!("no pipeline config found; using built-in defaults");
        Self::default().finish()
    }

    /// Fill feeds, resolve secrets, validate.
    fn finish(mut self) -> Result<Self> {
        if let Some(p) = self.ingest.feeds_file.clone() {
            self.feeds = load_feeds_from(&p)?;
        }
        if self.feeds.is_empty() {
            self.feeds = default_feeds();
        } else {
            self.feeds = clean_feeds(std::mem::take(&mut self.feeds));
        }
        self.generation.provider = self.generation.provider.trim().to_lowercase();
        self.resolve_secrets();
        self.validate()?;
        Ok(self)
    }

    /// A missing secret is not an error here; the stage needing it fails and falls back.
    fn resolve_secrets(&mut self) {
        let wants_env = |v: &Option<String>| {
            v.as_deref()
                .map(|s| s.trim().is_empty() || s.trim().eq_ignore_ascii_case(ENV_SENTINEL))
                .unwrap_or(true)
        };
        if wants_env(&self.generation.api_key) {
            let var = match self.generation.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "ANTHROPIC_API_KEY",
            };
            self.generation.api_key = env::var(var).ok().filter(|k| !k.trim().is_empty());
        }
        if wants_env(&self.publish.token) {
            self.publish.token = env::var("BLOB_READ_WRITE_TOKEN")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_feeds(&self.feeds)?;
        let a = &self.artifact;
        if a.fallback_ttl_secs == 0 {
            bail!("artifact.fallback_ttl_secs must be > 0");
        }
        if a.success_ttl_secs > MAX_TTL_SECS || a.fallback_ttl_secs > MAX_TTL_SECS {
            bail!("artifact TTLs must not exceed {MAX_TTL_SECS} seconds");
        }
        if a.success_ttl_secs <= a.fallback_ttl_secs {
            bail!("artifact.success_ttl_secs must exceed fallback_ttl_secs");
        }
        if self.publish.cache_max_age_secs >= a.success_ttl_secs {
            bail!("publish.cache_max_age_secs must be shorter than the success TTL");
        }
        if self.publish.artifact_key.trim().is_empty() || self.publish.document_key.trim().is_empty() {
            bail!("publish keys must be non-empty");
        }
        if self.publish.artifact_key == self.publish.document_key {
            bail!("artifact and document keys must differ");
        }
        if self.ingest.fetch_timeout_secs == 0 {
            bail!("ingest.fetch_timeout_secs must be > 0");
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be within 0.0..=2.0");
        }
        if self.generation.max_tokens == 0 {
            bail!("generation.max_tokens must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = PipelineConfig {
            feeds: default_feeds(),
            ..Default::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.artifact.success_ttl_secs, 86_400);
        assert_eq!(cfg.artifact.fallback_ttl_secs, 3_600);
    }

    #[test]
    fn cache_hint_must_be_shorter_than_ttl() {
        let mut cfg = PipelineConfig {
            feeds: default_feeds(),
            ..Default::default()
        };
        cfg.publish.cache_max_age_secs = cfg.artifact.success_ttl_secs;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_ttls_are_rejected() {
        let mut cfg = PipelineConfig {
            feeds: default_feeds(),
            ..Default::default()
        };
        cfg.artifact.success_ttl_secs = 1_000_000_000_000_000;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"), "{err}");
        assert_eq!(cfg.artifact.success_ttl(), None);

        cfg.artifact.success_ttl_secs = MAX_TTL_SECS;
        cfg.validate().unwrap();
        assert_eq!(cfg.artifact.success_ttl(), Some(chrono::Duration::days(365)));

        cfg.artifact.fallback_ttl_secs = u64::MAX;
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.artifact.fallback_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
[generation]
max_tokens = 1000

[parse]
mode = "tolerant"
"#,
        )
        .unwrap();
        assert_eq!(cfg.generation.max_tokens, 1000);
        assert_eq!(cfg.generation.provider, "anthropic");
        assert_eq!(cfg.parse.mode, ParseMode::Tolerant);
        assert_eq!(cfg.publish.backend, BlobBackend::Http);
        assert!(cfg.feeds.is_empty());
    }
}
