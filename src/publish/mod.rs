// src/publish/mod.rs
//! Publishing of success-path artifacts: JSON artifact and Markdown summary to the
//! durable store, plus a local copy of the summary.

pub mod blob;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::artifact::{render_summary_markdown, PublishableArtifact};
use crate::config::{BlobBackend, PipelineConfig};

pub use blob::{BlobStore, HttpBlobStore, LocalDirBlobStore, MemoryBlobStore, PutOptions, StoredObject};

pub type DynBlobStore = Arc<dyn BlobStore>;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("blob store token is not configured (set BLOB_READ_WRITE_TOKEN)")]
    MissingToken,
    #[error("blob transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("blob store rejected {key} with {status}: {body}")]
    Status { key: String, status: u16, body: String },
    #[error("could not decode blob store response: {0}")]
    Decode(String),
    #[error("object {0} exists and overwrite is disabled")]
    Exists(String),
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct PublisherOptions {
    pub artifact_key: String,
    pub document_key: String,
    pub cache_max_age_secs: u64,
    /// Local copy of the Markdown summary; `None` skips it.
    pub local_document: Option<PathBuf>,
}

impl PublisherOptions {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            artifact_key: cfg.publish.artifact_key.clone(),
            document_key: cfg.publish.document_key.clone(),
            cache_max_age_secs: cfg.publish.cache_max_age_secs,
            local_document: Some(cfg.output.document_path()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub artifact_url: String,
    pub document_url: String,
    /// Set when the local Markdown copy was written.
    pub local_document: Option<PathBuf>,
}

pub struct Publisher {
    store: DynBlobStore,
    opts: PublisherOptions,
}

impl Publisher {
    pub fn new(store: DynBlobStore, opts: PublisherOptions) -> Self {
        Self { store, opts }
    }

    /// Both payloads are serialized up front, so a serialization problem never leaves
    /// the store with only one of them updated.
    pub async fn publish(&self, artifact: &PublishableArtifact) -> Result<PublishReceipt, PublishError> {
        let json = serde_json::to_vec_pretty(&**artifact)?;
        let markdown = render_summary_markdown(artifact);

        let artifact_url = self
            .store
            .put(
                &self.opts.artifact_key,
                json,
                &PutOptions {
                    content_type: "application/json",
                    cache_max_age_secs: self.opts.cache_max_age_secs,
                    overwrite: true,
                },
            )
            .await?;
        info!(target: "publish", store = self.store.name(), key = %self.opts.artifact_key, url = %artifact_url, "artifact published");

        let document_url = self
            .store
            .put(
                &self.opts.document_key,
                markdown.clone().into_bytes(),
                &PutOptions {
                    content_type: "text/markdown",
                    cache_max_age_secs: self.opts.cache_max_age_secs,
                    overwrite: true,
                },
            )
            .await?;
        info!(target: "publish", store = self.store.name(), key = %self.opts.document_key, url = %document_url, "summary document published");

        let local_document = match &self.opts.local_document {
            Some(path) => match blob::write_atomic(path, markdown.as_bytes()) {
                Ok(()) => Some(path.clone()),
                Err(e) => {
                    warn!(target: "publish", path = %path.display(), error = %e, "local summary copy not written");
                    None
                }
            },
            None => None,
        };

        Ok(PublishReceipt {
            artifact_url,
            document_url,
            local_document,
        })
    }
}

/// Store selected by `publish.backend`.
pub fn build_store(cfg: &PipelineConfig) -> Result<DynBlobStore, PublishError> {
    Ok(match cfg.publish.backend {
        BlobBackend::Http => Arc::new(HttpBlobStore::new(
            &cfg.publish.base_url,
            cfg.publish.token.clone(),
            Duration::from_secs(30),
        )?),
        BlobBackend::Local => Arc::new(LocalDirBlobStore::new(cfg.publish.local_dir.clone())),
    })
}
