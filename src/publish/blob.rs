// src/publish/blob.rs
//! Durable single-slot blob stores: each key holds exactly one object, replaced whole.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use super::PublishError;

/// Options for one put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: &'static str,
    pub cache_max_age_secs: u64,
    pub overwrite: bool,
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous object. Returns its public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, opts: &PutOptions) -> Result<String, PublishError>;

    fn name(&self) -> &'static str;
}

/// Write to `<path>.tmp`, then rename over `path`. Readers see the old or the new file,
/// never a partial one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// HTTP (Vercel Blob style)
// ------------------------------------------------------------

const BLOB_API_VERSION: &str = "7";

#[derive(Debug, Deserialize)]
struct PutResponse {
    url: String,
}

pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PublishError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait::async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, opts: &PutOptions) -> Result<String, PublishError> {
        let token = self.token.as_deref().ok_or(PublishError::MissingToken)?;
        let url = format!("{}/{}", self.base_url, key.trim_start_matches('/'));

        let resp = self
            .client
            .put(&url)
            .bearer_auth(token)
            .header("x-api-version", BLOB_API_VERSION)
            .header("x-content-type", opts.content_type)
            .header("x-cache-control-max-age", opts.cache_max_age_secs.to_string())
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", if opts.overwrite { "1" } else { "0" })
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                key: key.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let parsed: PutResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Decode(e.to_string()))?;
        Ok(parsed.url)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// ------------------------------------------------------------
// Local directory
// ------------------------------------------------------------

/// Filesystem-backed store rooted at a directory; keys map to relative paths.
pub struct LocalDirBlobStore {
    root: PathBuf,
}

impl LocalDirBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalDirBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, opts: &PutOptions) -> Result<String, PublishError> {
        let path = self.path_for(key);
        if !opts.overwrite && path.exists() {
            return Err(PublishError::Exists(key.to_string()));
        }
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|e| PublishError::Io {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })?
            .map_err(|source| PublishError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(format!("file://{}", path.display()))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

// --- Test helper ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub opts: PutOptions,
}

/// In-memory store recording every put, optionally failing for one key.
#[derive(Default)]
pub struct MemoryBlobStore {
    puts: Mutex<Vec<StoredObject>>,
    fail_key: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(key: impl Into<String>) -> Self {
        Self {
            puts: Mutex::new(Vec::new()),
            fail_key: Some(key.into()),
        }
    }

    pub fn puts(&self) -> Vec<StoredObject> {
        self.puts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Latest object under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.puts()
            .into_iter()
            .rev()
            .find(|o| o.key == key)
            .map(|o| o.bytes)
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, opts: &PutOptions) -> Result<String, PublishError> {
        if self.fail_key.as_deref() == Some(key) {
            return Err(PublishError::Status {
                key: key.to_string(),
                status: 503,
                body: "store unavailable".to_string(),
            });
        }
        self.puts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(StoredObject {
                key: key.to_string(),
                bytes,
                opts: opts.clone(),
            });
        Ok(format!("memory://{key}"))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
