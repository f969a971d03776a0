//! Object storage abstraction.
//!
//! The [`ObjectStore`] trait is the only way the collector, sink writer and
//! trigger handler touch storage. A store is constructed once per process
//! and injected, so tests swap in [`memory::MemoryStore`].
//!
//! | Backend | Type | Use |
//! |---------|------|-----|
//! | `s3` | [`s3::S3Store`] | S3 REST API with SigV4 signing |
//! | `filesystem` | [`fs::FsStore`] | Local directory, one subdirectory per bucket |
//! | in-memory | [`memory::MemoryStore`] | Tests |

pub mod fs;
pub mod memory;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::StorageConfig;

/// Listing / head metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl ObjectMeta {
    pub fn is_dir_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("{operation} failed (HTTP {status}): {message}")]
    Http {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing credentials: {0}")]
    Credentials(String),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("invalid storage response: {0}")]
    InvalidResponse(String),
}

/// A bucket/key object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend identifier (`"s3"`, `"filesystem"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Every object whose key starts with `prefix`, sorted by key.
    /// Pagination, where the backend has it, is drained.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Build the store selected by `[storage].backend`.
pub fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend.as_str() {
        "s3" => Arc::new(s3::S3Store::from_config(config)?),
        "filesystem" => {
            let root = config.root.clone().ok_or_else(|| {
                anyhow::anyhow!("storage.root is required for the filesystem backend")
            })?;
            Arc::new(fs::FsStore::new(root))
        }
        "memory" => Arc::new(memory::MemoryStore::new()),
        other => anyhow::bail!(
            "Unknown storage backend: '{}'. Must be s3, filesystem, or memory.",
            other
        ),
    };
    tracing::debug!(backend = store.backend(), "object store ready");
    Ok(store)
}
