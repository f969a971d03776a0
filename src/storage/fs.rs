//! Local filesystem [`ObjectStore`].
//!
//! Each bucket is a subdirectory of `root` and each key a `/`-separated path
//! inside it:
//!
//! ```text
//! <root>/media/transcribe/episode-1.json   →  bucket "media", key "transcribe/episode-1.json"
//! ```
//!
//! Directories are never listed as objects; an empty directory simply has no
//! keys under it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{ObjectMeta, ObjectStore, StorageError};

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        check_segment(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.bucket_dir(bucket)?;
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            check_segment(segment).map_err(|_| StorageError::InvalidKey(key.to_string()))?;
            path.push(segment);
        }
        Ok(path)
    }
}

fn check_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn file_meta(key: String, metadata: &std::fs::Metadata) -> ObjectMeta {
    ObjectMeta {
        key,
        size: metadata.len(),
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        etag: None,
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    fn backend(&self) -> &str {
        "filesystem"
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;

        // Walk only the directory part of the prefix; the rest is matched as a string.
        let walk_root = match prefix.rfind('/') {
            Some(idx) => self.object_path(bucket, &prefix[..idx])?,
            None => bucket_dir.clone(),
        };
        if !walk_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut objects = Vec::new();
        for entry in WalkDir::new(&walk_root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&walk_root).to_path_buf();
                io_err(&path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&bucket_dir).unwrap_or(entry.path());
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !key.starts_with(prefix) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| io_err(entry.path(), e.into()))?;
            objects.push(file_meta(key, &metadata));
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => Ok(file_meta(key.to_string(), &metadata)),
            Ok(_) => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                io_err(&path, e)
            }
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        std::fs::write(&path, body).map_err(|e| io_err(&path, e))
    }
}
