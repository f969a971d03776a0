//! In-memory [`ObjectStore`] for tests.
//!
//! Objects live in a `BTreeMap` keyed by `(bucket, key)` behind a
//! `std::sync::RwLock`, so listings come back sorted like S3's.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{ObjectMeta, ObjectStore, StorageError};

struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    last_modified: chrono::DateTime<Utc>,
}

pub struct MemoryStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Store `body` under `bucket/key`, replacing any previous object.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
                last_modified: Utc::now(),
            },
        );
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .read()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.content_type.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn meta(key: &str, obj: &StoredObject) -> ObjectMeta {
    ObjectMeta {
        key: key.to_string(),
        size: obj.body.len() as u64,
        last_modified: Some(obj.last_modified),
        etag: None,
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let objects = self.objects.read().unwrap();
        Ok(objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), obj)| meta(k, obj))
            .collect())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StorageError> {
        let objects = self.objects.read().unwrap();
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| meta(key, obj))
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().unwrap();
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| obj.body.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }
}
