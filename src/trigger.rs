//! Trigger handler: the entry point for "new object" notifications.
//!
//! # Flow
//!
//! ```text
//! notification ──▶ ignore sentinel / manifest ──▶ 204
//!              ──▶ head: zero bytes           ──▶ 204
//!              ──▶ collect ─▶ fuse ─▶ write   ──▶ 200 {source, destination, counts}
//!                  any error                  ──▶ 500 {error}
//! ```
//!
//! [`TriggerHandler::handle`] never returns an error: every failure becomes
//! a [`TriggerStatus`] with status code 500.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::SecondsFormat;
use clipfuse_core::error::ConfigError;
use serde::Serialize;
use serde_json::{json, Value};

use crate::collector;
use crate::config::{Config, SinkConfig, SourcePrefix, TriggerConfig};
use crate::sink;
use crate::storage::ObjectStore;

/// The newly created object that fired the trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub bucket: String,
    pub key: String,
}

impl Notification {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Accepts `{"bucket", "key"}` or the event-bus shape
    /// `{"detail": {"bucket": {"name"}, "object": {"key"}}}`.
    pub fn from_event(event: &Value) -> Result<Self> {
        let (bucket, key) = match event.get("detail") {
            Some(detail) => (
                detail.pointer("/bucket/name").and_then(Value::as_str),
                detail.pointer("/object/key").and_then(Value::as_str),
            ),
            None => (
                event.get("bucket").and_then(Value::as_str),
                event.get("key").and_then(Value::as_str),
            ),
        };
        match (bucket, key) {
            (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Self::new(bucket, key))
            }
            _ => Err(anyhow!("notification is missing the bucket name or object key")),
        }
    }
}

/// Structured result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerStatus {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: Value,
}

impl TriggerStatus {
    pub const OK: u16 = 200;
    pub const IGNORED: u16 = 204;
    pub const FAILED: u16 = 500;

    fn ignored(message: &str, key: &str) -> Self {
        Self {
            status_code: Self::IGNORED,
            body: json!({ "message": message, "key": key }),
        }
    }

    fn failed(err: &anyhow::Error) -> Self {
        Self {
            status_code: Self::FAILED,
            body: json!({ "error": format!("{:#}", err) }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code != Self::FAILED
    }
}

pub struct TriggerHandler {
    store: Arc<dyn ObjectStore>,
    sources: Vec<SourcePrefix>,
    sink: SinkConfig,
    ignore: TriggerConfig,
}

impl TriggerHandler {
    /// Resolves the configured sources up front; a bad modality tag fails here.
    pub fn new(store: Arc<dyn ObjectStore>, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            sources: config.source_prefixes()?,
            sink: config.sink.clone(),
            ignore: config.trigger.clone(),
        })
    }

    /// Parse a raw notification event and handle it.
    pub async fn handle_event(&self, event: &Value) -> TriggerStatus {
        match Notification::from_event(event) {
            Ok(notification) => self.handle(&notification).await,
            Err(e) => {
                tracing::error!(error = %e, "invalid notification");
                TriggerStatus::failed(&e)
            }
        }
    }

    pub async fn handle(&self, notification: &Notification) -> TriggerStatus {
        match self.run(notification).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    bucket = %notification.bucket,
                    key = %notification.key,
                    error = %format!("{:#}", e),
                    "processing failed"
                );
                TriggerStatus::failed(&e)
            }
        }
    }

    async fn run(&self, n: &Notification) -> Result<TriggerStatus> {
        if self.ignore.is_ignored(&n.key) {
            tracing::info!(key = %n.key, "ignored file");
            return Ok(TriggerStatus::ignored("ignored file", &n.key));
        }

        let head = self
            .store
            .head(&n.bucket, &n.key)
            .await
            .with_context(|| format!("Failed to inspect {}/{}", n.bucket, n.key))?;
        if head.size == 0 {
            tracing::info!(key = %n.key, "zero-byte file ignored");
            return Ok(TriggerStatus::ignored("empty file ignored", &n.key));
        }

        let collection =
            collector::collect(self.store.as_ref(), &n.bucket, &self.sources, &self.ignore).await;
        let skipped = collection.skipped().count();
        let envelope = sink::build_envelope(collection.fuse());
        let written = sink::write_envelope(
            self.store.as_ref(),
            &n.bucket,
            &self.sink.prefix,
            envelope,
        )
        .await?;

        let env = &written.envelope;
        Ok(TriggerStatus {
            status_code: TriggerStatus::OK,
            body: json!({
                "message": "time-aligned metadata fused and stored",
                "source": format!("{}/{}", n.bucket, n.key),
                "destination": written.location(),
                "processed_at": env.processed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                "total_clips": env.total_clips,
                "original_counts": env.original_counts,
                "matched_clips": env.total_clips,
                "skipped_files": skipped,
            }),
        })
    }
}
