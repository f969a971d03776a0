//! Sink writer: persists the fused result as a new envelope artifact.

use anyhow::{Context, Result};
use chrono::Utc;
use clipfuse_core::envelope::Envelope;
use clipfuse_core::models::FusionResult;
use uuid::Uuid;

use crate::storage::ObjectStore;

/// A written artifact: where it went and what it holds.
#[derive(Debug, Clone)]
pub struct Written {
    pub bucket: String,
    pub key: String,
    pub envelope: Envelope,
}

impl Written {
    pub fn location(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

/// Wrap `result` in an [`Envelope`] stamped with the current time.
pub fn build_envelope(result: FusionResult) -> Envelope {
    Envelope::new(result, Utc::now())
}

/// Write `envelope` to `<prefix>integrated_data_<timestamp>_<run id>.json` in `bucket`.
///
/// Each call draws a fresh run id, so back-to-back writes land on distinct
/// keys. A storage failure here fails the whole invocation.
pub async fn write_envelope(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    envelope: Envelope,
) -> Result<Written> {
    let key = envelope.artifact_key(prefix, &Uuid::new_v4());
    let body = envelope
        .to_json_pretty()
        .context("Failed to serialize envelope")?;

    if let Some(first) = envelope.matched_clips.first() {
        tracing::debug!(sample = %serde_json::to_string(first).unwrap_or_default(), "first clip");
    }

    store
        .put(bucket, &key, body.into_bytes(), "application/json")
        .await
        .with_context(|| format!("Failed to write envelope to {}/{}", bucket, key))?;

    tracing::info!(bucket, key = %key, clips = envelope.total_clips, "envelope written");
    Ok(Written {
        bucket: bucket.to_string(),
        key,
        envelope,
    })
}
