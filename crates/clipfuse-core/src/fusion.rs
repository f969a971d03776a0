//! Temporal fusion of the three modality batches into consolidated clips.
//!
//! # Modes
//!
//! **Embedding boundaries.** When the embedding batch is non-empty, every
//! embedding segment becomes one clip, in arrival order. A transcript word
//! joins the clip when its whole interval lies inside the segment; a
//! detection joins when its timestamp does. Both comparisons are inclusive.
//!
//! **Word boundaries.** With no embeddings, transcript words are sorted by
//! start time and each word becomes its own clip with an empty embedding.
//!
//! With neither embeddings nor transcript there are no clips, whatever the
//! detections hold.
//!
//! All comparisons are exact; no epsilon is applied.

use std::collections::BTreeSet;

use crate::models::{
    ConsolidatedClip, DetectionItem, EmbeddingItem, FusionResult, OriginalCounts, TimeInterval,
    TranscriptItem,
};

/// Fuse the three batches. Never fails; identical input yields identical output.
pub fn fuse(
    embedding: &[EmbeddingItem],
    transcript: &[TranscriptItem],
    detection: &[DetectionItem],
) -> Vec<ConsolidatedClip> {
    tracing::debug!(
        embedding = embedding.len(),
        transcript = transcript.len(),
        detection = detection.len(),
        "fusion started"
    );

    let clips = if !embedding.is_empty() {
        fuse_on_embeddings(embedding, transcript, detection)
    } else if !transcript.is_empty() {
        tracing::info!("no embedding segments; using transcript words as clip boundaries");
        fuse_on_words(transcript, detection)
    } else {
        Vec::new()
    };

    tracing::info!(clips = clips.len(), "fusion complete");
    clips
}

/// [`fuse`], paired with the pre-fusion batch sizes.
pub fn fuse_batches(
    embedding: &[EmbeddingItem],
    transcript: &[TranscriptItem],
    detection: &[DetectionItem],
) -> FusionResult {
    FusionResult {
        clips: fuse(embedding, transcript, detection),
        counts: OriginalCounts {
            transcript_records: transcript.len(),
            embedding_records: embedding.len(),
            detection_records: detection.len(),
        },
    }
}

fn fuse_on_embeddings(
    embedding: &[EmbeddingItem],
    transcript: &[TranscriptItem],
    detection: &[DetectionItem],
) -> Vec<ConsolidatedClip> {
    embedding
        .iter()
        .map(|segment| {
            let window = segment.interval;

            let words: Vec<&str> = transcript
                .iter()
                .filter(|word| window.contains(&word.interval))
                .map(|word| word.text.as_str())
                .collect();
            let objects = labels_within(&window, detection);

            tracing::debug!(
                start = window.start,
                end = window.end,
                words = words.len(),
                objects = objects.len(),
                "clip matched"
            );

            ConsolidatedClip {
                start_sec: window.start,
                end_sec: window.end,
                embedding: segment.vector.clone(),
                transcript: words.join(" ").trim().to_string(),
                detected_objects: objects,
            }
        })
        .collect()
}

fn fuse_on_words(
    transcript: &[TranscriptItem],
    detection: &[DetectionItem],
) -> Vec<ConsolidatedClip> {
    let mut words: Vec<&TranscriptItem> = transcript.iter().collect();
    // Stable, so equal start times keep arrival order.
    words.sort_by(|a, b| a.interval.start.total_cmp(&b.interval.start));

    words
        .into_iter()
        .map(|word| ConsolidatedClip {
            start_sec: word.interval.start,
            end_sec: word.interval.end,
            embedding: Vec::new(),
            transcript: word.text.clone(),
            detected_objects: labels_within(&word.interval, detection),
        })
        .collect()
}

fn labels_within(window: &TimeInterval, detection: &[DetectionItem]) -> BTreeSet<String> {
    detection
        .iter()
        .filter(|d| window.contains_point(d.timestamp))
        .map(|d| d.label.clone())
        .collect()
}
