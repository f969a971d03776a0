//! Core data models used throughout clipfuse.
//!
//! These types represent the normalized, timed items produced by the
//! adapters and the consolidated clips produced by the fusion engine.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A closed time window in seconds, `[start, end]`.
///
/// Producers are expected to keep `start <= end`; values are used as
/// delivered. Detections use a point interval where `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: f64,
    pub end: f64,
}

impl TimeInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn point(at: f64) -> Self {
        Self { start: at, end: at }
    }

    /// Inclusive on both ends, exact float comparison.
    pub fn contains_point(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    /// True when `other` lies entirely inside `self`, boundaries included.
    pub fn contains(&self, other: &TimeInterval) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// One spoken word from a speech-recognition transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptItem {
    pub text: String,
    pub interval: TimeInterval,
}

/// One semantic segment from the video embedding stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingItem {
    pub vector: Vec<f64>,
    pub interval: TimeInterval,
}

/// One detected object occurrence at a single instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionItem {
    pub label: String,
    pub timestamp: f64,
}

/// A category of time-stamped annotation for a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modality {
    Transcript,
    Embedding,
    Detection,
}

const TRANSCRIPT_TAGS: &[&str] = &["transcribe", "transcript"];
const EMBEDDING_TAGS: &[&str] = &["twelvelabs", "embedding", "marengo"];
const DETECTION_TAGS: &[&str] = &["yolo_opencv", "yolo", "detection"];

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Transcript, Modality::Embedding, Modality::Detection];

    /// Resolve a modality from one of its recognized tags.
    ///
    /// Several producer names map onto the same modality (for example
    /// `twelvelabs` and `marengo` both emit embeddings). Anything else is a
    /// wiring bug and yields [`ConfigError::UnsupportedModality`].
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        if TRANSCRIPT_TAGS.contains(&tag) {
            Ok(Modality::Transcript)
        } else if EMBEDDING_TAGS.contains(&tag) {
            Ok(Modality::Embedding)
        } else if DETECTION_TAGS.contains(&tag) {
            Ok(Modality::Detection)
        } else {
            Err(ConfigError::UnsupportedModality(tag.to_string()))
        }
    }

    pub fn known_tags() -> Vec<&'static str> {
        TRANSCRIPT_TAGS
            .iter()
            .chain(EMBEDDING_TAGS)
            .chain(DETECTION_TAGS)
            .copied()
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Transcript => "transcript",
            Modality::Embedding => "embedding",
            Modality::Detection => "detection",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Modality::from_tag(s)
    }
}

/// Normalized output of one adapter run, in producer order.
#[derive(Debug, Clone, PartialEq)]
pub enum ModalityBatch {
    Transcript(Vec<TranscriptItem>),
    Embedding(Vec<EmbeddingItem>),
    Detection(Vec<DetectionItem>),
}

impl ModalityBatch {
    pub fn modality(&self) -> Modality {
        match self {
            ModalityBatch::Transcript(_) => Modality::Transcript,
            ModalityBatch::Embedding(_) => Modality::Embedding,
            ModalityBatch::Detection(_) => Modality::Detection,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ModalityBatch::Transcript(items) => items.len(),
            ModalityBatch::Embedding(items) => items.len(),
            ModalityBatch::Detection(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A time window of the source video with fused annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedClip {
    #[serde(rename = "startSec")]
    pub start_sec: f64,
    #[serde(rename = "endSec")]
    pub end_sec: f64,
    pub embedding: Vec<f64>,
    pub transcript: String,
    /// Distinct labels. Serialized as a JSON array; callers must not rely on
    /// element order.
    #[serde(rename = "detectedObjects")]
    pub detected_objects: BTreeSet<String>,
}

impl ConsolidatedClip {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.start_sec, self.end_sec)
    }
}

/// Per-modality record counts observed before fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalCounts {
    pub transcript_records: usize,
    pub embedding_records: usize,
    pub detection_records: usize,
}

/// Fused clips together with the input batch sizes they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionResult {
    pub clips: Vec<ConsolidatedClip>,
    pub counts: OriginalCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains_inclusive() {
        let clip = TimeInterval::new(0.0, 5.0);
        assert!(clip.contains(&TimeInterval::new(0.0, 5.0)));
        assert!(clip.contains(&TimeInterval::new(1.0, 2.0)));
        assert!(!clip.contains(&TimeInterval::new(4.0, 5.001)));
        assert!(!clip.contains(&TimeInterval::new(-0.001, 1.0)));
    }

    #[test]
    fn test_point_interval() {
        let p = TimeInterval::point(2.5);
        assert_eq!(p.start, p.end);
        assert!(p.contains_point(2.5));
        assert!(!p.contains_point(2.5001));
    }

    #[test]
    fn test_modality_aliases() {
        assert_eq!(Modality::from_tag("transcribe").unwrap(), Modality::Transcript);
        assert_eq!(Modality::from_tag("twelvelabs").unwrap(), Modality::Embedding);
        assert_eq!(Modality::from_tag("marengo").unwrap(), Modality::Embedding);
        assert_eq!(Modality::from_tag("yolo_opencv").unwrap(), Modality::Detection);
        assert_eq!("yolo".parse::<Modality>().unwrap(), Modality::Detection);
    }

    #[test]
    fn test_modality_unknown_tag_is_config_error() {
        let err = Modality::from_tag("audio").unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedModality("audio".to_string()));
        assert!(err.to_string().contains("twelvelabs"));
    }

    #[test]
    fn test_clip_serialized_field_names() {
        let clip = ConsolidatedClip {
            start_sec: 0.0,
            end_sec: 5.0,
            embedding: vec![1.0, 2.0],
            transcript: "hello".to_string(),
            detected_objects: ["ball".to_string()].into_iter().collect(),
        };
        let value = serde_json::to_value(&clip).unwrap();
        assert_eq!(value["startSec"], 0.0);
        assert_eq!(value["endSec"], 5.0);
        assert_eq!(value["embedding"], serde_json::json!([1.0, 2.0]));
        assert_eq!(value["transcript"], "hello");
        assert_eq!(value["detectedObjects"], serde_json::json!(["ball"]));
    }
}
