//! Producer adapters.
//!
//! One adapter per modality turns a raw producer JSON document into a
//! normalized [`ModalityBatch`]. Adapters are lenient about missing optional
//! fields (numeric fields default to `0`) and strict about shape: a document
//! they do not recognize yields a [`ParseError`].
//!
//! | Modality | Producer | Adapter |
//! |----------|----------|---------|
//! | transcript | speech-recognition word alignment | [`transcript::parse_transcript`] |
//! | embedding | video embedding segments | [`embedding::parse_embedding`] |
//! | detection | per-frame object detector | [`detection::parse_detection`] |

pub mod detection;
pub mod embedding;
pub mod transcript;

use serde_json::Value;

use crate::error::ParseError;
use crate::models::{Modality, ModalityBatch};

/// Adapt a raw document with the adapter for `modality`.
pub fn adapt(modality: Modality, doc: &Value) -> Result<ModalityBatch, ParseError> {
    let batch = match modality {
        Modality::Transcript => ModalityBatch::Transcript(transcript::parse_transcript(doc)?),
        Modality::Embedding => ModalityBatch::Embedding(embedding::parse_embedding(doc)?),
        Modality::Detection => ModalityBatch::Detection(detection::parse_detection(doc)?),
    };
    tracing::debug!(modality = %modality, items = batch.len(), "adapted document");
    Ok(batch)
}

/// Read a numeric field leniently.
///
/// Missing or `null` → `0.0`. Numbers are taken as-is, and strings holding a
/// number (speech-recognition output writes `"1.24"`) are parsed. Anything
/// else is a [`ParseError`].
pub(crate) fn lenient_f64(
    modality: Modality,
    field: &str,
    value: Option<&Value>,
) -> Result<f64, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ParseError::field(modality, field, format!("{} is not finite", n))),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            ParseError::field(modality, field, format!("'{}' is not a number", s))
        }),
        Some(other) => Err(ParseError::field(
            modality,
            field,
            format!("expected number, found {}", json_type(other)),
        )),
    }
}

/// Read a string field, defaulting to empty when missing or `null`.
pub(crate) fn lenient_string(
    modality: Modality,
    field: &str,
    value: Option<&Value>,
) -> Result<String, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParseError::field(
            modality,
            field,
            format!("expected string, found {}", json_type(other)),
        )),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
