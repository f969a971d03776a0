//! Speech-recognition transcript adapter.
//!
//! Input is word-alignment JSON:
//!
//! ```json
//! {"results": {"items": [
//!   {"type": "pronunciation", "start_time": "0.04", "end_time": "0.38",
//!    "alternatives": [{"content": "hello", "confidence": "0.99"}]},
//!   {"type": "punctuation", "alternatives": [{"content": "."}]}
//! ]}}
//! ```

use serde_json::Value;

use super::{json_type, lenient_f64, lenient_string};
use crate::error::ParseError;
use crate::models::{Modality, TimeInterval, TranscriptItem};

const M: Modality = Modality::Transcript;

/// Extract pronunciation tokens with their start/end times.
///
/// Punctuation and any other token type are dropped. A token with an empty
/// `alternatives` array carries no text and is skipped.
pub fn parse_transcript(doc: &Value) -> Result<Vec<TranscriptItem>, ParseError> {
    let items = doc
        .get("results")
        .and_then(|r| r.get("items"))
        .ok_or_else(|| ParseError::shape(M, "missing results.items"))?;
    let items = items.as_array().ok_or_else(|| {
        ParseError::shape(M, format!("results.items is {}, expected array", json_type(items)))
    })?;

    let mut out = Vec::new();
    for item in items {
        if item.get("type").and_then(Value::as_str) != Some("pronunciation") {
            continue;
        }

        let first = match item.get("alternatives") {
            Some(Value::Array(alts)) => match alts.first() {
                Some(alt) => alt,
                None => continue,
            },
            None | Some(Value::Null) => &Value::Null,
            Some(other) => {
                return Err(ParseError::field(
                    M,
                    "alternatives",
                    format!("expected array, found {}", json_type(other)),
                ))
            }
        };

        let text = lenient_string(M, "content", first.get("content"))?;
        let start = lenient_f64(M, "start_time", item.get("start_time"))?;
        let end = lenient_f64(M, "end_time", item.get("end_time"))?;

        out.push(TranscriptItem {
            text,
            interval: TimeInterval::new(start, end),
        });
    }

    Ok(out)
}
