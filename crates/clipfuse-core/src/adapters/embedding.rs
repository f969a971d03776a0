//! Video embedding segment adapter.
//!
//! Accepts three document layouts:
//!
//! - a single segment: `{"embedding": [...], "startSec": 0, "endSec": 6}`
//! - a top-level array of segments
//! - a wrapper object: `{"data": [segment, ...]}`
//!
//! The `embedding` field may also arrive as a JSON-encoded string
//! (`"[0.1, 0.2]"`), which is decoded into a vector.

use serde_json::Value;

use super::{json_type, lenient_f64};
use crate::error::ParseError;
use crate::models::{EmbeddingItem, Modality, TimeInterval};

const M: Modality = Modality::Embedding;

pub fn parse_embedding(doc: &Value) -> Result<Vec<EmbeddingItem>, ParseError> {
    let segments: Vec<&Value> = match doc {
        Value::Array(segments) => segments.iter().collect(),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(segments)) => segments.iter().collect(),
            _ => vec![doc],
        },
        other => {
            return Err(ParseError::shape(
                M,
                format!("expected object or array, found {}", json_type(other)),
            ))
        }
    };

    segments.into_iter().map(parse_segment).collect()
}

fn parse_segment(segment: &Value) -> Result<EmbeddingItem, ParseError> {
    if !segment.is_object() {
        return Err(ParseError::shape(
            M,
            format!("segment is {}, expected object", json_type(segment)),
        ));
    }

    let vector = match segment.get("embedding") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => to_vector(values)?,
        // An undecodable string carries no vector rather than failing the file.
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(values)) => to_vector(&values).unwrap_or_default(),
            _ => Vec::new(),
        },
        Some(other) => {
            return Err(ParseError::field(
                M,
                "embedding",
                format!("expected array or string, found {}", json_type(other)),
            ))
        }
    };

    let start = lenient_f64(M, "startSec", segment.get("startSec"))?;
    let end = lenient_f64(M, "endSec", segment.get("endSec"))?;

    Ok(EmbeddingItem {
        vector,
        interval: TimeInterval::new(start, end),
    })
}

fn to_vector(values: &[Value]) -> Result<Vec<f64>, ParseError> {
    values
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                ParseError::field(M, "embedding", format!("element is {}", json_type(v)))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_segment() {
        let doc = json!({"embedding": [1.0, 2.0], "startSec": 0, "endSec": 5});
        let items = parse_embedding(&doc).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].vector, vec![1.0, 2.0]);
        assert_eq!(items[0].interval, TimeInterval::new(0.0, 5.0));
    }

    #[test]
    fn test_segment_list_and_data_wrapper() {
        let list = json!([
            {"embedding": [0.1], "startSec": 0, "endSec": 6},
            {"embedding": [0.2], "startSec": 6, "endSec": 12}
        ]);
        assert_eq!(parse_embedding(&list).unwrap().len(), 2);

        let wrapped = json!({"data": [
            {"embedding": [0.1], "startSec": 0, "endSec": 6},
            {"embedding": [0.2], "startSec": 6, "endSec": 12},
            {"embedding": [0.3], "startSec": 12, "endSec": 18}
        ]});
        let items = parse_embedding(&wrapped).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].interval, TimeInterval::new(12.0, 18.0));
    }

    #[test]
    fn test_json_string_embedding() {
        let doc = json!({"embedding": "[0.5, -0.25]", "startSec": 1, "endSec": 2});
        let items = parse_embedding(&doc).unwrap();
        assert_eq!(items[0].vector, vec![0.5, -0.25]);
    }

    #[test]
    fn test_undecodable_string_gives_empty_vector() {
        let doc = json!({"embedding": "not json", "startSec": 1, "endSec": 2});
        let items = parse_embedding(&doc).unwrap();
        assert!(items[0].vector.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let items = parse_embedding(&json!({})).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].vector.is_empty());
        assert_eq!(items[0].interval, TimeInterval::new(0.0, 0.0));
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(parse_embedding(&json!(42)).is_err());
        assert!(parse_embedding(&json!(["a", "b"])).is_err());
        assert!(parse_embedding(&json!({"embedding": 3})).is_err());
        assert!(parse_embedding(&json!({"embedding": [1, "x"]})).is_err());
    }
}
