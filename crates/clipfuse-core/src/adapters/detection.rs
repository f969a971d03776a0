//! Object-detection adapter.
//!
//! The detector has emitted four document layouts over time. They are tried
//! as an ordered parser chain; the first layout that structurally matches
//! owns the document and later layouts are never consulted, even when the
//! document would satisfy them too.
//!
//! | # | Layout | Recognized by |
//! |---|--------|---------------|
//! | 1 | `{"results": [{"timestamp_seconds": t, "detections": [...]}, ...]}` | `results` is an array |
//! | 2 | `{"frame_id": n, "timestamp_seconds": t, "detections": [...]}` | all three keys present |
//! | 3 | `{"frames": [{"timestamp_seconds": t, "detections": [...]}, ...]}` | `frames` is an array |
//! | 4 | `{"detections": [{"timestamp_seconds": t, "class_name": "..."}, ...]}` | `detections` is an array |
//!
//! Timestamps are read from `timestamp_seconds`, falling back to
//! `timestamp`. Labels are read from `class_name`, falling back to `label`.

use serde_json::{Map, Value};

use super::{json_type, lenient_f64, lenient_string};
use crate::error::ParseError;
use crate::models::{DetectionItem, Modality};

const M: Modality = Modality::Detection;

/// Result of offering a document to one layout parser.
enum Attempt {
    /// The layout does not apply; try the next one.
    NoMatch,
    /// The layout owns the document. Field errors stop the chain here.
    Match(Result<Vec<DetectionItem>, ParseError>),
}

struct Layout {
    name: &'static str,
    parse: fn(&Map<String, Value>) -> Attempt,
}

const LAYOUTS: [Layout; 4] = [
    Layout {
        name: "results",
        parse: parse_results,
    },
    Layout {
        name: "single_frame",
        parse: parse_single_frame,
    },
    Layout {
        name: "frames",
        parse: parse_frames,
    },
    Layout {
        name: "flat",
        parse: parse_flat,
    },
];

pub fn parse_detection(doc: &Value) -> Result<Vec<DetectionItem>, ParseError> {
    let map = doc.as_object().ok_or_else(|| {
        ParseError::shape(M, format!("expected object, found {}", json_type(doc)))
    })?;

    for layout in &LAYOUTS {
        if let Attempt::Match(result) = (layout.parse)(map) {
            tracing::debug!(layout = layout.name, "detection layout matched");
            return result;
        }
    }

    Err(ParseError::shape(
        M,
        "no known detection layout (results, frame_id/timestamp/detections, frames, detections)",
    ))
}

fn parse_results(map: &Map<String, Value>) -> Attempt {
    match map.get("results") {
        Some(Value::Array(frames)) => Attempt::Match(parse_frame_list(frames)),
        _ => Attempt::NoMatch,
    }
}

fn parse_single_frame(map: &Map<String, Value>) -> Attempt {
    let has_timestamp = map.contains_key("timestamp_seconds") || map.contains_key("timestamp");
    if map.contains_key("frame_id") && has_timestamp && map.contains_key("detections") {
        Attempt::Match(parse_frame(map))
    } else {
        Attempt::NoMatch
    }
}

fn parse_frames(map: &Map<String, Value>) -> Attempt {
    match map.get("frames") {
        Some(Value::Array(frames)) => Attempt::Match(parse_frame_list(frames)),
        _ => Attempt::NoMatch,
    }
}

fn parse_flat(map: &Map<String, Value>) -> Attempt {
    let Some(Value::Array(detections)) = map.get("detections") else {
        return Attempt::NoMatch;
    };
    let parsed = detections
        .iter()
        .map(|detection| -> Result<DetectionItem, ParseError> {
            let obj = as_object(detection, "detections[]")?;
            let timestamp = lenient_f64(M, "timestamp_seconds", timestamp_field(obj))?;
            Ok(DetectionItem {
                label: label(obj)?,
                timestamp,
            })
        })
        .collect();
    Attempt::Match(parsed)
}

fn parse_frame_list(frames: &[Value]) -> Result<Vec<DetectionItem>, ParseError> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend(parse_frame(as_object(frame, "frame")?)?);
    }
    Ok(out)
}

/// Every detection in a frame inherits the frame's timestamp.
fn parse_frame(frame: &Map<String, Value>) -> Result<Vec<DetectionItem>, ParseError> {
    let timestamp = lenient_f64(M, "timestamp_seconds", timestamp_field(frame))?;
    let detections = match frame.get("detections") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(detections)) => detections,
        Some(other) => {
            return Err(ParseError::field(
                M,
                "detections",
                format!("expected array, found {}", json_type(other)),
            ))
        }
    };

    detections
        .iter()
        .map(|detection| -> Result<DetectionItem, ParseError> {
            Ok(DetectionItem {
                label: label(as_object(detection, "detections[]")?)?,
                timestamp,
            })
        })
        .collect()
}

fn timestamp_field(obj: &Map<String, Value>) -> Option<&Value> {
    obj.get("timestamp_seconds").or_else(|| obj.get("timestamp"))
}

fn label(obj: &Map<String, Value>) -> Result<String, ParseError> {
    lenient_string(
        M,
        "class_name",
        obj.get("class_name").or_else(|| obj.get("label")),
    )
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value.as_object().ok_or_else(|| {
        ParseError::field(M, what, format!("expected object, found {}", json_type(value)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(items: &[DetectionItem]) -> Vec<(&str, f64)> {
        items.iter().map(|d| (d.label.as_str(), d.timestamp)).collect()
    }

    #[test]
    fn test_results_layout() {
        let doc = json!({"results": [
            {"frame_id": 0, "timestamp_seconds": 0.0, "detections": [
                {"class_name": "person", "confidence": 0.9},
                {"class_name": "ball"}
            ]},
            {"frame_id": 30, "timestamp_seconds": 1.0, "detections": []},
            {"frame_id": 60, "timestamp_seconds": 2.0, "detections": [{"class_name": "person"}]}
        ]});
        let items = parse_detection(&doc).unwrap();
        assert_eq!(
            labels(&items),
            vec![("person", 0.0), ("ball", 0.0), ("person", 2.0)]
        );
    }

    #[test]
    fn test_single_frame_layout() {
        let doc = json!({"frame_id": 12, "timestamp_seconds": 0.4, "detections": [
            {"class_name": "car"}
        ]});
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("car", 0.4)]);
    }

    #[test]
    fn test_frames_layout() {
        let doc = json!({"video": "a.mp4", "frames": [
            {"timestamp_seconds": "3.5", "detections": [{"class_name": "dog"}]},
            {"timestamp_seconds": 4}
        ]});
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("dog", 3.5)]);
    }

    #[test]
    fn test_flat_layout_with_aliases() {
        let doc = json!({"detections": [
            {"timestamp_seconds": 1.0, "class_name": "cat"},
            {"timestamp": 2.0, "label": "bird"},
            {"class_name": "cup"}
        ]});
        assert_eq!(
            labels(&parse_detection(&doc).unwrap()),
            vec![("cat", 1.0), ("bird", 2.0), ("cup", 0.0)]
        );
    }

    #[test]
    fn test_results_wins_over_later_layouts() {
        let doc = json!({
            "results": [{"timestamp_seconds": 1.0, "detections": [{"class_name": "a"}]}],
            "frames": [{"timestamp_seconds": 2.0, "detections": [{"class_name": "b"}]}],
            "detections": [{"timestamp_seconds": 3.0, "class_name": "c"}]
        });
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("a", 1.0)]);
    }

    #[test]
    fn test_frames_wins_over_flat() {
        let doc = json!({
            "frames": [{"timestamp_seconds": 2.0, "detections": [{"class_name": "b"}]}],
            "detections": [{"timestamp_seconds": 3.0, "class_name": "c"}]
        });
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("b", 2.0)]);
    }

    #[test]
    fn test_single_frame_wins_over_flat() {
        // Also a valid flat document, but the frame timestamp applies.
        let doc = json!({"frame_id": 1, "timestamp_seconds": 9.0, "detections": [
            {"timestamp_seconds": 1.0, "class_name": "kite"}
        ]});
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("kite", 9.0)]);
    }

    #[test]
    fn test_non_array_results_falls_through() {
        let doc = json!({"results": {"status": "ok"}, "detections": [
            {"timestamp_seconds": 5.0, "class_name": "tree"}
        ]});
        assert_eq!(labels(&parse_detection(&doc).unwrap()), vec![("tree", 5.0)]);
    }

    #[test]
    fn test_unrecognized_layout() {
        let err = parse_detection(&json!({"objects": []})).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedShape { .. }));
        assert!(parse_detection(&json!([{"class_name": "x"}])).is_err());
    }

    #[test]
    fn test_matched_layout_with_bad_field_fails() {
        let doc = json!({"results": [{"timestamp_seconds": "later", "detections": []}]});
        assert!(matches!(
            parse_detection(&doc).unwrap_err(),
            ParseError::InvalidField { .. }
        ));
    }
}
