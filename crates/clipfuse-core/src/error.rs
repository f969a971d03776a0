//! Error types shared by the adapters and configuration layer.

use thiserror::Error;

use crate::models::Modality;

/// A modality document that does not match any recognized schema.
///
/// Adapters return this for unrecognized shapes and wrongly typed fields.
/// Missing optional fields are never a parse error; they default to `0`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("{modality} document has unrecognized shape: {reason}")]
    UnrecognizedShape { modality: Modality, reason: String },

    #[error("{modality} field '{field}' is invalid: {reason}")]
    InvalidField {
        modality: Modality,
        field: String,
        reason: String,
    },
}

impl ParseError {
    pub(crate) fn shape(modality: Modality, reason: impl Into<String>) -> Self {
        Self::UnrecognizedShape {
            modality,
            reason: reason.into(),
        }
    }

    pub(crate) fn field(modality: Modality, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            modality,
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A wiring or configuration mistake. Never converted into a skipped file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported modality tag: '{0}' (expected one of: {tags})", tags = crate::models::Modality::known_tags().join(", "))]
    UnsupportedModality(String),

    #[error("invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}
