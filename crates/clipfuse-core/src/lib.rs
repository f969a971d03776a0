//! # clipfuse core
//!
//! Pure, I/O-free logic for clipfuse: the timed data model, the
//! per-modality producer adapters, the temporal fusion engine, and the
//! output envelope.
//!
//! This crate contains no tokio, network, or filesystem code. Storage,
//! configuration and the trigger entry point live in the `clipfuse`
//! application crate.
//!
//! ```text
//! raw JSON ──▶ adapters ──▶ ModalityBatch ──▶ fusion::fuse ──▶ Envelope
//! ```

pub mod adapters;
pub mod envelope;
pub mod error;
pub mod fusion;
pub mod models;
