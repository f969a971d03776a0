//! # clipfuse
//!
//! Temporal multi-modal metadata fusion for video.
//!
//! clipfuse gathers independently produced annotation documents for one
//! source video (a speech transcript, video embedding segments, and object
//! detections) from object storage, fuses them into time-bounded clips, and
//! writes a consolidated JSON envelope back to storage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────┐
//! │ ObjectStore  │──▶│ Collector  │──▶│  Fusion  │──▶│ Sink Writer │
//! │ S3 / FS / mem│   │ + adapters │   │  (core)  │   │  envelope   │
//! └──────────────┘   └────────────┘   └──────────┘   └─────────────┘
//!          ▲                                                │
//!          └──────────── Trigger Handler ◀──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`storage`] | Object store trait and backends |
//! | [`collector`] | Per-prefix collection and adaptation |
//! | [`sink`] | Envelope persistence |
//! | [`trigger`] | Notification entry point and status results |
//!
//! The pure model, adapters and fusion engine are re-exported from
//! [`clipfuse_core`] as [`core`].

pub mod collector;
pub mod config;
pub mod sink;
pub mod storage;
pub mod trigger;

pub use clipfuse_core as core;
