#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Container status normalization.
//!
//! Turns operator emails, partner JSON, CSV exports, and table rows into
//! [`NormalizedStatusEvent`]s:
//!
//! 1. [`detect`] classifies the raw input
//! 2. [`extract`] pulls candidate fields out of it
//! 3. [`validate`] checks each candidate against the identifier rules,
//!    the gazetteer, and the status vocabulary
//! 4. [`pipeline::Pipeline`] drives the stages and aggregates confidence
//!
//! No stage fails outright: problems surface as errors and warnings next
//! to a confidence score.

pub mod audit;
pub mod config;
pub mod detect;
pub mod extract;
pub mod fields;
pub mod identifier;
pub mod location;
pub mod parsing;
pub mod pipeline;
pub mod progress;
pub mod status_mapping;
pub mod validate;

pub use audit::{AuditEntry, AuditSink, BoundedAuditLog};
pub use boxtrack_normalize_models::NormalizedStatusEvent;
pub use config::{ConfigError, PipelineConfig, ScoringConfig};
pub use pipeline::Pipeline;
pub use progress::{NullProgress, ProgressCallback};
