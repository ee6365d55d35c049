//! Squash Core Library
//!
//! This crate provides the domain model, error taxonomy, configuration and clock
//! abstraction shared by every Squash component.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ArtifactEntry, ArtifactId, ArtifactKind, ArtifactStat, CompressionRequest,
    CompressionResult, MimeClass, TargetSize,
};
