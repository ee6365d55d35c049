//! Data models for the compression service
//!
//! `artifact` describes the blobs persisted on disk; `compression` describes what a
//! caller submits and what it receives back.

mod artifact;
mod compression;

pub use artifact::*;
pub use compression::*;
