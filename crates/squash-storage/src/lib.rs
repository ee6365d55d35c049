//! Squash Storage Library
//!
//! This crate provides the artifact store abstraction and its local filesystem
//! implementation.
//!
//! # Layout
//!
//! Two flat directories, one per [`ArtifactKind`]: the upload staging area and the
//! output staging area. Every artifact is a single file named by its
//! [`ArtifactId`]. Besides artifacts, a staging directory may briefly hold
//! in-flight write files (`.tmp-*`) and delivery claim files (`.claim-*`); both
//! are listed by [`ArtifactStore::list`] so an abandoned one is still reaped.
//!
//! [`ArtifactKind`]: squash_core::ArtifactKind
//! [`ArtifactId`]: squash_core::ArtifactId

pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalArtifactStore;
pub use traits::{ArtifactStore, Claim, DeleteOutcome, StorageError, StorageResult};
