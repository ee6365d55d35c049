//! Defaults shared by configuration and the compressors.

/// Largest width or height an image may keep before the size search starts.
pub const MAX_IMAGE_DIMENSION: u32 = 4000;

/// Age after which the reaper deletes an artifact.
pub const ARTIFACT_TTL_SECS: u64 = 120;

/// Delay between two reaper sweeps.
pub const REAPER_INTERVAL_SECS: u64 = 60;

/// Upper bound for one PDF rendering engine invocation.
pub const PDF_RENDER_TIMEOUT_SECS: u64 = 120;

/// Executable names tried, in order, when probing for Ghostscript.
pub const PDF_ENGINE_CANDIDATES: &[&str] = &["gs", "gswin64c", "gswin32c"];
