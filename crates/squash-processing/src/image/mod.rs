//! Image compression
//!
//! - `format`: output format policy and per-format presets
//! - `encoder`: the encode-at-quality-and-width primitive
//! - `search`: quality/width search against a byte budget
//! - `compressor`: decode, bound, then encode or search

pub mod compressor;
pub mod encoder;
pub mod format;
pub mod search;

pub use compressor::{CompressedImage, ImageCompressor};
pub use encoder::{ImageEncode, RasterEncoder};
pub use format::OutputFormat;
pub use search::{fit_to_target, SearchOutcome};
