//! PDF compression through an external rendering engine.

pub mod compressor;
pub mod engine;
pub mod presets;

pub use compressor::{CompressedDocument, DocumentCompressor};
pub use engine::{probe_pdf_engine, GhostscriptRenderer, PdfRenderer, RenderError};
pub use presets::{RenderPreset, DEFAULT_PRESET, PRESET_LADDER};
