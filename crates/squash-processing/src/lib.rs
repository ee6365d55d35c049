//! Squash Processing Library
//!
//! Size-targeted compressors for images and PDF documents.
//!
//! - [`ImageCompressor`] searches encoder quality and output width until the
//!   encoding fits a byte budget.
//! - [`DocumentCompressor`] walks a ladder of rendering presets through an
//!   external PDF engine and stops at the first one that fits.

pub mod document;
pub mod image;

pub use document::{
    probe_pdf_engine, CompressedDocument, DocumentCompressor, GhostscriptRenderer, PdfRenderer,
    RenderError, RenderPreset, DEFAULT_PRESET, PRESET_LADDER,
};
pub use crate::image::{CompressedImage, ImageCompressor, ImageEncode, OutputFormat, RasterEncoder};
