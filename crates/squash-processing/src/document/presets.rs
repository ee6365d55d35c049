use std::path::Path;

/// One Ghostscript `pdfwrite` configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPreset {
    pub name: &'static str,
    /// Value for `-dPDFSETTINGS`.
    pub pdf_settings: &'static str,
    /// Resolution cap for colour and grey images.
    pub image_dpi: u32,
}

/// Preset used when no target size is requested.
pub const DEFAULT_PRESET: RenderPreset = RenderPreset {
    name: "ebook",
    pdf_settings: "/ebook",
    image_dpi: 150,
};

/// Presets tried in order when a target size is requested, each more
/// aggressive than the one before.
pub const PRESET_LADDER: &[RenderPreset] = &[
    DEFAULT_PRESET,
    RenderPreset {
        name: "screen",
        pdf_settings: "/screen",
        image_dpi: 110,
    },
    RenderPreset {
        name: "screen-low",
        pdf_settings: "/screen",
        image_dpi: 72,
    },
    RenderPreset {
        name: "screen-min",
        pdf_settings: "/screen",
        image_dpi: 50,
    },
];

impl RenderPreset {
    pub fn ghostscript_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let dpi = self.image_dpi;
        vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", self.pdf_settings),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            "-dSAFER".to_string(),
            "-dDetectDuplicateImages=true".to_string(),
            "-dDownsampleColorImages=true".to_string(),
            "-dColorImageDownsampleType=/Bicubic".to_string(),
            format!("-dColorImageResolution={}", dpi),
            "-dDownsampleGrayImages=true".to_string(),
            "-dGrayImageDownsampleType=/Bicubic".to_string(),
            format!("-dGrayImageResolution={}", dpi),
            "-dDownsampleMonoImages=true".to_string(),
            format!("-dMonoImageResolution={}", dpi * 2),
            format!("-sOutputFile={}", output.to_string_lossy()),
            input.to_string_lossy().to_string(),
        ]
    }
}
