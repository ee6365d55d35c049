use image::{DynamicImage, GenericImageView, ImageFormat};

/// Lowest quality the encoders accept.
pub const MIN_QUALITY: u8 = 1;
/// Highest quality the encoders accept.
pub const MAX_QUALITY: u8 = 100;
/// Quality probed first after each width reduction.
pub const MID_QUALITY: u8 = 50;

/// Output format for compressed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Pick the output format for a decoded source.
    ///
    /// JPEG, PNG and WebP keep their format. Anything else becomes PNG when it
    /// carries transparency and JPEG otherwise.
    pub fn for_source(source: Option<ImageFormat>, img: &DynamicImage) -> Self {
        match source {
            Some(ImageFormat::Jpeg) => OutputFormat::Jpeg,
            Some(ImageFormat::Png) => OutputFormat::Png,
            Some(ImageFormat::WebP) => OutputFormat::WebP,
            _ if has_meaningful_alpha(img) => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Quality used when no target size was requested.
    pub fn preset_quality(self) -> u8 {
        match self {
            OutputFormat::Jpeg => 80,
            OutputFormat::Png => 80,
            OutputFormat::WebP => 80,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

/// Check if image has meaningful alpha channel (not fully opaque)
pub fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }

    let rgba = img.to_rgba8();
    let (width, height) = img.dimensions();

    // Sample alpha channel (every 10th pixel for performance)
    for y in (0..height).step_by(10) {
        for x in (0..width).step_by(10) {
            if rgba.get_pixel(x, y)[3] < 255 {
                return true;
            }
        }
    }
    false
}
