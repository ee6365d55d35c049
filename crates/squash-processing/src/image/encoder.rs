use anyhow::Result;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};
use std::borrow::Cow;

use super::format::{has_meaningful_alpha, OutputFormat, MAX_QUALITY, MIN_QUALITY};

/// The encode primitive the size search drives.
///
/// `encode(quality, width)` must produce output whose size does not decrease as
/// quality rises at a fixed width.
pub trait ImageEncode {
    /// Width of the source at native resolution, in pixels.
    fn native_width(&self) -> u32;

    /// Encode at `quality` (1..=100). `width` of `None` keeps the native width;
    /// otherwise the image is scaled to `width` keeping its aspect ratio.
    fn encode(&self, quality: u8, width: Option<u32>) -> Result<Vec<u8>>;

    /// Quality used when there is no target size.
    fn preset_quality(&self) -> u8;
}

/// Encoder backed by a decoded raster image.
pub struct RasterEncoder {
    image: DynamicImage,
    format: OutputFormat,
    alpha: bool,
}

impl RasterEncoder {
    pub fn new(image: DynamicImage, format: OutputFormat) -> Self {
        let alpha = has_meaningful_alpha(&image);
        Self {
            image,
            format,
            alpha,
        }
    }

    fn scaled(&self, width: Option<u32>) -> Cow<'_, DynamicImage> {
        let (native_w, native_h) = self.image.dimensions();
        match width {
            Some(w) if w != native_w => {
                let w = w.max(1);
                let h = ((native_h as f64 * w as f64 / native_w as f64).round() as u32).max(1);
                Cow::Owned(self.image.resize_exact(w, h, FilterType::Triangle))
            }
            _ => Cow::Borrowed(&self.image),
        }
    }

    /// Compress to JPEG using mozjpeg
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        Ok(comp.finish()?)
    }

    /// Compress to PNG after reducing colour levels according to quality.
    fn encode_png(img: &DynamicImage, quality: u8, alpha: bool) -> Result<Vec<u8>> {
        let levels = quantization_levels(quality);
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);

        if alpha {
            let mut rgba = img.to_rgba8();
            for pixel in rgba.pixels_mut() {
                for channel in pixel.0.iter_mut().take(3) {
                    *channel = posterize(*channel, levels);
                }
            }
            let (w, h) = rgba.dimensions();
            encoder.write_image(&rgba, w, h, ExtendedColorType::Rgba8)?;
        } else {
            let mut rgb = img.to_rgb8();
            for channel in rgb.iter_mut() {
                *channel = posterize(*channel, levels);
            }
            let (w, h) = rgb.dimensions();
            encoder.write_image(&rgb, w, h, ExtendedColorType::Rgb8)?;
        }

        Ok(buffer)
    }

    /// Compress to lossy WebP
    fn encode_webp(img: &DynamicImage, quality: u8, alpha: bool) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();
        let data = if alpha {
            let rgba = img.to_rgba8();
            webp::Encoder::from_rgba(&rgba, width, height)
                .encode(quality as f32)
                .to_vec()
        } else {
            let rgb = img.to_rgb8();
            webp::Encoder::from_rgb(&rgb, width, height)
                .encode(quality as f32)
                .to_vec()
        };
        Ok(data)
    }
}

impl ImageEncode for RasterEncoder {
    fn native_width(&self) -> u32 {
        self.image.width()
    }

    fn encode(&self, quality: u8, width: Option<u32>) -> Result<Vec<u8>> {
        let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let img = self.scaled(width);

        match self.format {
            OutputFormat::Jpeg => Self::encode_jpeg(&img, quality),
            OutputFormat::Png => Self::encode_png(&img, quality, self.alpha),
            OutputFormat::WebP => Self::encode_webp(&img, quality, self.alpha),
        }
    }

    fn preset_quality(&self) -> u8 {
        self.format.preset_quality()
    }
}

/// Number of levels kept per colour channel: 2 at quality 1, 256 at quality 100.
fn quantization_levels(quality: u8) -> u32 {
    let q = quality.clamp(MIN_QUALITY, MAX_QUALITY) as u32;
    2 + (q - 1) * 254 / 99
}

fn posterize(value: u8, levels: u32) -> u8 {
    if levels >= 256 {
        return value;
    }
    let steps = levels - 1;
    let bucket = (value as u32 * steps + 127) / 255;
    ((bucket * 255 + steps / 2) / steps) as u8
}
