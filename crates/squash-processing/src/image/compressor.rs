use anyhow::{Context, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use squash_core::constants::MAX_IMAGE_DIMENSION;
use squash_core::TargetSize;
use std::io::Cursor;

use super::encoder::{ImageEncode, RasterEncoder};
use super::format::OutputFormat;
use super::search::fit_to_target;

/// Result of one image compression.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub data: Bytes,
    pub format: OutputFormat,
    pub quality: u8,
    pub width: u32,
    pub met_target: bool,
    pub encodes: usize,
}

/// Size-targeted image compressor.
///
/// Synchronous and stateless: callers on an async runtime should run it inside
/// `spawn_blocking`.
#[derive(Debug, Clone, Copy)]
pub struct ImageCompressor {
    max_dimension: u32,
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self::new(MAX_IMAGE_DIMENSION)
    }
}

impl ImageCompressor {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode `data`, bound its dimensions, and encode it either once at the
    /// format preset or through the size search when a target is given.
    pub fn compress(&self, data: &[u8], target: Option<TargetSize>) -> Result<CompressedImage> {
        let (img, source_format) = decode(data)?;
        let img = self.bound(img);
        let format = OutputFormat::for_source(source_format, &img);

        tracing::debug!(
            source_format = ?source_format,
            output_format = ?format,
            dimensions = ?img.dimensions(),
            target_bytes = target.map(TargetSize::bytes),
            "Compressing image"
        );

        let encoder = RasterEncoder::new(img, format);
        let compressed = Self::compress_with(&encoder, target)?;
        Ok(CompressedImage {
            format,
            ..compressed
        })
    }

    /// Run the no-target preset or the size search on any encoder.
    ///
    /// The returned `format` is a placeholder for encoders that are not
    /// [`RasterEncoder`]s; [`compress`](Self::compress) overwrites it.
    pub fn compress_with<E: ImageEncode + ?Sized>(
        encoder: &E,
        target: Option<TargetSize>,
    ) -> Result<CompressedImage> {
        match target {
            None => {
                let quality = encoder.preset_quality();
                let data = encoder
                    .encode(quality, None)
                    .context("Failed to encode image at preset quality")?;
                Ok(CompressedImage {
                    data: Bytes::from(data),
                    format: OutputFormat::Jpeg,
                    quality,
                    width: encoder.native_width(),
                    met_target: true,
                    encodes: 1,
                })
            }
            Some(target) => {
                let outcome = fit_to_target(encoder, target.bytes())
                    .context("Failed to encode image during size search")?;
                Ok(CompressedImage {
                    data: Bytes::from(outcome.data),
                    format: OutputFormat::Jpeg,
                    quality: outcome.quality,
                    width: outcome.width,
                    met_target: outcome.met_target,
                    encodes: outcome.encodes,
                })
            }
        }
    }

    /// Downscale so neither side exceeds `max_dimension`, keeping aspect ratio.
    fn bound(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width <= self.max_dimension && height <= self.max_dimension {
            return img;
        }

        tracing::debug!(
            width,
            height,
            max_dimension = self.max_dimension,
            "Downscaling oversized image"
        );
        img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
    }
}

/// Decode with EXIF orientation applied.
fn decode(data: &[u8]) -> Result<(DynamicImage, Option<image::ImageFormat>)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to read image header")?;
    let format = reader.format();

    let mut decoder = reader.into_decoder().context("Unsupported image format")?;
    let orientation = decoder.orientation().ok();
    let mut img = DynamicImage::from_decoder(decoder).context("Failed to decode image")?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }

    Ok((img, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::cell::Cell;

    fn noisy(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
        }))
    }

    fn encode_as(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        buffer
    }

    struct CountingEncoder {
        calls: Cell<usize>,
    }

    impl ImageEncode for CountingEncoder {
        fn native_width(&self) -> u32 {
            640
        }

        fn encode(&self, quality: u8, _width: Option<u32>) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![0; quality as usize])
        }

        fn preset_quality(&self) -> u8 {
            80
        }
    }

    #[test]
    fn test_no_target_encodes_exactly_once() {
        let encoder = CountingEncoder {
            calls: Cell::new(0),
        };
        let result = ImageCompressor::compress_with(&encoder, None).unwrap();
        assert_eq!(encoder.calls.get(), 1);
        assert_eq!(result.encodes, 1);
        assert_eq!(result.quality, 80);
        assert!(result.met_target);
    }

    #[test]
    fn test_oversized_image_is_bounded_and_reencoded() {
        // Scaled-down version of the 5000x3000 case, with a 400px bound.
        let source = encode_as(&noisy(500, 300), ImageFormat::Jpeg);
        let compressor = ImageCompressor::new(400);

        let result = compressor.compress(&source, None).unwrap();
        assert_eq!(result.format, OutputFormat::Jpeg);
        assert_eq!(result.encodes, 1);

        let decoded = image::load_from_memory(&result.data).unwrap();
        assert_eq!(decoded.dimensions(), (400, 240));
    }

    #[test]
    fn test_png_target_is_met() {
        let source = encode_as(&noisy(256, 256), ImageFormat::Png);
        let target = TargetSize::from_kb(20).unwrap();

        let result = ImageCompressor::default()
            .compress(&source, Some(target))
            .unwrap();

        assert_eq!(result.format, OutputFormat::Png);
        assert!(result.met_target);
        assert!(result.data.len() as u64 <= target.bytes());
        assert_eq!(
            image::guess_format(&result.data).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_jpeg_target_is_met() {
        let source = encode_as(&noisy(300, 200), ImageFormat::Jpeg);
        let target = TargetSize::from_kb(4).unwrap();

        let result = ImageCompressor::default()
            .compress(&source, Some(target))
            .unwrap();

        assert!(result.met_target);
        assert!(result.data.len() as u64 <= target.bytes());
    }

    #[test]
    fn test_webp_target_is_met() {
        let img = noisy(240, 160);
        let rgb = img.to_rgb8();
        let source = webp::Encoder::from_rgb(&rgb, 240, 160).encode(90.0).to_vec();
        let target = TargetSize::from_kb(3).unwrap();

        let result = ImageCompressor::default()
            .compress(&source, Some(target))
            .unwrap();

        assert_eq!(result.format, OutputFormat::WebP);
        assert!(result.met_target);
        assert!(result.data.len() as u64 <= target.bytes());
        assert_eq!(
            image::guess_format(&result.data).unwrap(),
            ImageFormat::WebP
        );
    }

    #[test]
    fn test_other_formats_become_jpeg() {
        let source = encode_as(&noisy(64, 64), ImageFormat::Bmp);
        let result = ImageCompressor::default().compress(&source, None).unwrap();
        assert_eq!(result.format, OutputFormat::Jpeg);
        assert_eq!(
            image::guess_format(&result.data).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result = ImageCompressor::default().compress(b"definitely not an image", None);
        assert!(result.is_err());
    }
}
