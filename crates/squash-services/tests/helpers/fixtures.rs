use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

/// Deterministic pseudo-random bytes so outputs do not compress away.
fn noise(seed: u32) -> impl FnMut() -> u8 {
    let mut state = seed;
    move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state >> 24) as u8
    }
}

pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut next = noise(0x9e37_79b9);
    let img = RgbImage::from_fn(width, height, |_, _| image::Rgb([next(), next(), next()]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

pub fn translucent_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| image::Rgba([200, 40, 40, (x % 256) as u8]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// Not a real PDF; the fake renderer never parses it.
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut data = b"%PDF-1.4\n".to_vec();
    data.resize(len, b'x');
    data
}
