use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;
use thiserror::Error;

/// Longest side, in pixels, of a stored attachment.
pub const MAX_SIDE: u32 = 1080;
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("decode base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("encode jpeg: {0}")]
    Encode(#[source] image::ImageError),
}

/// Strips an optional `data:image/...;base64,` prefix.
fn strip_data_url(input: &str) -> &str {
    match input.find(',') {
        Some(i) if input[..i].contains("base64") => &input[i + 1..],
        _ => input,
    }
}

/// Decodes a base64 image, downsizes it so neither side exceeds [`MAX_SIDE`],
/// and re-encodes it as JPEG. Returns plain base64 without a data URL prefix.
pub fn normalize_base64(input: &str) -> Result<String, ImageError> {
    let raw = BASE64.decode(strip_data_url(input.trim()))?;
    let mut img = image::load_from_memory(&raw).map_err(ImageError::Decode)?;

    let (w, h) = img.dimensions();
    if w > MAX_SIDE || h > MAX_SIDE {
        // resize() keeps the aspect ratio inside the bounding box
        img = img.resize(MAX_SIDE, MAX_SIDE, FilterType::Lanczos3);
    }

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(ImageError::Encode)?;

    Ok(BASE64.encode(buf.into_inner()))
}

#[cfg(test)]
pub(crate) fn sample_png_base64(width: u32, height: u32) -> String {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    BASE64.encode(buf.into_inner())
}
