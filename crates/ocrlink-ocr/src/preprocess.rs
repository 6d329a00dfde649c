//! Image cleanup before text recognition
//!
//! Greyscale, stretch the histogram to the full range, then sharpen.

use image::{imageops, GrayImage, ImageFormat};
use std::path::Path;
use tracing::debug;

use crate::error::OcrResult;

/// Read `input`, clean it up and write a PNG to `output`
pub fn preprocess_file(input: &Path, output: &Path) -> OcrResult<()> {
    let image = image::open(input)?;
    let cleaned = preprocess(image.to_luma8());
    cleaned.save_with_format(output, ImageFormat::Png)?;
    debug!("Preprocessed {:?} -> {:?}", input, output);
    Ok(())
}

/// Normalize contrast and sharpen a greyscale image
pub fn preprocess(image: GrayImage) -> GrayImage {
    let normalized = normalize(image);
    imageops::unsharpen(&normalized, 1.0, 1)
}

/// Linearly stretch luma so the darkest pixel becomes 0 and the brightest 255
fn normalize(mut image: GrayImage) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    if max <= min {
        return image;
    }

    let range = u32::from(max - min);
    for pixel in image.pixels_mut() {
        let value = u32::from(pixel.0[0] - min) * 255 / range;
        pixel.0[0] = value as u8;
    }
    image
}
