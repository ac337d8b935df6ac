//! Intensity blending
//!
//! The stylization intensity control is a pixelwise weighted combination:
//! `result = original * (1 - intensity) + stylized * intensity`.

use image::imageops::FilterType;
use image::RgbImage;

/// Blend a stylized image with the original to control intensity.
///
/// The stylized image is resized back to the original's dimensions first
/// (inference may have altered them). Intensity is clamped to [0, 1]:
/// 0 returns the original, 1 the fully stylized image.
pub fn blend(original: &RgbImage, stylized: &RgbImage, intensity: f32) -> RgbImage {
    let intensity = intensity.clamp(0.0, 1.0);
    let (width, height) = original.dimensions();

    let stylized = if stylized.dimensions() == (width, height) {
        stylized.clone()
    } else {
        image::imageops::resize(stylized, width, height, FilterType::Lanczos3)
    };

    let mut out = RgbImage::new(width, height);
    for ((dst, orig), sty) in out
        .pixels_mut()
        .zip(original.pixels())
        .zip(stylized.pixels())
    {
        for c in 0..3 {
            let value =
                orig.0[c] as f32 * (1.0 - intensity) + sty.0[c] as f32 * intensity;
            dst.0[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
