//! Network output to image conversion and saving

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use candle_core::Tensor;
use image::RgbImage;

/// Converts network output tensors back to images
pub struct ImageOutput;

impl ImageOutput {
    /// Convert a network output tensor to an RGB image.
    ///
    /// # Arguments
    /// * `tensor` - Output of shape (1, 3, height, width), 0-255 scale
    ///
    /// # Returns
    /// RGB image with values clamped and rounded to u8
    pub fn to_image(tensor: &Tensor) -> Result<RgbImage> {
        let (_, channels, height, width) = tensor.dims4()?;
        if channels != 3 {
            return Err(anyhow!("expected 3 output channels, got {channels}"));
        }

        let values = tensor
            .squeeze(0)?
            .clamp(0f32, 255f32)?
            .permute((1, 2, 0))?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let bytes: Vec<u8> = values.iter().map(|v| v.round() as u8).collect();

        RgbImage::from_raw(width as u32, height as u32, bytes)
            .ok_or_else(|| anyhow!("output buffer does not match {width}x{height}"))
    }

    /// Save an image to disk; the format follows the file extension
    pub fn save<P: AsRef<Path>>(img: &RgbImage, path: P) -> Result<()> {
        let path = path.as_ref();
        img.save(path)
            .with_context(|| format!("Failed to save image: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_to_image_roundtrip() {
        let device = Device::Cpu;
        let img = RgbImage::from_fn(4, 2, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 20) as u8, 200])
        });

        let tensor = crate::image::ImageLoader::preprocess(&img, &device).unwrap();
        let restored = ImageOutput::to_image(&tensor).unwrap();
        assert_eq!(restored, img);
    }

    #[test]
    fn test_to_image_clamps_out_of_range() {
        let device = Device::Cpu;
        let data = vec![-50f32, 300.0, 128.0, 0.0, 255.0, 12.6];
        let tensor = Tensor::from_vec(data, (1, 3, 1, 2), &device).unwrap();

        let img = ImageOutput::to_image(&tensor).unwrap();
        let pixel0 = img.get_pixel(0, 0);
        let pixel1 = img.get_pixel(1, 0);
        // Channel-major input: R=-50,300  G=128,0  B=255,12.6
        assert_eq!(pixel0.0, [0, 128, 255]);
        assert_eq!(pixel1.0, [255, 0, 13]);
    }

    #[test]
    fn test_to_image_rejects_wrong_channels() {
        let device = Device::Cpu;
        let tensor = Tensor::zeros((1, 1, 2, 2), candle_core::DType::F32, &device).unwrap();
        assert!(ImageOutput::to_image(&tensor).is_err());
    }
}
