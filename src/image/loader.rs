//! Image file loading and preprocessing

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use image::RgbImage;

/// Image loader producing network-ready tensors
pub struct ImageLoader;

impl ImageLoader {
    /// Load an image file as RGB, optionally bounding its longest side.
    ///
    /// When `max_size` is set the image is rescaled by
    /// `max_size / max(width, height)` with Lanczos filtering, which keeps
    /// CPU inference time predictable.
    pub fn load<P: AsRef<Path>>(path: P, max_size: Option<u32>) -> Result<RgbImage> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("Failed to open image: {:?}", path))?
            .to_rgb8();

        Ok(match max_size {
            Some(max) => Self::resize_to_fit(&img, max),
            None => img,
        })
    }

    /// Rescale so the longest side equals `max_size`, preserving aspect ratio
    pub fn resize_to_fit(img: &RgbImage, max_size: u32) -> RgbImage {
        let (width, height) = img.dimensions();
        let longest = width.max(height);
        if longest == max_size {
            return img.clone();
        }

        let ratio = max_size as f32 / longest as f32;
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);
        image::imageops::resize(img, new_width, new_height, FilterType::Lanczos3)
    }

    /// Convert an RGB image to a network input tensor.
    ///
    /// # Arguments
    /// * `img` - RGB image
    /// * `device` - Device to place the tensor on
    ///
    /// # Returns
    /// Tensor of shape (1, 3, height, width), values 0-255
    pub fn preprocess(img: &RgbImage, device: &Device) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        let data: Vec<f32> = img.as_raw().iter().map(|&v| v as f32).collect();

        let tensor = Tensor::from_vec(data, (height as usize, width as usize, 3), device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)?;
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    #[test]
    fn test_resize_bounds_longest_side() {
        let img = gradient_image(64, 32);
        let resized = ImageLoader::resize_to_fit(&img, 16);
        assert_eq!(resized.dimensions(), (16, 8));
    }

    #[test]
    fn test_resize_upscales_small_images() {
        // Ratio scaling applies in both directions, matching the loader's
        // contract that the longest side always lands on max_size.
        let img = gradient_image(8, 4);
        let resized = ImageLoader::resize_to_fit(&img, 16);
        assert_eq!(resized.dimensions(), (16, 8));
    }

    #[test]
    fn test_resize_noop_at_exact_size() {
        let img = gradient_image(16, 8);
        let resized = ImageLoader::resize_to_fit(&img, 16);
        assert_eq!(resized.dimensions(), (16, 8));
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let img = gradient_image(4, 2);
        let tensor = ImageLoader::preprocess(&img, &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 2, 4]);

        // Channel 2 is constant 128 in the gradient image.
        let blue = tensor
            .get(0)
            .unwrap()
            .get(2)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(blue.iter().all(|v| (*v - 128.0).abs() < 1e-6));
    }
}
