//! Image preprocessing
//!
//! Turns an uploaded, encoded image into the `[1, H, W, 3]` tensor the model
//! expects. The steps mirror the training pipeline exactly:
//!
//! 1. decode (format sniffed from content) and convert to 8-bit colour
//! 2. resize to 224×224 with a bilinear filter
//! 3. non-local means colour denoising with fixed parameters
//! 4. lay out as NHWC `f32` in BGR order, values left in `[0, 255]`
//!
//! Any scaling of pixel values happens inside the model.

pub mod denoise;

use std::io::Cursor;

use image::{imageops::FilterType, DynamicImage, ImageDecoder, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, WeatherVisionError};
use crate::IMAGE_SIZE;

pub use denoise::{denoise_colored, DenoiseParams};

/// Number of colour channels in the model input
pub const CHANNELS: usize = 3;

/// Channel order of the emitted tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    /// Order produced by the decoder used at training time
    Bgr,
}

/// Preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length of the square model input
    pub image_size: u32,
    /// Denoising applied after resizing (`None` skips it)
    pub denoise: Option<DenoiseParams>,
    /// Channel order of the output tensor
    pub channel_order: ChannelOrder,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: IMAGE_SIZE,
            denoise: Some(DenoiseParams::default()),
            channel_order: ChannelOrder::Bgr,
        }
    }
}

impl PreprocessConfig {
    /// Skip the denoising step
    pub fn without_denoise(mut self) -> Self {
        self.denoise = None;
        self
    }

    /// Configure the channel order
    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }
}

/// A single image laid out as `[1, height, width, 3]` (NHWC)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl ImageTensor {
    /// Build a tensor from an RGB image
    pub fn from_rgb(image: &RgbImage, order: ChannelOrder) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            let ordered = match order {
                ChannelOrder::Rgb => [r, g, b],
                ChannelOrder::Bgr => [b, g, r],
            };
            data.extend(ordered.iter().map(|&c| c as f32));
        }

        Self {
            data,
            height: height as usize,
            width: width as usize,
        }
    }

    /// Wrap raw NHWC data; fails if the length does not match the shape
    pub fn from_raw(data: Vec<f32>, height: usize, width: usize) -> Result<Self> {
        let expected = height * width * CHANNELS;
        if data.len() != expected {
            return Err(WeatherVisionError::InvalidInput(format!(
                "tensor data has {} values, expected {} for {}x{}x{}",
                data.len(),
                expected,
                height,
                width,
                CHANNELS
            )));
        }
        Ok(Self { data, height, width })
    }

    /// `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.height, self.width, CHANNELS]
    }

    /// Value at row `y`, column `x`, channel `c`
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= self.height || x >= self.width || c >= CHANNELS {
            return None;
        }
        self.data.get((y * self.width + x) * CHANNELS + c).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Decode encoded image bytes to 8-bit RGB.
///
/// The format is detected from the content and the EXIF orientation, if any,
/// is applied so the pixels come out upright. Alpha is dropped and grayscale
/// expanded to three channels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(WeatherVisionError::ImageDecode(
            "image payload is empty".to_string(),
        ));
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| WeatherVisionError::ImageDecode(e.to_string()))?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}

/// Resize an image to a square of `size` pixels with a bilinear filter
pub fn resize_image(image: &RgbImage, size: u32) -> RgbImage {
    if image.dimensions() == (size, size) {
        return image.clone();
    }
    image::imageops::resize(image, size, size, FilterType::Triangle)
}

/// Run the full preprocessing pipeline on an already decoded image
pub fn preprocess_rgb(image: &RgbImage, config: &PreprocessConfig) -> ImageTensor {
    let resized = resize_image(image, config.image_size);
    let smoothed = match &config.denoise {
        Some(params) => denoise_colored(&resized, params),
        None => resized,
    };
    ImageTensor::from_rgb(&smoothed, config.channel_order)
}

/// Decode and preprocess raw image bytes into a model input tensor
pub fn preprocess_image(bytes: &[u8], config: &PreprocessConfig) -> Result<ImageTensor> {
    let image = decode_image(bytes)?;
    tracing::debug!(
        "Decoded {}x{} image ({} bytes)",
        image.width(),
        image.height(),
        bytes.len()
    );
    Ok(preprocess_rgb(&image, config))
}
