//! Image preprocessing into model-ready tensors
//!
//! Mirrors the hub's ViT image processor: resize, rescale to `[0, 1]`,
//! normalize per channel, and lay out as `(1, 3, H, W)`.

use candle_core::{DType, Device, Tensor};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vitserve_core::{Error, Result};

use crate::model_err;

/// Contents of a model's `preprocessor_config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProcessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,

    #[serde(default)]
    pub size: ImageSize,

    /// PIL resampling filter code
    #[serde(default = "default_resample")]
    pub resample: u8,

    #[serde(default = "default_true")]
    pub do_rescale: bool,

    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f64,

    #[serde(default = "default_true")]
    pub do_normalize: bool,

    #[serde(default = "default_channel_stat")]
    pub image_mean: Vec<f32>,

    #[serde(default = "default_channel_stat")]
    pub image_std: Vec<f32>,
}

/// Target size; the hub writes this in several shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageSize {
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
    Square(u32),
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::HeightWidth {
            height: 224,
            width: 224,
        }
    }
}

impl ImageSize {
    /// `(width, height)` of the resized image
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Self::HeightWidth { height, width } => (width, height),
            Self::ShortestEdge { shortest_edge } => (shortest_edge, shortest_edge),
            Self::Square(edge) => (edge, edge),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_resample() -> u8 {
    2
}

fn default_rescale_factor() -> f64 {
    1.0 / 255.0
}

fn default_channel_stat() -> Vec<f32> {
    vec![0.5, 0.5, 0.5]
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: ImageSize::default(),
            resample: default_resample(),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: default_channel_stat(),
            image_std: default_channel_stat(),
        }
    }
}

impl ImageProcessorConfig {
    /// Load and validate a `preprocessor_config.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resize to a square of `edge` pixels
    pub fn with_size(mut self, edge: u32) -> Self {
        self.size = ImageSize::Square(edge);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.image_mean.len() != 3 || self.image_std.len() != 3 {
            return Err(Error::config(format!(
                "image_mean and image_std must have 3 channels, got {} and {}",
                self.image_mean.len(),
                self.image_std.len()
            )));
        }
        if self.image_std.iter().any(|s| *s == 0.0) {
            return Err(Error::config("image_std must not contain zeros"));
        }
        let (width, height) = self.size.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::config("preprocessor size must be non-zero"));
        }
        Ok(())
    }

    fn filter(&self) -> FilterType {
        match self.resample {
            0 => FilterType::Nearest,
            1 => FilterType::Lanczos3,
            3 => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        }
    }
}

/// Converts decoded images into the tensor layout a classifier expects
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: ImageProcessorConfig,
}

impl ImageProcessor {
    pub fn new(config: ImageProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ImageProcessorConfig {
        &self.config
    }

    /// Preprocess one image into a `(1, 3, H, W)` f32 tensor on `device`
    pub fn preprocess(&self, image: &RgbImage, device: &Device) -> Result<Tensor> {
        let resized;
        let image = if self.config.do_resize {
            let (width, height) = self.config.size.dimensions();
            if image.dimensions() == (width, height) {
                image
            } else {
                resized = imageops::resize(image, width, height, self.config.filter());
                &resized
            }
        } else {
            image
        };

        let (width, height) = image.dimensions();
        let mut pixels = Tensor::from_vec(
            image.as_raw().clone(),
            (height as usize, width as usize, 3),
            &Device::Cpu,
        )
        .map_err(model_err("Failed to create pixel tensor"))?
        .permute((2, 0, 1))
        .map_err(model_err("Failed to permute pixel tensor"))?
        .to_dtype(DType::F32)
        .map_err(model_err("Failed to convert pixel tensor"))?;

        if self.config.do_rescale {
            pixels = pixels
                .affine(self.config.rescale_factor, 0.0)
                .map_err(model_err("Failed to rescale pixels"))?;
        }

        if self.config.do_normalize {
            let mean = channel_tensor(&self.config.image_mean)?;
            let std = channel_tensor(&self.config.image_std)?;
            pixels = pixels
                .broadcast_sub(&mean)
                .map_err(model_err("Failed to normalize pixels"))?
                .broadcast_div(&std)
                .map_err(model_err("Failed to normalize pixels"))?;
        }

        pixels
            .unsqueeze(0)
            .map_err(model_err("Failed to add batch dimension"))?
            .to_device(device)
            .map_err(model_err("Failed to move pixels to device"))
    }
}

fn channel_tensor(values: &[f32]) -> Result<Tensor> {
    Tensor::new(values, &Device::Cpu)
        .and_then(|t| t.reshape((3, 1, 1)))
        .map_err(model_err("Failed to build channel statistics"))
}
