// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Image preprocessing
//!
//! Decodes image files, resizes them to the network input size and applies
//! per-channel mean/std normalisation, producing a `(B, C, H, W)` batch.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use msfast_config::ModelConfig;
use ndarray::{Array3, Array4, Axis};
use tracing::debug;

use crate::error::{InferenceError, Result};

/// ImageNet channel means (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Converts decoded images into normalised network input
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Target size (height, width)
    size: (usize, usize),
    channels: usize,
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl ImagePreprocessor {
    /// Preprocessor for the input size and channel count of `config`.
    ///
    /// Three-channel models get the ImageNet statistics; single-channel
    /// models use their average.
    pub fn for_model(config: &ModelConfig) -> Result<Self> {
        let (mean, std) = match config.in_channels {
            3 => (IMAGENET_MEAN.to_vec(), IMAGENET_STD.to_vec()),
            1 => (
                vec![IMAGENET_MEAN.iter().sum::<f32>() / 3.0],
                vec![IMAGENET_STD.iter().sum::<f32>() / 3.0],
            ),
            other => return Err(InferenceError::UnsupportedChannels(other)),
        };
        Ok(Self {
            size: (config.img_size_h, config.img_size_w),
            channels: config.in_channels,
            mean,
            std,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Resize and normalise one image into `(C, H, W)`.
    pub fn process(&self, image: &DynamicImage) -> Array3<f32> {
        let (h, w) = self.size;
        let resized = image.resize_exact(w as u32, h as u32, FilterType::Triangle);

        let mut out = Array3::<f32>::zeros((self.channels, h, w));
        if self.channels == 3 {
            let rgb = resized.to_rgb8();
            for (x, y, pixel) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    out[[c, y as usize, x as usize]] = self.normalise(c, pixel.0[c]);
                }
            }
        } else {
            let luma = resized.to_luma8();
            for (x, y, pixel) in luma.enumerate_pixels() {
                out[[0, y as usize, x as usize]] = self.normalise(0, pixel.0[0]);
            }
        }
        out
    }

    fn normalise(&self, channel: usize, value: u8) -> f32 {
        (value as f32 / 255.0 - self.mean[channel]) / self.std[channel]
    }

    /// Decode and preprocess one file.
    pub fn load(&self, path: &Path) -> Result<Array3<f32>> {
        let image = image::open(path).map_err(|source| InferenceError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            target: "msfast_inference_engine",
            "Decoded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(self.process(&image))
    }

    /// Decode every file and stack them into one `(B, C, H, W)` batch.
    pub fn load_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Array4<f32>> {
        if paths.is_empty() {
            return Err(InferenceError::EmptyBatch);
        }
        let (h, w) = self.size;
        let mut batch = Array4::<f32>::zeros((paths.len(), self.channels, h, w));
        for (mut slot, path) in batch.axis_iter_mut(Axis(0)).zip(paths) {
            slot.assign(&self.load(path.as_ref())?);
        }
        Ok(batch)
    }
}
