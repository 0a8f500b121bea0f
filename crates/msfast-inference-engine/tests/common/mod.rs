// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities and helpers

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use msfast_config::ModelConfig;
use tempfile::TempDir;

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Tiny model with a handful of classes
pub fn small_model(num_classes: usize) -> ModelConfig {
    ModelConfig {
        num_classes,
        ..ModelConfig::tiny()
    }
}

/// Write a gradient PNG of the given size and return its path
pub fn write_gradient_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    let path = dir.join(name);
    image.save(&path).expect("Failed to write test image");
    path
}
