// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `msfast_configuration.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ConfigError, ConfigResult};

/// Name of the registered full-size model.
pub const MS_FAST_PRESET: &str = "MS_FAST";

/// Name of the small preset used for smoke runs.
pub const TINY_PRESET: &str = "tiny";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MsFastConfig {
    pub model: ModelConfig,
    pub schedule: ScheduleConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Network architecture hyperparameters.
///
/// Defaults match the registered `MS_FAST` model (Tiny-ImageNet, 64x64 input).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub img_size_h: usize,
    pub img_size_w: usize,
    pub patch_size: usize,
    pub in_channels: usize,
    /// 0 replaces the classification head with identity
    pub num_classes: usize,
    pub embed_dims: usize,
    /// Number of blocks in the block-diagonal spectral weight
    pub num_heads: usize,
    pub mlp_ratio: f32,
    pub drop_rate: f32,
    pub attn_drop_rate: f32,
    pub drop_path_rate: f32,
    /// Number of stacked fusion blocks
    pub depths: usize,
    /// Discrete simulation steps per input image
    pub time_steps: usize,
    /// Epsilon shared by every batch-normalisation layer
    pub norm_eps: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::ms_fast()
    }
}

impl ModelConfig {
    /// The registered `MS_FAST` configuration.
    pub fn ms_fast() -> Self {
        Self {
            img_size_h: 64,
            img_size_w: 64,
            patch_size: 8,
            in_channels: 3,
            num_classes: 200,
            embed_dims: 384,
            num_heads: 16,
            mlp_ratio: 4.0,
            drop_rate: 0.0,
            attn_drop_rate: 0.0,
            drop_path_rate: 0.0,
            depths: 4,
            time_steps: 4,
            norm_eps: 1e-5,
        }
    }

    /// Minimal configuration: one block, one time step, 32x32 input.
    pub fn tiny() -> Self {
        Self {
            img_size_h: 32,
            img_size_w: 32,
            patch_size: 8,
            embed_dims: 16,
            num_heads: 4,
            depths: 1,
            time_steps: 1,
            ..Self::ms_fast()
        }
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> ConfigResult<Self> {
        match name {
            MS_FAST_PRESET | "ms_fast" => Ok(Self::ms_fast()),
            TINY_PRESET => Ok(Self::tiny()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Hidden width of the feed-forward block.
    pub fn mlp_hidden_dims(&self) -> usize {
        (self.embed_dims as f32 * self.mlp_ratio) as usize
    }

    /// Patch grid reported by the tokenizer (`image / patch_size`).
    pub fn patch_grid(&self) -> (usize, usize) {
        (
            self.img_size_h / self.patch_size,
            self.img_size_w / self.patch_size,
        )
    }

    /// Number of patches covered by the patch grid.
    pub fn num_patches(&self) -> usize {
        let (h, w) = self.patch_grid();
        h * w
    }
}

/// Training-time alpha annealing schedule
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Epochs over which alpha decays from `initial_alpha` to zero
    pub warmup_epochs: u32,
    pub initial_alpha: f32,
    /// Default loader length (iterations per epoch) for tools that preview the schedule
    pub loader_length: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            warmup_epochs: 75,
            initial_alpha: 1.0,
            loader_length: 781,
        }
    }
}

/// Process-level runtime settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Seed for parameter initialisation
    pub seed: u64,
    /// Number of classes reported per image by the inference engine
    pub top_k: usize,
    /// Optional checkpoint restored after construction
    pub checkpoint: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            top_k: 5,
            checkpoint: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Console log format: "text" or "json"
    pub format: String,
    /// Write JSON log files in addition to the console
    pub file_logging: bool,
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}
