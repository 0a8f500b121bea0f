// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Alpha annealing schedule
//!
//! `alpha` blends the continuous surrogate into every spiking node. It starts
//! at 1 (fully continuous) and decays quadratically to 0 (pure spikes) over
//! `warmup_epochs` epochs:
//!
//! ```text
//! alpha = max(0, 1 - iteration / (warmup_epochs · loader_length))²
//! ```
//!
//! The value is only refreshed twice per epoch, on iterations that are a
//! multiple of `loader_length / 2 + 1` (real division).

use msfast_config::ScheduleConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaSchedule {
    iteration: u64,
    alpha: f32,
    warmup_epochs: u32,
}

impl AlphaSchedule {
    pub fn new(warmup_epochs: u32, initial_alpha: f32) -> Result<Self> {
        let schedule = Self {
            iteration: 0,
            alpha: initial_alpha,
            warmup_epochs,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Check a schedule that did not come through [`AlphaSchedule::new`],
    /// e.g. one deserialised from a checkpoint.
    pub fn validate(&self) -> Result<()> {
        if self.warmup_epochs == 0 {
            return Err(ModelError::InvalidConfig("warmup_epochs must be greater than zero".into()));
        }
        msfast_snn_neuron::validate_alpha(self.alpha)?;
        Ok(())
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Self::new(config.warmup_epochs, config.initial_alpha)
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn warmup_epochs(&self) -> u32 {
        self.warmup_epochs
    }

    /// Iteration at and after which alpha is zero.
    pub fn horizon(&self, loader_length: u64) -> u64 {
        self.warmup_epochs as u64 * loader_length
    }

    /// Whether `iteration` is a multiple of `loader_length / 2 + 1`.
    ///
    /// Written as `2·iteration mod (loader_length + 2) == 0` so that odd loader
    /// lengths (a half-integer step) are handled exactly.
    pub fn is_update_step(iteration: u64, loader_length: u64) -> bool {
        (2 * iteration) % (loader_length + 2) == 0
    }

    /// Count one training iteration. Returns the new alpha when it changed
    /// cadence, `None` otherwise.
    pub fn advance(&mut self, loader_length: u64) -> Result<Option<f32>> {
        if loader_length == 0 {
            return Err(ModelError::InvalidInput("loader_length must be greater than zero".into()));
        }
        self.iteration += 1;
        if !Self::is_update_step(self.iteration, loader_length) {
            return Ok(None);
        }

        let remaining = 1.0 - self.iteration as f64 / self.horizon(loader_length) as f64;
        self.alpha = if remaining > 0.0 {
            remaining.powi(2) as f32
        } else {
            0.0
        };
        info!(
            target: "msfast_snn_model",
            "[ALPHA] iteration {} -> alpha {:.6}",
            self.iteration,
            self.alpha
        );
        Ok(Some(self.alpha))
    }
}

impl Default for AlphaSchedule {
    fn default() -> Self {
        Self {
            iteration: 0,
            alpha: 1.0,
            warmup_epochs: ScheduleConfig::default().warmup_epochs,
        }
    }
}
