// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Batch normalisation over axis 1
//!
//! One implementation serves both the 2-D `(N, C, H, W)` and the 1-D
//! `(N, C, L)` cases: statistics are taken over every axis except the
//! channel axis.

use ndarray::parallel::prelude::*;
use ndarray::{Array, Array1, Axis, Dimension, RemoveAxis};
use tracing::trace;

use crate::error::{Result, TensorError};
use crate::mode::Mode;
use crate::param::{qualify, Parameterized, TensorKind, TensorVisitor, TensorVisitorMut};

pub const DEFAULT_MOMENTUM: f32 = 0.1;
pub const DEFAULT_EPS: f32 = 1e-5;

#[derive(Debug, Clone)]
pub struct BatchNorm {
    weight: Array1<f32>,
    bias: Array1<f32>,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    eps: f32,
    momentum: f32,
}

impl BatchNorm {
    pub fn new(num_features: usize, eps: f32) -> Result<Self> {
        if num_features == 0 {
            return Err(TensorError::InvalidConfig("batch norm needs at least one feature".into()));
        }
        if !(eps.is_finite() && eps > 0.0) {
            return Err(TensorError::InvalidConfig(format!("batch norm eps must be > 0, got {eps}")));
        }
        Ok(Self {
            weight: Array1::ones(num_features),
            bias: Array1::zeros(num_features),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            eps,
            momentum: DEFAULT_MOMENTUM,
        })
    }

    pub fn num_features(&self) -> usize {
        self.weight.len()
    }

    pub fn running_mean(&self) -> &Array1<f32> {
        &self.running_mean
    }

    pub fn running_var(&self) -> &Array1<f32> {
        &self.running_var
    }

    /// Normalise `x` per channel (axis 1).
    ///
    /// In `Train` mode the batch statistics are used and folded into the
    /// running statistics; in `Eval` mode the running statistics are used.
    pub fn forward<D>(&mut self, x: &Array<f32, D>, mode: Mode) -> Result<Array<f32, D>>
    where
        D: Dimension + RemoveAxis,
    {
        let channels = self.num_features();
        if x.ndim() < 2 || x.shape()[1] != channels {
            let mut expected = x.shape().to_vec();
            if expected.len() >= 2 {
                expected[1] = channels;
            }
            return Err(TensorError::ShapeMismatch {
                op: "batch_norm",
                expected,
                actual: x.shape().to_vec(),
            });
        }
        if x.is_empty() {
            return Ok(x.to_owned());
        }

        let (mean, var) = match mode {
            Mode::Train => self.batch_statistics(x)?,
            Mode::Eval => (self.running_mean.clone(), self.running_var.clone()),
        };

        let scale: Array1<f32> = &self.weight / &var.mapv(|v| (v + self.eps).sqrt());
        let shift: Array1<f32> = &self.bias - &(&mean * &scale);

        let mut output = x.to_owned();
        output
            .axis_iter_mut(Axis(1))
            .into_par_iter()
            .enumerate()
            .for_each(|(c, mut lane)| {
                let (s, b) = (scale[c], shift[c]);
                lane.mapv_inplace(|v| v * s + b);
            });
        Ok(output)
    }

    /// Per-channel mean and biased variance; updates running stats with the
    /// unbiased variance.
    fn batch_statistics<D>(&mut self, x: &Array<f32, D>) -> Result<(Array1<f32>, Array1<f32>)>
    where
        D: Dimension + RemoveAxis,
    {
        let count = x.len() / self.num_features();
        if count <= 1 {
            return Err(TensorError::InsufficientBatch(count));
        }

        let stats: Vec<(f32, f32)> = x
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(|lane| {
                let n = lane.len() as f64;
                let mean = lane.iter().map(|&v| v as f64).sum::<f64>() / n;
                let var = lane.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
                (mean as f32, var as f32)
            })
            .collect();

        let mean = Array1::from_iter(stats.iter().map(|s| s.0));
        let var = Array1::from_iter(stats.iter().map(|s| s.1));

        let m = self.momentum;
        let correction = count as f32 / (count - 1) as f32;
        self.running_mean = &self.running_mean * (1.0 - m) + &mean * m;
        self.running_var = &self.running_var * (1.0 - m) + &var * (m * correction);
        trace!(
            target: "msfast_snn_tensor",
            "[BN] running stats updated: {} channels, {} values per channel",
            self.num_features(),
            count
        );

        Ok((mean, var))
    }
}

impl Parameterized for BatchNorm {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view().into_dyn());
        visitor(&qualify(prefix, "bias"), TensorKind::Learnable, self.bias.view().into_dyn());
        visitor(&qualify(prefix, "running_mean"), TensorKind::Buffer, self.running_mean.view().into_dyn());
        visitor(&qualify(prefix, "running_var"), TensorKind::Buffer, self.running_var.view().into_dyn());
    }

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()> {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view_mut().into_dyn())?;
        visitor(&qualify(prefix, "bias"), TensorKind::Learnable, self.bias.view_mut().into_dyn())?;
        visitor(&qualify(prefix, "running_mean"), TensorKind::Buffer, self.running_mean.view_mut().into_dyn())?;
        visitor(&qualify(prefix, "running_var"), TensorKind::Buffer, self.running_var.view_mut().into_dyn())?;
        Ok(())
    }
}
