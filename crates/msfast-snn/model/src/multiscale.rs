// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Multi-scale spatiotemporal fusion
//!
//! Merges the four tokenizer feature maps (finest first) into one tensor at
//! the coarsest resolution.
//!
//! Every scale is projected to the common width with a 1×1 conv + BN. Scales
//! are then visited coarsest to finest while a running sum carries coarse
//! context down: the sum is upsampled (nearest) to the current resolution
//! and the current projection is added. Before temporal fusion each partial
//! sum is pooled back to the coarsest grid (`3/2/1` from 1/8, `5/4/1` from
//! 1/4). Temporal fusion is spike → pointwise conv1d + BN over the time
//! axis, laid out as `(H·W·B, E, T)`. The per-scale results are averaged.

use ndarray::{stack, Array3, Array4, Array5, Axis};
use rand::Rng;
use msfast_snn_neuron::SpikingNode;
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{
    flatten_time, mean_axis, standard, unflatten_time, upsample_nearest, BatchNorm, Conv1d,
    Conv2d, MaxPool2d, Mode, Parameterized, TensorError,
};
use tracing::debug;

use crate::error::{ModelError, Result};

/// Number of feature maps the tokenizer hands over
pub const NUM_SCALES: usize = 4;

/// Threshold of the temporal-fusion spiking nodes
pub const TEMPORAL_THRESHOLD: f32 = 1.0;

/// Projection and temporal fusion for one input scale.
#[derive(Debug, Clone)]
struct ScaleBranch {
    projection: Conv2d,
    projection_bn: BatchNorm,
    spike: SpikingNode,
    temporal: Conv1d,
    temporal_bn: BatchNorm,
}

impl ScaleBranch {
    fn new<R: Rng + ?Sized>(in_channels: usize, out_channels: usize, norm_eps: f32, rng: &mut R) -> Result<Self> {
        Ok(Self {
            projection: Conv2d::pointwise(in_channels, out_channels, false, rng)?,
            projection_bn: BatchNorm::new(out_channels, norm_eps)?,
            spike: SpikingNode::lif_with_threshold(TEMPORAL_THRESHOLD)?,
            temporal: Conv1d::pointwise(out_channels, out_channels, false, rng)?,
            temporal_bn: BatchNorm::new(out_channels, norm_eps)?,
        })
    }

    /// `(T, B, C_i, H_i, W_i)` -> `(T·B, E, H_i, W_i)`
    fn project(&mut self, x: &Array5<f32>, mode: Mode) -> Result<Array4<f32>> {
        let frames = self.projection.forward(&flatten_time(x)?)?;
        Ok(self.projection_bn.forward(&frames, mode)?)
    }

    /// `(T·B, E, H, W)` -> `(H·W·B, E, T)`
    fn fuse_time(
        &mut self,
        frames: Array4<f32>,
        time_steps: usize,
        batch: usize,
        alpha: f32,
        mode: Mode,
    ) -> Result<Array3<f32>> {
        let spikes = self.spike.forward(&unflatten_time(frames, time_steps, batch)?, alpha)?;
        let (t, b, e, h, w) = spikes.dim();
        let sequences = standard(spikes.permuted_axes([3, 4, 1, 2, 0])).into_shape_with_order((h * w * b, e, t))?;
        let mixed = self.temporal.forward(&sequences)?;
        Ok(self.temporal_bn.forward(&mixed, mode)?)
    }

    fn visit_tensors(&self, index: usize, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        self.projection.visit_tensors(&qualify(prefix, &format!("MSSF.{index}.0")), visitor);
        self.projection_bn.visit_tensors(&qualify(prefix, &format!("MSSF.{index}.1")), visitor);
        self.temporal.visit_tensors(&qualify(prefix, &format!("MSTF.{index}.0")), visitor);
        self.temporal_bn.visit_tensors(&qualify(prefix, &format!("MSTF.{index}.1")), visitor);
    }

    fn visit_tensors_mut(
        &mut self,
        index: usize,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        self.projection.visit_tensors_mut(&qualify(prefix, &format!("MSSF.{index}.0")), visitor)?;
        self.projection_bn.visit_tensors_mut(&qualify(prefix, &format!("MSSF.{index}.1")), visitor)?;
        self.temporal.visit_tensors_mut(&qualify(prefix, &format!("MSTF.{index}.0")), visitor)?;
        self.temporal_bn.visit_tensors_mut(&qualify(prefix, &format!("MSTF.{index}.1")), visitor)
    }
}

#[derive(Debug, Clone)]
pub struct MultiScaleFusion {
    branches: Vec<ScaleBranch>,
    /// Applied to the 1/8-resolution partial sum
    pool_half: MaxPool2d,
    /// Applied to the 1/4-resolution partial sum
    pool_quarter: MaxPool2d,
    out_channels: usize,
}

impl MultiScaleFusion {
    /// `in_channels` lists the widths of the feature maps, finest first.
    pub fn new<R: Rng + ?Sized>(
        in_channels: &[usize],
        out_channels: usize,
        norm_eps: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels.len() != NUM_SCALES {
            return Err(ModelError::InvalidConfig(format!(
                "multi-scale fusion expects {NUM_SCALES} scales, got {}",
                in_channels.len()
            )));
        }
        let branches = in_channels
            .iter()
            .map(|&c| ScaleBranch::new(c, out_channels, norm_eps, &mut *rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            branches,
            pool_half: MaxPool2d::new(3, 2, 1)?,
            pool_quarter: MaxPool2d::new(5, 4, 1)?,
            out_channels,
        })
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Fuse `features` (finest first) into `(T, B, E, H_c, W_c)` where
    /// `(H_c, W_c)` is the grid of the last (coarsest) feature map.
    pub fn forward(&mut self, features: &[Array5<f32>], alpha: f32, mode: Mode) -> Result<Array5<f32>> {
        if features.len() != self.branches.len() {
            return Err(ModelError::InvalidInput(format!(
                "expected {} feature maps, got {}",
                self.branches.len(),
                features.len()
            )));
        }
        let last = features.len() - 1;
        let (t, b, _, h, w) = features[last].dim();
        let e = self.out_channels;

        let mut running = self.branches[last].project(&features[last], mode)?;
        let mut fused = Vec::with_capacity(features.len());
        fused.push(self.branches[last].fuse_time(running.clone(), t, b, alpha, mode)?);

        for i in (0..last).rev() {
            let current = self.branches[i].project(&features[i], mode)?;
            let (_, _, ch, cw) = current.dim();
            if (running.dim().2, running.dim().3) != (ch, cw) {
                running = upsample_nearest(&running, (ch, cw))?;
            }
            running = running + &current;

            let pooled = match i {
                1 => self.pool_half.forward(&running)?,
                0 => self.pool_quarter.forward(&running)?,
                _ => running.clone(),
            };
            let (n, _, ph, pw) = pooled.dim();
            if (ph, pw) != (h, w) {
                return Err(TensorError::ShapeMismatch {
                    op: "multi_scale_pool",
                    expected: vec![n, e, h, w],
                    actual: vec![n, e, ph, pw],
                }
                .into());
            }
            fused.push(self.branches[i].fuse_time(pooled, t, b, alpha, mode)?);
        }

        // (S, H·W·B, E, T) -> (S, H, W, B, E, T) -> (S, T, B, E, H, W)
        let views: Vec<_> = fused.iter().map(|f| f.view()).collect();
        let stacked = standard(stack(Axis(0), &views)?)
            .into_shape_with_order((fused.len(), h, w, b, e, t))?
            .permuted_axes([0, 5, 3, 4, 1, 2]);
        let merged = standard(mean_axis(&stacked, Axis(0))?);
        debug!(target: "msfast_snn_model", "[MS-STF] fused {} scales into {:?}", fused.len(), merged.dim());
        Ok(merged)
    }
}

impl Parameterized for MultiScaleFusion {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        for (i, branch) in self.branches.iter().enumerate() {
            branch.visit_tensors(i, prefix, visitor);
        }
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        for (i, branch) in self.branches.iter_mut().enumerate() {
            branch.visit_tensors_mut(i, prefix, visitor)?;
        }
        Ok(())
    }
}
