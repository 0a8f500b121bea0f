// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spiking feed-forward block
//!
//! spike → 1×1 conv (C → hidden) → BN → spike → 1×1 conv (hidden → C) → BN

use ndarray::Array5;
use rand::Rng;
use msfast_snn_neuron::SpikingNode;
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{BatchNorm, Conv2d, Mode, Parameterized, TensorError};

use crate::block::{per_frame, SpikingBlock};
use crate::error::{ModelError, Result};

#[derive(Debug, Clone)]
pub struct FeedForward {
    expand_spike: SpikingNode,
    expand_conv: Conv2d,
    expand_bn: BatchNorm,
    project_spike: SpikingNode,
    project_conv: Conv2d,
    project_bn: BatchNorm,
}

impl FeedForward {
    pub fn new<R: Rng + ?Sized>(dim: usize, hidden: usize, norm_eps: f32, rng: &mut R) -> Result<Self> {
        if dim == 0 || hidden == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "feed-forward block needs dim ({dim}) and hidden ({hidden}) > 0"
            )));
        }
        Ok(Self {
            expand_spike: SpikingNode::lif(),
            expand_conv: Conv2d::pointwise(dim, hidden, true, rng)?,
            expand_bn: BatchNorm::new(hidden, norm_eps)?,
            project_spike: SpikingNode::lif(),
            project_conv: Conv2d::pointwise(hidden, dim, true, rng)?,
            project_bn: BatchNorm::new(dim, norm_eps)?,
        })
    }

    pub fn dim(&self) -> usize {
        self.expand_conv.in_channels()
    }

    pub fn hidden_dim(&self) -> usize {
        self.expand_conv.out_channels()
    }
}

impl SpikingBlock for FeedForward {
    fn forward(&mut self, x: &Array5<f32>, alpha: f32, mode: Mode) -> Result<Array5<f32>> {
        let (t, b, c, h, w) = x.dim();
        if c != self.dim() {
            return Err(TensorError::ShapeMismatch {
                op: "feed_forward",
                expected: vec![t, b, self.dim(), h, w],
                actual: vec![t, b, c, h, w],
            }
            .into());
        }

        let spikes = self.expand_spike.forward(x, alpha)?;
        let hidden = per_frame(&spikes, |frames| {
            Ok(self.expand_bn.forward(&self.expand_conv.forward(frames)?, mode)?)
        })?;

        let spikes = self.project_spike.forward(&hidden, alpha)?;
        per_frame(&spikes, |frames| {
            Ok(self.project_bn.forward(&self.project_conv.forward(frames)?, mode)?)
        })
    }
}

impl Parameterized for FeedForward {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        self.expand_conv.visit_tensors(&qualify(prefix, "mlp1_conv"), visitor);
        self.expand_bn.visit_tensors(&qualify(prefix, "mlp1_bn"), visitor);
        self.project_conv.visit_tensors(&qualify(prefix, "mlp2_conv"), visitor);
        self.project_bn.visit_tensors(&qualify(prefix, "mlp2_bn"), visitor);
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        self.expand_conv.visit_tensors_mut(&qualify(prefix, "mlp1_conv"), visitor)?;
        self.expand_bn.visit_tensors_mut(&qualify(prefix, "mlp1_bn"), visitor)?;
        self.project_conv.visit_tensors_mut(&qualify(prefix, "mlp2_conv"), visitor)?;
        self.project_bn.visit_tensors_mut(&qualify(prefix, "mlp2_bn"), visitor)
    }
}
