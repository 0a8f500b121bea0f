// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Residual fusion block: frequency mixer then feed-forward, each with a skip.

use ndarray::Array5;
use rand::Rng;
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{Mode, Parameterized};
use tracing::debug;

use crate::block::SpikingBlock;
use crate::error::Result;
use crate::mixer::FrequencyMixer;
use crate::mlp::FeedForward;

#[derive(Debug, Clone)]
pub struct FusionBlock {
    mixer: FrequencyMixer,
    feed_forward: FeedForward,
}

impl FusionBlock {
    pub fn new<R: Rng + ?Sized>(
        dim: usize,
        num_heads: usize,
        mlp_hidden: usize,
        norm_eps: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            mixer: FrequencyMixer::new(dim, num_heads, norm_eps, rng)?,
            feed_forward: FeedForward::new(dim, mlp_hidden, norm_eps, rng)?,
        })
    }

    pub fn mixer(&self) -> &FrequencyMixer {
        &self.mixer
    }

    pub fn feed_forward(&self) -> &FeedForward {
        &self.feed_forward
    }
}

impl SpikingBlock for FusionBlock {
    fn forward(&mut self, x: &Array5<f32>, alpha: f32, mode: Mode) -> Result<Array5<f32>> {
        let mixed = x + &self.mixer.forward(x, alpha, mode)?;
        let out = &mixed + &self.feed_forward.forward(&mixed, alpha, mode)?;
        debug!(target: "msfast_snn_model", "[FUSION] block output {:?}", out.dim());
        Ok(out)
    }
}

impl Parameterized for FusionBlock {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        self.mixer.visit_tensors(&qualify(prefix, "attn"), visitor);
        self.feed_forward.visit_tensors(&qualify(prefix, "mlp"), visitor);
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        self.mixer.visit_tensors_mut(&qualify(prefix, "attn"), visitor)?;
        self.feed_forward.visit_tensors_mut(&qualify(prefix, "mlp"), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msfast_snn_tensor::init::uniform;
    use msfast_snn_tensor::{seeded_rng, TensorKind};

    #[test]
    fn test_residual_block_shape() {
        let mut rng = seeded_rng(0);
        let mut block = FusionBlock::new(8, 2, 32, 1e-5, &mut rng).unwrap();
        let x: Array5<f32> = uniform((2, 2, 8, 2, 2), 1.0, &mut rng);
        let y = block.forward(&x, 1.0, Mode::Train).unwrap();
        assert_eq!(y.dim(), x.dim());
    }

    #[test]
    fn test_zeroed_branches_give_identity() {
        let mut rng = seeded_rng(0);
        let mut block = FusionBlock::new(4, 2, 8, 1e-5, &mut rng).unwrap();
        // zero affine scale/shift of the closing norms: both branches output 0
        block
            .visit_tensors_mut("", &mut |name, kind, mut t| {
                let closing = name.starts_with("attn.bn3.") || name.starts_with("mlp.mlp2_bn.");
                if kind == TensorKind::Learnable && closing {
                    t.fill(0.0);
                }
                Ok(())
            })
            .unwrap();
        let x: Array5<f32> = uniform((1, 2, 4, 2, 2), 1.0, &mut rng);
        let y = block.forward(&x, 0.5, Mode::Eval).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn test_names_are_nested() {
        let block = FusionBlock::new(4, 2, 8, 1e-5, &mut seeded_rng(0)).unwrap();
        let mut names = Vec::new();
        block.visit_tensors("block.0", &mut |name, _, _| names.push(name.to_string()));
        assert_eq!(names.first().map(String::as_str), Some("block.0.attn.w1"));
        assert_eq!(names.last().map(String::as_str), Some("block.0.mlp.mlp2_bn.running_var"));
    }
}
