// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Spiking tokenizer
//!
//! Convolutional stem that turns an image sequence into a feature grid at
//! 1/16 resolution, tapping four intermediate maps for multi-scale fusion.
//!
//! | stage | conv (3×3, pad 1) | pool      | output        | tapped |
//! |-------|-------------------|-----------|---------------|--------|
//! | proj  | C → E/8           | 3/2/1     | E/8 @ 1/2     |        |
//! | proj1 | E/8 → E/4         | 3/2/1     | E/4 @ 1/4     | 0      |
//! | proj2 | E/4 → E/2         | 3/2/1     | E/2 @ 1/8     | 1      |
//! | proj3 | E/2 → E           | 3/2/1     | E @ 1/16      | 2      |
//! | proj4 | E → E             | none      | E @ 1/16      | 3      |
//!
//! Every stage after the first starts with a spiking node; tapped maps are
//! taken after that node.

use ndarray::Array5;
use rand::Rng;
use msfast_snn_neuron::SpikingNode;
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{BatchNorm, Conv2d, MaxPool2d, Mode, Parameterized, TensorError};
use tracing::debug;

use crate::block::per_frame;
use crate::error::{ModelError, Result};
use crate::multiscale::MultiScaleFusion;

/// Total spatial reduction of the stem
pub const TOKENIZER_STRIDE: usize = 16;

/// conv → BN → optional pool
#[derive(Debug, Clone)]
struct StemStage {
    name: String,
    conv: Conv2d,
    bn: BatchNorm,
    pool: Option<MaxPool2d>,
}

impl StemStage {
    fn new<R: Rng + ?Sized>(
        name: &str,
        in_channels: usize,
        out_channels: usize,
        pooled: bool,
        norm_eps: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            conv: Conv2d::new(in_channels, out_channels, 3, 1, 1, false, rng)?,
            bn: BatchNorm::new(out_channels, norm_eps)?,
            pool: if pooled { Some(MaxPool2d::new(3, 2, 1)?) } else { None },
        })
    }

    fn forward(&mut self, x: &Array5<f32>, mode: Mode) -> Result<Array5<f32>> {
        per_frame(x, |frames| {
            let y = self.bn.forward(&self.conv.forward(frames)?, mode)?;
            match &self.pool {
                Some(pool) => Ok(pool.forward(&y)?),
                None => Ok(y),
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct SpikingTokenizer {
    stages: Vec<StemStage>,
    /// One node in front of every stage but the first, plus one after the last
    spikes: Vec<SpikingNode>,
    fusion: MultiScaleFusion,
    in_channels: usize,
    embed_dims: usize,
    patch_grid: (usize, usize),
}

impl SpikingTokenizer {
    pub fn new<R: Rng + ?Sized>(
        img_size: (usize, usize),
        patch_size: usize,
        in_channels: usize,
        embed_dims: usize,
        norm_eps: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if embed_dims == 0 || embed_dims % 8 != 0 {
            return Err(TensorError::NotDivisible {
                what: "embed_dims",
                value: embed_dims,
                divisor: 8,
            }
            .into());
        }
        if patch_size == 0 {
            return Err(ModelError::InvalidConfig("patch_size must be greater than zero".into()));
        }
        for (what, value) in [("img_size_h", img_size.0), ("img_size_w", img_size.1)] {
            if value == 0 || value % TOKENIZER_STRIDE != 0 {
                return Err(TensorError::NotDivisible {
                    what,
                    value,
                    divisor: TOKENIZER_STRIDE,
                }
                .into());
            }
        }

        let e = embed_dims;
        let widths = [in_channels, e / 8, e / 4, e / 2, e, e];
        let stages = (0..5)
            .map(|i| {
                let name = if i == 0 { "proj".to_string() } else { format!("proj{i}") };
                StemStage::new(&name, widths[i], widths[i + 1], i < 4, norm_eps, &mut *rng)
            })
            .collect::<Result<Vec<_>>>()?;
        let spikes = vec![SpikingNode::lif(); 5];
        let fusion = MultiScaleFusion::new(&[e / 4, e / 2, e, e], e, norm_eps, rng)?;

        Ok(Self {
            stages,
            spikes,
            fusion,
            in_channels,
            embed_dims,
            patch_grid: (img_size.0 / patch_size, img_size.1 / patch_size),
        })
    }

    pub fn embed_dims(&self) -> usize {
        self.embed_dims
    }

    /// Nominal patch grid `(H/patch, W/patch)` for the configured image size.
    pub fn patch_grid(&self) -> (usize, usize) {
        self.patch_grid
    }

    pub fn num_patches(&self) -> usize {
        self.patch_grid.0 * self.patch_grid.1
    }

    /// `(T, B, C, H, W)` -> fused `(T, B, E, H/16, W/16)` and its grid.
    ///
    /// The returned grid is the spatial size of the fused tensor, which is
    /// always `(H/16, W/16)` whatever the patch size. Downstream pooling and
    /// any reshaping into tokens must use this grid; [`Self::patch_grid`]
    /// (`image / patch_size`) is nominal metadata and disagrees with it for
    /// every patch size other than 16.
    pub fn forward(
        &mut self,
        x: &Array5<f32>,
        alpha: f32,
        mode: Mode,
    ) -> Result<(Array5<f32>, (usize, usize))> {
        let (t, b, c, h, w) = x.dim();
        if c != self.in_channels {
            return Err(TensorError::ShapeMismatch {
                op: "tokenizer",
                expected: vec![t, b, self.in_channels, h, w],
                actual: vec![t, b, c, h, w],
            }
            .into());
        }
        for (what, value) in [("height", h), ("width", w)] {
            if value == 0 || value % TOKENIZER_STRIDE != 0 {
                return Err(ModelError::InvalidInput(format!(
                    "image {what} {value} must be a positive multiple of {TOKENIZER_STRIDE}"
                )));
            }
        }

        let mut taps = Vec::with_capacity(4);
        let mut x = self.stages[0].forward(x, mode)?;
        for i in 1..self.stages.len() {
            x = self.spikes[i - 1].forward(&x, alpha)?;
            if i >= 2 {
                taps.push(x.clone());
            }
            x = self.stages[i].forward(&x, mode)?;
        }
        taps.push(self.spikes[self.stages.len() - 1].forward(&x, alpha)?);

        let fused = self.fusion.forward(&taps, alpha, mode)?;
        let grid = (fused.dim().3, fused.dim().4);
        debug!(target: "msfast_snn_model", "[TOKENIZER] {}x{} input -> {:?} grid", h, w, grid);
        Ok((fused, grid))
    }
}

impl Parameterized for SpikingTokenizer {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        for stage in &self.stages {
            stage.conv.visit_tensors(&qualify(prefix, &format!("{}_conv", stage.name)), visitor);
            stage.bn.visit_tensors(&qualify(prefix, &format!("{}_bn", stage.name)), visitor);
        }
        self.fusion.visit_tensors(&qualify(prefix, "MS_STF"), visitor);
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        for stage in &mut self.stages {
            stage.conv.visit_tensors_mut(&qualify(prefix, &format!("{}_conv", stage.name)), visitor)?;
            stage.bn.visit_tensors_mut(&qualify(prefix, &format!("{}_bn", stage.name)), visitor)?;
        }
        self.fusion.visit_tensors_mut(&qualify(prefix, "MS_STF"), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msfast_snn_tensor::init::uniform;
    use msfast_snn_tensor::seeded_rng;

    #[test]
    fn test_grid_is_one_sixteenth() {
        let mut rng = seeded_rng(0);
        let mut tokenizer = SpikingTokenizer::new((32, 32), 8, 3, 16, 1e-5, &mut rng).unwrap();
        let x: Array5<f32> = uniform((1, 2, 3, 32, 32), 1.0, &mut rng);
        let (fused, grid) = tokenizer.forward(&x, 1.0, Mode::Train).unwrap();
        assert_eq!(grid, (2, 2));
        assert_eq!(fused.dim(), (1, 2, 16, 2, 2));
        assert_eq!(grid, (fused.dim().3, fused.dim().4));
        // nominal patch metadata is kept separately and differs for patch 8
        assert_eq!(tokenizer.patch_grid(), (4, 4));
        assert_ne!(grid, tokenizer.patch_grid());
        assert_eq!(tokenizer.num_patches(), 16);
    }

    #[test]
    fn test_rectangular_input() {
        let mut rng = seeded_rng(1);
        let mut tokenizer = SpikingTokenizer::new((32, 64), 8, 3, 16, 1e-5, &mut rng).unwrap();
        let x: Array5<f32> = uniform((2, 1, 3, 32, 64), 1.0, &mut rng);
        let (fused, grid) = tokenizer.forward(&x, 0.5, Mode::Train).unwrap();
        assert_eq!(grid, (2, 4));
        assert_eq!(fused.dim(), (2, 1, 16, 2, 4));
        assert_eq!(tokenizer.patch_grid(), (4, 8));
    }

    #[test]
    fn test_construction_checks() {
        let mut rng = seeded_rng(0);
        assert!(SpikingTokenizer::new((32, 32), 8, 3, 12, 1e-5, &mut rng).is_err());
        assert!(SpikingTokenizer::new((24, 32), 8, 3, 16, 1e-5, &mut rng).is_err());
        assert!(SpikingTokenizer::new((32, 32), 0, 3, 16, 1e-5, &mut rng).is_err());
    }

    #[test]
    fn test_input_checks() {
        let mut rng = seeded_rng(0);
        let mut tokenizer = SpikingTokenizer::new((32, 32), 8, 3, 16, 1e-5, &mut rng).unwrap();
        let wrong_channels = Array5::<f32>::zeros((1, 1, 1, 32, 32));
        assert!(tokenizer.forward(&wrong_channels, 1.0, Mode::Eval).is_err());
        let wrong_size = Array5::<f32>::zeros((1, 1, 3, 24, 32));
        assert!(matches!(
            tokenizer.forward(&wrong_size, 1.0, Mode::Eval),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stage_names() {
        let tokenizer = SpikingTokenizer::new((32, 32), 8, 3, 16, 1e-5, &mut seeded_rng(0)).unwrap();
        let mut names = Vec::new();
        tokenizer.visit_tensors("patch_embed", &mut |name, _, _| names.push(name.to_string()));
        assert_eq!(names[0], "patch_embed.proj_conv.weight");
        assert!(names.contains(&"patch_embed.proj4_bn.weight".to_string()));
        assert!(names.contains(&"patch_embed.MS_STF.MSSF.3.0.weight".to_string()));
    }
}
