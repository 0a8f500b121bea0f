// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # MS-FAST classifier
//!
//! image batch `(B, C, H, W)`
//!   → repeat over `T` time steps
//!   → spiking tokenizer (multi-scale fused grid at 1/16)
//!   → `depths` fusion blocks
//!   → mean over space, then over time
//!   → linear head → logits `(B, num_classes)`
//!
//! The network owns the alpha schedule. Plain [`MsFastNetwork::forward`]
//! never advances it; training loops call [`MsFastNetwork::forward_train`]
//! (or [`MsFastNetwork::advance_schedule`] explicitly) once per iteration.

use ndarray::{Array2, Array4, Array5, Axis};
use msfast_config::validation::collect_errors;
use msfast_config::{ModelConfig, MsFastConfig, ScheduleConfig};
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{mean_axis, seeded_rng, Linear, Mode, Parameterized};
use tracing::{debug, info, warn};

use crate::block::SpikingBlock;
use crate::error::{ModelError, Result};
use crate::fusion::FusionBlock;
use crate::schedule::AlphaSchedule;
use crate::tokenizer::SpikingTokenizer;

#[derive(Debug, Clone)]
pub struct MsFastNetwork {
    config: ModelConfig,
    tokenizer: SpikingTokenizer,
    blocks: Vec<FusionBlock>,
    /// `None` when `num_classes == 0`: pooled features are returned as is
    head: Option<Linear>,
    schedule: AlphaSchedule,
}

/// Reject model configurations the blocks cannot be built from.
pub fn validate_model_config(config: &ModelConfig) -> Result<()> {
    let full = MsFastConfig {
        model: config.clone(),
        ..Default::default()
    };
    let errors = collect_errors(&full);
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
    Err(ModelError::InvalidConfig(message))
}

impl MsFastNetwork {
    /// Build a network with parameters drawn from `seed`.
    pub fn new(config: &ModelConfig, schedule: AlphaSchedule, seed: u64) -> Result<Self> {
        validate_model_config(config)?;
        schedule.validate()?;
        let mut rng = seeded_rng(seed);

        let tokenizer = SpikingTokenizer::new(
            (config.img_size_h, config.img_size_w),
            config.patch_size,
            config.in_channels,
            config.embed_dims,
            config.norm_eps,
            &mut rng,
        )?;
        let blocks = (0..config.depths)
            .map(|_| {
                FusionBlock::new(
                    config.embed_dims,
                    config.num_heads,
                    config.mlp_hidden_dims(),
                    config.norm_eps,
                    &mut rng,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let head = if config.num_classes > 0 {
            Some(Linear::new(config.embed_dims, config.num_classes, &mut rng)?)
        } else {
            None
        };

        let network = Self {
            config: config.clone(),
            tokenizer,
            blocks,
            head,
            schedule,
        };
        info!(
            target: "msfast_snn_model",
            "Built MS-FAST network: embed_dims={}, heads={}, depths={}, T={}, classes={}, {} parameters",
            config.embed_dims,
            config.num_heads,
            config.depths,
            config.time_steps,
            config.num_classes,
            network.num_parameters()
        );
        Ok(network)
    }

    /// Build from a full configuration: model section, schedule section and
    /// the runtime seed.
    pub fn from_config(config: &MsFastConfig) -> Result<Self> {
        let schedule = AlphaSchedule::from_config(&config.schedule)?;
        Self::new(&config.model, schedule, config.runtime.seed)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &SpikingTokenizer {
        &self.tokenizer
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Width of the logits (or of the pooled features when there is no head).
    pub fn output_dim(&self) -> usize {
        match &self.head {
            Some(head) => head.out_features(),
            None => self.config.embed_dims,
        }
    }

    pub fn schedule(&self) -> &AlphaSchedule {
        &self.schedule
    }

    pub(crate) fn set_schedule(&mut self, schedule: AlphaSchedule) {
        self.schedule = schedule;
    }

    pub fn alpha(&self) -> f32 {
        self.schedule.alpha()
    }

    /// Count one training iteration against the alpha schedule.
    pub fn advance_schedule(&mut self, loader_length: u64) -> Result<Option<f32>> {
        self.schedule.advance(loader_length)
    }

    /// Training-mode step: advance the schedule, then run a `Train` forward.
    pub fn forward_train(&mut self, images: &Array4<f32>, loader_length: u64) -> Result<Array2<f32>> {
        self.advance_schedule(loader_length)?;
        self.forward(images, Mode::Train)
    }

    /// Logits `(B, num_classes)`; `(B, embed_dims)` features without a head.
    pub fn forward(&mut self, images: &Array4<f32>, mode: Mode) -> Result<Array2<f32>> {
        let features = self.forward_features(images, mode)?;
        let output = match &self.head {
            Some(head) => head.forward(&features)?,
            None => features,
        };
        if output.iter().any(|v| !v.is_finite()) {
            warn!(target: "msfast_snn_model", "Non-finite values in network output");
        }
        Ok(output)
    }

    /// Pooled features `(B, embed_dims)` before the head.
    pub fn forward_features(&mut self, images: &Array4<f32>, mode: Mode) -> Result<Array2<f32>> {
        let sequence = self.repeat_over_time(images)?;
        let alpha = self.schedule.alpha();

        let (mut x, grid) = self.tokenizer.forward(&sequence, alpha, mode)?;
        debug!(target: "msfast_snn_model", "Tokenizer grid {:?}, alpha {:.4}, mode {:?}", grid, alpha, mode);
        for block in &mut self.blocks {
            x = block.forward(&x, alpha, mode)?;
        }

        // (T, B, E, H, W) -> (T, B, E) -> (B, E)
        let spatial = mean_axis(&mean_axis(&x, Axis(4))?, Axis(3))?;
        Ok(mean_axis(&spatial, Axis(0))?)
    }

    fn repeat_over_time(&self, images: &Array4<f32>) -> Result<Array5<f32>> {
        let (b, c, h, w) = images.dim();
        if b == 0 {
            return Err(ModelError::InvalidInput("empty image batch".into()));
        }
        if c != self.config.in_channels {
            return Err(ModelError::InvalidInput(format!(
                "expected {} input channels, got {c}",
                self.config.in_channels
            )));
        }
        let t = self.config.time_steps;
        images
            .broadcast((t, b, c, h, w))
            .map(|view| view.to_owned())
            .ok_or_else(|| ModelError::InvalidInput(format!("cannot repeat {:?} over {t} steps", images.dim())))
    }
}

impl Parameterized for MsFastNetwork {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        self.tokenizer.visit_tensors(&qualify(prefix, "patch_embed"), visitor);
        for (i, block) in self.blocks.iter().enumerate() {
            block.visit_tensors(&qualify(prefix, &format!("block.{i}")), visitor);
        }
        if let Some(head) = &self.head {
            head.visit_tensors(&qualify(prefix, "head"), visitor);
        }
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        self.tokenizer.visit_tensors_mut(&qualify(prefix, "patch_embed"), visitor)?;
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.visit_tensors_mut(&qualify(prefix, &format!("block.{i}")), visitor)?;
        }
        if let Some(head) = &mut self.head {
            head.visit_tensors_mut(&qualify(prefix, "head"), visitor)?;
        }
        Ok(())
    }
}

/// Names accepted by [`create_model`]
pub const AVAILABLE_MODELS: &[&str] = &[msfast_config::MS_FAST_PRESET, msfast_config::TINY_PRESET];

/// Build a registered model by name with the default schedule.
pub fn create_model(name: &str, seed: u64) -> Result<MsFastNetwork> {
    let config = ModelConfig::preset(name).map_err(|_| ModelError::UnknownModel(name.to_string()))?;
    let schedule = AlphaSchedule::from_config(&ScheduleConfig::default())?;
    MsFastNetwork::new(&config, schedule, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msfast_snn_tensor::init::uniform;

    fn tiny_network(num_classes: usize) -> MsFastNetwork {
        let config = ModelConfig {
            num_classes,
            ..ModelConfig::tiny()
        };
        MsFastNetwork::new(&config, AlphaSchedule::default(), 7).unwrap()
    }

    #[test]
    fn test_logits_shape() {
        let mut network = tiny_network(10);
        let images: Array4<f32> = uniform((2, 3, 32, 32), 1.0, &mut seeded_rng(0));
        let logits = network.forward(&images, Mode::Eval).unwrap();
        assert_eq!(logits.dim(), (2, 10));
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_identity_head_returns_features() {
        let mut network = tiny_network(0);
        assert_eq!(network.output_dim(), 16);
        let images: Array4<f32> = uniform((2, 3, 32, 32), 1.0, &mut seeded_rng(0));
        let out = network.forward(&images, Mode::Eval).unwrap();
        assert_eq!(out.dim(), (2, 16));
    }

    #[test]
    fn test_eval_forward_leaves_schedule_alone() {
        let mut network = tiny_network(5);
        let images: Array4<f32> = uniform((2, 3, 32, 32), 1.0, &mut seeded_rng(1));
        network.forward(&images, Mode::Eval).unwrap();
        network.forward(&images, Mode::Train).unwrap();
        assert_eq!(network.schedule().iteration(), 0);
        assert_eq!(network.alpha(), 1.0);
    }

    #[test]
    fn test_forward_train_advances_schedule() {
        let mut network = tiny_network(5);
        let images: Array4<f32> = uniform((2, 3, 32, 32), 1.0, &mut seeded_rng(1));
        for _ in 0..3 {
            network.forward_train(&images, 4).unwrap();
        }
        assert_eq!(network.schedule().iteration(), 3);
        // loader 4 -> cadence 3, horizon 75·4
        let expected = (1.0 - 3.0 / 300.0f64).powi(2) as f32;
        assert!((network.alpha() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_same_seed_same_parameters() {
        let a = tiny_network(3);
        let b = tiny_network(3);
        let mut values_a = Vec::new();
        let mut values_b = Vec::new();
        a.visit_tensors("", &mut |_, _, t| values_a.extend(t.iter().copied()));
        b.visit_tensors("", &mut |_, _, t| values_b.extend(t.iter().copied()));
        assert_eq!(values_a, values_b);
    }

    #[test]
    fn test_indivisible_heads_fail_construction() {
        let config = ModelConfig {
            num_heads: 3,
            ..ModelConfig::tiny()
        };
        assert!(matches!(
            MsFastNetwork::new(&config, AlphaSchedule::default(), 0),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_wrong_channel_count_rejected() {
        let mut network = tiny_network(2);
        let images = Array4::<f32>::zeros((1, 1, 32, 32));
        assert!(matches!(
            network.forward(&images, Mode::Eval),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_create_model_registry() {
        assert!(matches!(create_model("resnet", 0), Err(ModelError::UnknownModel(_))));
        let tiny = create_model("tiny", 0).unwrap();
        assert_eq!(tiny.config(), &ModelConfig::tiny());
        assert_eq!(tiny.schedule().warmup_epochs(), 75);
    }
}
