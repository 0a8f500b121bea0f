// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Frequency-domain token mixer
//!
//! Mixes channels in the 2-D Fourier domain with one block-diagonal weight
//! shared by every complex multiplication:
//!
//! ```text
//! s          = spike(x)
//! re, im     = fft2(s)
//! so, se     = spike(re), spike(im)
//! o1_re      = spike(BN(W·so − W·se))      o1_im = spike(BN(W·se + W·so))
//! o2_re      = BN(W·o1_re − W·o1_im)       o2_im = BN(W·o1_im + W·o1_re)
//! g          = so·(o2_re − o2_im) − se·(o2_re + o2_im)
//! out        = BN(Re fft2(softshrink(g, 0.06)))
//! ```
//!
//! The closing transform is the forward FFT again, not its inverse: the
//! result is spatially index-reversed relative to a true round trip. This is
//! the trained behaviour of the network and is kept as is.

use ndarray::Array5;
use rand::Rng;
use msfast_snn_neuron::SpikingNode;
use msfast_snn_tensor::param::{qualify, TensorVisitor, TensorVisitorMut};
use msfast_snn_tensor::{
    fft2_ortho, fft2_ortho_real, flatten_time, softshrink, unflatten_time, BatchNorm,
    BlockDiagonalWeight, Mode, Parameterized, TensorError,
};
use tracing::{trace, Level};

use crate::block::SpikingBlock;
use crate::error::{ModelError, Result};

/// Threshold of every spiking node inside the mixer
pub const MIXER_THRESHOLD: f32 = 0.5;
/// Softshrink cut-off applied to the gated spectrum
pub const SPECTRAL_SHRINK: f32 = 0.06;
/// Standard deviation of the block-diagonal weight at initialisation
pub const SPECTRAL_WEIGHT_SCALE: f32 = 0.002;

#[derive(Debug, Clone)]
pub struct FrequencyMixer {
    input_spike: SpikingNode,
    real_spike: SpikingNode,
    imag_spike: SpikingNode,
    mixed_real_spike: SpikingNode,
    mixed_imag_spike: SpikingNode,
    weight: BlockDiagonalWeight,
    bn1_real: BatchNorm,
    bn1_imag: BatchNorm,
    bn2_real: BatchNorm,
    bn2_imag: BatchNorm,
    bn_out: BatchNorm,
}

impl FrequencyMixer {
    /// Mixer over `dim` channels split into `num_heads` blocks.
    ///
    /// Fails with `TensorError::NotDivisible` when `dim % num_heads != 0`.
    pub fn new<R: Rng + ?Sized>(dim: usize, num_heads: usize, norm_eps: f32, rng: &mut R) -> Result<Self> {
        if num_heads == 0 {
            return Err(ModelError::InvalidConfig("num_heads must be greater than zero".into()));
        }
        let weight = BlockDiagonalWeight::new(dim, num_heads, SPECTRAL_WEIGHT_SCALE, rng)?;
        let spike = SpikingNode::lif_with_threshold(MIXER_THRESHOLD)?;
        Ok(Self {
            input_spike: spike.clone(),
            real_spike: spike.clone(),
            imag_spike: spike.clone(),
            mixed_real_spike: spike.clone(),
            mixed_imag_spike: spike,
            weight,
            bn1_real: BatchNorm::new(dim, norm_eps)?,
            bn1_imag: BatchNorm::new(dim, norm_eps)?,
            bn2_real: BatchNorm::new(dim, norm_eps)?,
            bn2_imag: BatchNorm::new(dim, norm_eps)?,
            bn_out: BatchNorm::new(dim, norm_eps)?,
        })
    }

    pub fn dim(&self) -> usize {
        self.weight.channels()
    }

    pub fn num_heads(&self) -> usize {
        self.weight.num_blocks()
    }
}

impl SpikingBlock for FrequencyMixer {
    fn forward(&mut self, x: &Array5<f32>, alpha: f32, mode: Mode) -> Result<Array5<f32>> {
        let (t, b, c, h, w) = x.dim();
        if c != self.dim() {
            return Err(TensorError::ShapeMismatch {
                op: "frequency_mixer",
                expected: vec![t, b, self.dim(), h, w],
                actual: vec![t, b, c, h, w],
            }
            .into());
        }

        let spikes = self.input_spike.forward(x, alpha)?;
        let (re, im) = fft2_ortho(&spikes)?;
        let so = flatten_time(&self.real_spike.forward(&re, alpha)?)?;
        let se = flatten_time(&self.imag_spike.forward(&im, alpha)?)?;

        // first complex product, spiking
        let o1_re = self.bn1_real.forward(&self.weight.mix(&(&so - &se))?, mode)?;
        let o1_im = self.bn1_imag.forward(&self.weight.mix(&(&se + &so))?, mode)?;
        let o1_re = flatten_time(&self.mixed_real_spike.forward(&unflatten_time(o1_re, t, b)?, alpha)?)?;
        let o1_im = flatten_time(&self.mixed_imag_spike.forward(&unflatten_time(o1_im, t, b)?, alpha)?)?;

        // second complex product, no spiking
        let o2_re = self.bn2_real.forward(&self.weight.mix(&(&o1_re - &o1_im))?, mode)?;
        let o2_im = self.bn2_imag.forward(&self.weight.mix(&(&o1_im + &o1_re))?, mode)?;

        let gated = &so * &(&o2_re - &o2_im) - &se * &(&o2_re + &o2_im);
        let shrunk = unflatten_time(softshrink(&gated, SPECTRAL_SHRINK), t, b)?;
        if tracing::enabled!(target: "msfast_snn_model", Level::TRACE) {
            trace!(
                target: "msfast_snn_model",
                "[MIXER] gated spectrum: {} of {} entries survive softshrink",
                nonzero_count(&shrunk),
                shrunk.len()
            );
        }

        let spatial = flatten_time(&fft2_ortho_real(&shrunk)?)?;
        Ok(unflatten_time(self.bn_out.forward(&spatial, mode)?, t, b)?)
    }
}

fn nonzero_count(x: &Array5<f32>) -> usize {
    x.iter().filter(|v| **v != 0.0).count()
}

impl Parameterized for FrequencyMixer {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        self.weight.visit_tensors(prefix, visitor);
        self.bn1_real.visit_tensors(&qualify(prefix, "bn1_1"), visitor);
        self.bn1_imag.visit_tensors(&qualify(prefix, "bn1_2"), visitor);
        self.bn2_real.visit_tensors(&qualify(prefix, "bn2_1"), visitor);
        self.bn2_imag.visit_tensors(&qualify(prefix, "bn2_2"), visitor);
        self.bn_out.visit_tensors(&qualify(prefix, "bn3"), visitor);
    }

    fn visit_tensors_mut(
        &mut self,
        prefix: &str,
        visitor: &mut TensorVisitorMut<'_>,
    ) -> msfast_snn_tensor::Result<()> {
        self.weight.visit_tensors_mut(prefix, visitor)?;
        self.bn1_real.visit_tensors_mut(&qualify(prefix, "bn1_1"), visitor)?;
        self.bn1_imag.visit_tensors_mut(&qualify(prefix, "bn1_2"), visitor)?;
        self.bn2_real.visit_tensors_mut(&qualify(prefix, "bn2_1"), visitor)?;
        self.bn2_imag.visit_tensors_mut(&qualify(prefix, "bn2_2"), visitor)?;
        self.bn_out.visit_tensors_mut(&qualify(prefix, "bn3"), visitor)
    }
}
