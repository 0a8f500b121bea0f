// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Multi-step spiking node
//!
//! Runs a neuron model over an input whose leading axis is time. Every other
//! axis indexes an independent neuron. The output at each step blends the
//! hard spike with the model's surrogate:
//!
//! ```text
//! out(t) = (1 - alpha) × S(t) + alpha × surrogate(H(t))
//! ```
//!
//! `alpha = 1` gives a fully continuous activation, `alpha = 0` pure spikes.

use ndarray::{Array, Dimension};

use crate::error::{NeuronError, Result};
use crate::models::{LifModel, LifParameters, ModelParameters, NeuronModel};

/// Check that `alpha` is a usable blend coefficient.
pub fn validate_alpha(alpha: f32) -> Result<()> {
    if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(NeuronError::InvalidAlpha(alpha))
    }
}

/// Multi-step spiking activation with alpha blending.
#[derive(Debug, Clone)]
pub struct SpikingNode<M: NeuronModel = LifModel> {
    model: M,
    params: M::Parameters,
}

impl SpikingNode<LifModel> {
    /// LIF node with the default parameters (tau 2, threshold 1)
    pub fn lif() -> Self {
        Self {
            model: LifModel,
            params: LifParameters::default(),
        }
    }

    /// LIF node with a custom firing threshold
    pub fn lif_with_threshold(v_threshold: f32) -> Result<Self> {
        Self::new(LifModel, LifParameters::with_threshold(v_threshold))
    }
}

impl<M: NeuronModel> SpikingNode<M> {
    pub fn new(model: M, params: M::Parameters) -> Result<Self> {
        params.validate().map_err(NeuronError::InvalidParameters)?;
        Ok(Self { model, params })
    }

    pub fn params(&self) -> &M::Parameters {
        &self.params
    }

    pub fn model_name(&self) -> &'static str {
        self.model.model_name()
    }

    /// Run the node over `input`, whose axis 0 is time.
    ///
    /// Output has the same shape as the input. Membrane state is reset at the
    /// start of every call.
    pub fn forward<D: Dimension>(&self, input: &Array<f32, D>, alpha: f32) -> Result<Array<f32, D>> {
        validate_alpha(alpha)?;
        if input.ndim() == 0 {
            return Err(NeuronError::MissingTimeAxis(input.shape().to_vec()));
        }
        if input.is_empty() {
            return Ok(input.to_owned());
        }

        let steps = input.shape()[0];
        let standard = input.as_standard_layout();
        let data = standard
            .as_slice()
            .ok_or_else(|| NeuronError::Shape("input is not contiguous".to_string()))?;
        let per_step = data.len() / steps;

        let mut membrane = vec![self.model.initial_potential(&self.params); per_step];
        let mut output = Vec::with_capacity(data.len());

        for step_input in data.chunks_exact(per_step) {
            for (v, &x) in membrane.iter_mut().zip(step_input) {
                let charged = self.model.charge(*v, x, &self.params);
                let fired = self.model.should_fire(charged, &self.params);
                let spike = if fired { 1.0 } else { 0.0 };
                let blended = if alpha == 0.0 {
                    spike
                } else {
                    (1.0 - alpha) * spike + alpha * self.model.surrogate(charged, &self.params)
                };
                output.push(blended);
                *v = self.model.reset_after_fire(charged, fired, &self.params);
            }
        }

        Ok(Array::from_shape_vec(input.raw_dim(), output)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn test_constant_input_fires_periodically() {
        let node = SpikingNode::lif();
        // Single neuron, input 1.5 every step, threshold 1, tau 2:
        // H1 = 0.75 (no), H2 = 0.75 + (1.5 - 0.75)/2 = 1.125 (fire, reset),
        // H3 = 0.75 (no), H4 = 1.125 (fire)
        let input: Array2<f32> = Array2::from_elem((4, 1), 1.5);
        let out = node.forward(&input, 0.0).unwrap();
        assert_eq!(out, array![[0.0f32], [1.0], [0.0], [1.0]]);
    }

    #[test]
    fn test_alpha_one_is_surrogate() {
        let node = SpikingNode::lif();
        let input = array![[2.0f32]];
        let out = node.forward(&input, 1.0).unwrap();
        // H = 1.0 exactly at threshold -> sigmoid(0) = 0.5
        assert!((out[[0, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_blend_is_linear_in_alpha() {
        let node = SpikingNode::lif();
        let input = array![[4.0f32]];
        let spike = node.forward(&input, 0.0).unwrap()[[0, 0]];
        let soft = node.forward(&input, 1.0).unwrap()[[0, 0]];
        let half = node.forward(&input, 0.5).unwrap()[[0, 0]];
        assert!((half - 0.5 * (spike + soft)).abs() < 1e-6);
    }

    #[test]
    fn test_state_resets_between_calls() {
        let node = SpikingNode::lif();
        let input: Array2<f32> = Array2::from_elem((1, 3), 1.5);
        let first = node.forward(&input, 0.0).unwrap();
        let second = node.forward(&input, 0.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_neurons_are_independent() {
        let node = SpikingNode::lif_with_threshold(0.5).unwrap();
        let mut input: Array3<f32> = Array3::zeros((2, 2, 2));
        input[[0, 1, 1]] = 3.0;
        let out = node.forward(&input, 0.0).unwrap();
        assert_eq!(out.shape(), &[2, 2, 2]);
        assert_eq!(out[[0, 1, 1]], 1.0);
        assert_eq!(out.sum(), 1.0);
    }

    #[test]
    fn test_non_standard_layout_input() {
        let node = SpikingNode::lif();
        // Fortran-ordered view of [[2, 2], [0, 0]]
        let fortran = array![[2.0f32, 0.0], [2.0, 0.0]].reversed_axes();
        let out = node.forward(&fortran, 0.0).unwrap();
        assert_eq!(out, array![[1.0f32, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let node = SpikingNode::lif();
        let input: Array2<f32> = Array2::zeros((1, 1));
        assert_eq!(
            node.forward(&input, 1.5).unwrap_err(),
            NeuronError::InvalidAlpha(1.5)
        );
        assert!(node.forward(&input, f32::NAN).is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let err = SpikingNode::lif_with_threshold(-1.0).unwrap_err();
        assert!(matches!(err, NeuronError::InvalidParameters(_)));
    }
}
