// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Traits shared by all neuron models

/// Per-neuron dynamics for a single time step.
pub trait NeuronModel {
    type Parameters: ModelParameters;

    /// Human-readable model name
    fn model_name(&self) -> &'static str;

    /// Integrate one input into the membrane potential
    fn charge(&self, membrane_potential: f32, input: f32, params: &Self::Parameters) -> f32;

    /// Hard firing decision on the charged potential
    fn should_fire(&self, membrane_potential: f32, params: &Self::Parameters) -> bool;

    /// Continuous stand-in for the firing decision, in `[0, 1]`
    fn surrogate(&self, membrane_potential: f32, params: &Self::Parameters) -> f32;

    /// Membrane potential carried into the next step
    fn reset_after_fire(&self, membrane_potential: f32, fired: bool, params: &Self::Parameters)
        -> f32;

    /// Potential every neuron starts from at the beginning of a call
    fn initial_potential(&self, params: &Self::Parameters) -> f32;
}

/// Validation contract for model parameters
pub trait ModelParameters {
    fn validate(&self) -> Result<(), &'static str>;

    fn parameter_count() -> usize;
}
