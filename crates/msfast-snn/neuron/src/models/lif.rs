// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # LIF (Leaky Integrate-and-Fire) Neuron Model
//!
//! ## Model Dynamics
//!
//! ```text
//! Charge (input decays toward the membrane):
//!     H(t) = V(t-1) + (X(t) - (V(t-1) - V_reset)) / tau
//!
//! Firing Check:
//!     S(t) = 1 if H(t) >= V_th else 0
//!
//! Surrogate:
//!     sigmoid(k × (H(t) - V_th))
//!
//! Hard reset (reset path does not depend on the surrogate):
//!     V(t) = H(t) × (1 - S(t)) + V_reset × S(t)
//! ```

use super::traits::{ModelParameters, NeuronModel};

/// LIF (Leaky Integrate-and-Fire) neuron model
#[derive(Debug, Clone, Copy, Default)]
pub struct LifModel;

impl LifModel {
    /// Create a new LIF model instance
    pub fn new() -> Self {
        Self
    }
}

impl NeuronModel for LifModel {
    type Parameters = LifParameters;

    fn model_name(&self) -> &'static str {
        "Leaky Integrate-and-Fire (LIF)"
    }

    #[inline(always)]
    fn charge(&self, membrane_potential: f32, input: f32, params: &LifParameters) -> f32 {
        membrane_potential + (input - (membrane_potential - params.v_reset)) / params.tau
    }

    #[inline(always)]
    fn should_fire(&self, membrane_potential: f32, params: &LifParameters) -> bool {
        membrane_potential >= params.v_threshold
    }

    #[inline(always)]
    fn surrogate(&self, membrane_potential: f32, params: &LifParameters) -> f32 {
        let z = params.surrogate_slope * (membrane_potential - params.v_threshold);
        1.0 / (1.0 + (-z).exp())
    }

    #[inline(always)]
    fn reset_after_fire(&self, membrane_potential: f32, fired: bool, params: &LifParameters) -> f32 {
        if fired {
            params.v_reset
        } else {
            membrane_potential
        }
    }

    #[inline(always)]
    fn initial_potential(&self, params: &LifParameters) -> f32 {
        params.v_reset
    }
}

/// LIF model-specific parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LifParameters {
    /// Membrane time constant (>= 1.0)
    pub tau: f32,

    /// Firing threshold
    pub v_threshold: f32,

    /// Potential after a spike and at the start of each call
    pub v_reset: f32,

    /// Steepness of the sigmoid surrogate
    pub surrogate_slope: f32,
}

impl LifParameters {
    /// Create new LIF parameters with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default parameters with a custom firing threshold
    pub fn with_threshold(v_threshold: f32) -> Self {
        Self {
            v_threshold,
            ..Self::default()
        }
    }
}

impl Default for LifParameters {
    fn default() -> Self {
        Self {
            tau: 2.0,
            v_threshold: 1.0,
            v_reset: 0.0,
            surrogate_slope: 4.0,
        }
    }
}

impl ModelParameters for LifParameters {
    fn validate(&self) -> Result<(), &'static str> {
        if !(self.tau.is_finite() && self.tau >= 1.0) {
            return Err("LIF: tau must be finite and >= 1");
        }
        if !self.v_threshold.is_finite() || !self.v_reset.is_finite() {
            return Err("LIF: threshold and reset potential must be finite");
        }
        if self.v_reset >= self.v_threshold {
            return Err("LIF: reset potential must be below the threshold");
        }
        if !(self.surrogate_slope.is_finite() && self.surrogate_slope > 0.0) {
            return Err("LIF: surrogate slope must be positive");
        }
        Ok(())
    }

    fn parameter_count() -> usize {
        4 // tau + v_threshold + v_reset + surrogate_slope
    }
}
