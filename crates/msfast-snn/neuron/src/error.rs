// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for spiking activation

/// Error types for spiking activation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NeuronError {
    #[error("Alpha must be a finite value in [0, 1], got {0}")]
    InvalidAlpha(f32),

    #[error("Invalid neuron parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("Input must have a leading time axis, got shape {0:?}")]
    MissingTimeAxis(Vec<usize>),

    #[error("Shape error: {0}")]
    Shape(String),
}

impl From<ndarray::ShapeError> for NeuronError {
    fn from(err: ndarray::ShapeError) -> Self {
        NeuronError::Shape(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, NeuronError>;
