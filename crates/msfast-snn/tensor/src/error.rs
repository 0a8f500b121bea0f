// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for tensor kernels

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    #[error("Shape mismatch in {op}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("{what} = {value} must be divisible by {divisor}")]
    NotDivisible {
        what: &'static str,
        value: usize,
        divisor: usize,
    },

    #[error("Invalid layer configuration: {0}")]
    InvalidConfig(String),

    #[error("Batch statistics need more than one value per channel, got {0}")]
    InsufficientBatch(usize),

    #[error("Shape error: {0}")]
    Shape(String),
}

impl From<ndarray::ShapeError> for TensorError {
    fn from(err: ndarray::ShapeError) -> Self {
        TensorError::Shape(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, TensorError>;
