// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the MS-FAST network

use msfast_config::ConfigError;
use msfast_snn_neuron::NeuronError;
use msfast_snn_tensor::TensorError;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Neuron(#[from] NeuronError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ndarray::ShapeError> for ModelError {
    fn from(err: ndarray::ShapeError) -> Self {
        ModelError::Tensor(TensorError::from(err))
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
