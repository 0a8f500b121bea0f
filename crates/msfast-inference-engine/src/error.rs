// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use msfast_snn_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(usize),

    #[error("No images to classify")]
    EmptyBatch,

    #[error("Invalid top-k {requested}: the model has {available} outputs")]
    InvalidTopK { requested: usize, available: usize },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
