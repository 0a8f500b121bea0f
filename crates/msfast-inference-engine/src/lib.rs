// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! MS-FAST Inference Engine Library
//!
//! This module exports the core functionality of the inference engine
//! for testing and potential library use.

pub mod classify;
pub mod error;
pub mod preprocess;

// Re-export key types for convenience
pub use classify::{softmax, top_k, Classifier, Prediction};
pub use error::{InferenceError, Result};
pub use preprocess::{ImagePreprocessor, IMAGENET_MEAN, IMAGENET_STD};
