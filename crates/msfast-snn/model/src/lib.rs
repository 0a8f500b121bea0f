// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # MS-FAST Network
//!
//! Spiking image classifier built from:
//! - **tokenizer**: convolutional stem with multi-scale spatiotemporal fusion
//! - **fusion blocks**: frequency-domain mixer + spiking feed-forward, both residual
//! - **head**: spatial/temporal mean pooling and a linear classifier
//!
//! ## Architecture
//! - Feature tensors are `(T, B, C, H, W)` `ndarray` arrays
//! - Every spiking node reads the network-wide `alpha`, annealed by [`AlphaSchedule`]
//! - Train/eval behaviour is selected per call with [`Mode`]
//! - All construction and shape errors surface as [`ModelError`]

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod block;
pub mod checkpoint;
pub mod error;
pub mod fusion;
pub mod mixer;
pub mod mlp;
pub mod multiscale;
pub mod network;
pub mod schedule;
pub mod tokenizer;

pub use block::SpikingBlock;
pub use checkpoint::{read_checkpoint, Checkpoint, StateDict, StoredTensor, CHECKPOINT_FORMAT_VERSION};
pub use error::{ModelError, Result};
pub use fusion::FusionBlock;
pub use mixer::FrequencyMixer;
pub use mlp::FeedForward;
pub use multiscale::MultiScaleFusion;
pub use network::{create_model, validate_model_config, MsFastNetwork, AVAILABLE_MODELS};
pub use schedule::AlphaSchedule;
pub use tokenizer::SpikingTokenizer;

pub use msfast_snn_tensor::{Mode, Parameterized};
