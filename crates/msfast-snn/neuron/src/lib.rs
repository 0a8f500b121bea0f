// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # MS-FAST Spiking Activation
//!
//! The stateful nonlinearity used by every MS-FAST block:
//! - **Models**: per-neuron dynamics behind the `NeuronModel` trait (LIF)
//! - **Node**: multi-step execution over a `(T, ...)` tensor with an alpha
//!   coefficient that blends hard spikes with a continuous surrogate
//!
//! Membrane state lives only for the duration of one call: it starts at the
//! reset potential, carries across time steps, and is dropped on return.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod models;
pub mod node;

pub use error::{NeuronError, Result};
pub use models::{LifModel, LifParameters, ModelParameters, NeuronModel};
pub use node::{validate_alpha, SpikingNode};
