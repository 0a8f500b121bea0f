// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neuron Model Architecture
//!
//! Per-neuron dynamics are expressed through the `NeuronModel` trait so the
//! multi-step node can stay agnostic of the membrane equation.
//!
//! ## Adding a New Neuron Model
//!
//! 1. Create `src/models/your_model.rs`
//! 2. Implement `NeuronModel` trait
//! 3. Add tests
//! 4. Export in `mod.rs`

pub mod lif;
pub mod traits;

pub use lif::{LifModel, LifParameters};
pub use traits::{ModelParameters, NeuronModel};
