// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # MS-FAST - Multi-Scale Spatiotemporal Fusion Spiking Network
//!
//! MS-FAST is a spiking image classifier: an input image is repeated over `T`
//! time steps, tokenized by a convolutional stem whose four intermediate
//! feature maps are fused across scale and time, mixed in the frequency
//! domain by a stack of fusion blocks, and pooled into class logits.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! msfast = "0.1"
//! ```
//!
//! ```rust,no_run
//! use msfast::prelude::*;
//! use ndarray::Array4;
//!
//! let mut network = create_model("MS_FAST", 42)?;
//! let images = Array4::<f32>::zeros((2, 3, 64, 64));
//! let logits = network.forward(&images, Mode::Eval)?;
//! assert_eq!(logits.dim(), (2, 200));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//! - **`observability`** (default): re-export the `tracing` initialisation
//!   helpers as [`observability`]
//!
//! ## Crates
//! - [`config`]: TOML configuration, overrides and validation
//! - [`neuron`]: multi-step LIF spiking activation with alpha blending
//! - [`tensor`]: forward kernels on `ndarray`
//! - [`model`]: blocks, tokenizer, network, alpha schedule, checkpoints

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export foundation
pub use msfast_config as config;
pub use msfast_snn_neuron as neuron;
pub use msfast_snn_tensor as tensor;

// Re-export the network
pub use msfast_snn_model as model;

// Re-export infrastructure
#[cfg(feature = "observability")]
pub use msfast_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, validate_config, ModelConfig, MsFastConfig, ScheduleConfig};
    pub use crate::model::{
        create_model, AlphaSchedule, Checkpoint, ModelError, MsFastNetwork, SpikingBlock, AVAILABLE_MODELS,
    };
    pub use crate::neuron::SpikingNode;
    pub use crate::tensor::{Mode, Parameterized};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        assert!(AVAILABLE_MODELS.contains(&"MS_FAST"));
        assert!(Mode::Train.is_training());
        assert_eq!(ModelConfig::ms_fast().num_classes, 200);
    }
}
