// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # MS-FAST Tensor Kernels
//!
//! Forward-only building blocks used by the MS-FAST network, implemented on
//! `ndarray` with `rayon` parallelism over the leading (sample) axis:
//!
//! - **conv**: `Conv2d` (NCHW) and pointwise `Conv1d` (NCL)
//! - **norm**: batch normalisation with running statistics
//! - **pool**: max pooling and nearest-neighbour resizing
//! - **linear**: fully-connected head
//! - **spectral**: orthonormal 2-D FFT (computed in `f64`), softshrink and
//!   block-diagonal channel mixing
//!
//! Gradients are out of scope: layers hold plain arrays that a training
//! harness can read and overwrite through [`Parameterized`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod conv;
pub mod error;
pub mod init;
pub mod linear;
pub mod mode;
pub mod norm;
pub mod param;
pub mod pool;
pub mod shape;
pub mod spectral;

pub use conv::{Conv1d, Conv2d};
pub use error::{Result, TensorError};
pub use init::seeded_rng;
pub use linear::Linear;
pub use mode::Mode;
pub use norm::BatchNorm;
pub use param::{Parameterized, TensorKind};
pub use pool::{upsample_nearest, MaxPool2d};
pub use shape::{flatten_time, mean_axis, standard, unflatten_time};
pub use spectral::{fft2_ortho, fft2_ortho_real, softshrink, BlockDiagonalWeight};
