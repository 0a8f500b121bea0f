// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared block interface and layout helpers

use ndarray::{Array4, Array5};
use msfast_snn_tensor::{flatten_time, unflatten_time, Mode, Parameterized};

use crate::error::Result;

/// A shape-preserving block over `(T, B, C, H, W)` feature tensors.
///
/// `alpha` is the current surrogate blend passed to every spiking node
/// inside the block.
pub trait SpikingBlock: Parameterized {
    fn forward(&mut self, x: &Array5<f32>, alpha: f32, mode: Mode) -> Result<Array5<f32>>;
}

/// Run a per-frame `(N, C, H, W)` operation over the merged `T·B` axis.
pub(crate) fn per_frame<F>(x: &Array5<f32>, op: F) -> Result<Array5<f32>>
where
    F: FnOnce(&Array4<f32>) -> Result<Array4<f32>>,
{
    let (t, b, ..) = x.dim();
    let frames = op(&flatten_time(x)?)?;
    Ok(unflatten_time(frames, t, b)?)
}
