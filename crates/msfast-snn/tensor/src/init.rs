// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Parameter initialisers
//!
//! All initialisers draw from a caller-supplied RNG so that a network built
//! from the same seed is bit-identical.

use ndarray::{Array, Dimension, ShapeBuilder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Result, TensorError};

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `U(-bound, bound)`
pub fn uniform<D, Sh, R>(shape: Sh, bound: f32, rng: &mut R) -> Array<f32, D>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
    R: Rng + ?Sized,
{
    Array::from_shape_simple_fn(shape, || rng.gen_range(-bound..=bound))
}

/// Bound used by the default convolution/linear initialiser: `1/sqrt(fan_in)`
pub fn fan_in_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in.max(1) as f32).sqrt()
}

/// `std · N(0, 1)`
pub fn normal<D, Sh, R>(shape: Sh, std: f32, rng: &mut R) -> Result<Array<f32, D>>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
    R: Rng + ?Sized,
{
    let dist = Normal::new(0.0f32, std)
        .map_err(|e| TensorError::InvalidConfig(format!("normal(std={std}): {e}")))?;
    Ok(Array::from_shape_simple_fn(shape, || dist.sample(rng)))
}

/// `N(0, std²)` resampled until it falls inside `[lower, upper]`.
pub fn trunc_normal<D, Sh, R>(
    shape: Sh,
    std: f32,
    lower: f32,
    upper: f32,
    rng: &mut R,
) -> Result<Array<f32, D>>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
    R: Rng + ?Sized,
{
    if !(lower <= 0.0 && 0.0 <= upper && lower < upper) {
        return Err(TensorError::InvalidConfig(format!(
            "trunc_normal bounds [{lower}, {upper}] must contain the mean"
        )));
    }
    let dist = Normal::new(0.0f32, std)
        .map_err(|e| TensorError::InvalidConfig(format!("trunc_normal(std={std}): {e}")))?;
    Ok(Array::from_shape_simple_fn(shape, || loop {
        let v = dist.sample(rng);
        if (lower..=upper).contains(&v) {
            break v;
        }
    }))
}
