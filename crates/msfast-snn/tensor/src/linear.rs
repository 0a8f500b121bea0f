// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::error::{Result, TensorError};
use crate::init::trunc_normal;
use crate::param::{qualify, Parameterized, TensorKind, TensorVisitor, TensorVisitorMut};

/// Standard deviation of the head initialiser
pub const HEAD_INIT_STD: f32 = 0.02;

/// Fully-connected layer `y = x Wᵀ + b` over `(B, in)`.
///
/// Weights start truncated-normal (std 0.02, cut at ±2) and the bias at zero.
#[derive(Debug, Clone)]
pub struct Linear {
    /// `(out_features, in_features)`
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(TensorError::InvalidConfig(format!(
                "linear({in_features} -> {out_features}) needs non-zero features"
            )));
        }
        Ok(Self {
            weight: trunc_normal((out_features, in_features), HEAD_INIT_STD, -2.0, 2.0, rng)?,
            bias: Array1::zeros(out_features),
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features() {
            return Err(TensorError::ShapeMismatch {
                op: "linear",
                expected: vec![x.nrows(), self.in_features()],
                actual: x.shape().to_vec(),
            });
        }
        Ok(x.dot(&self.weight.t()) + &self.bias)
    }
}

impl Parameterized for Linear {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view().into_dyn());
        visitor(&qualify(prefix, "bias"), TensorKind::Learnable, self.bias.view().into_dyn());
    }

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()> {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view_mut().into_dyn())?;
        visitor(&qualify(prefix, "bias"), TensorKind::Learnable, self.bias.view_mut().into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::seeded_rng;
    use ndarray::array;

    #[test]
    fn test_initial_bias_is_zero_and_weights_small() {
        let linear = Linear::new(64, 10, &mut seeded_rng(0)).unwrap();
        assert!(linear.bias.iter().all(|b| *b == 0.0));
        assert!(linear.weight.iter().all(|w| w.abs() < 0.2));
        assert_eq!(linear.num_parameters(), 64 * 10 + 10);
    }

    #[test]
    fn test_forward_shape_and_values() {
        let mut linear = Linear::new(2, 1, &mut seeded_rng(0)).unwrap();
        linear.weight = array![[1.0f32, -1.0]];
        linear.bias = array![0.5f32];
        let y = linear.forward(&array![[3.0f32, 1.0], [0.0, 2.0]]).unwrap();
        assert_eq!(y, array![[2.5f32], [-1.5]]);
    }

    #[test]
    fn test_wrong_width_rejected() {
        let linear = Linear::new(4, 2, &mut seeded_rng(0)).unwrap();
        assert!(linear.forward(&Array2::zeros((1, 3))).is_err());
    }
}
