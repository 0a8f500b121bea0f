// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Layout helpers for `(T, B, C, H, W)` feature tensors

use ndarray::{Array, Array4, Array5, Axis, Dimension, RemoveAxis};

use crate::error::{Result, TensorError};

/// Return `x` in standard (row-major) layout, copying only when needed.
pub fn standard<D: Dimension>(x: Array<f32, D>) -> Array<f32, D> {
    if x.is_standard_layout() {
        x
    } else {
        x.as_standard_layout().into_owned()
    }
}

/// `(T, B, C, H, W)` -> `(T·B, C, H, W)`
pub fn flatten_time(x: &Array5<f32>) -> Result<Array4<f32>> {
    let (t, b, c, h, w) = x.dim();
    Ok(x
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((t * b, c, h, w))?)
}

/// `(T·B, C, H, W)` -> `(T, B, C, H, W)`
pub fn unflatten_time(x: Array4<f32>, time_steps: usize, batch: usize) -> Result<Array5<f32>> {
    let (n, c, h, w) = x.dim();
    if n != time_steps * batch {
        return Err(TensorError::ShapeMismatch {
            op: "unflatten_time",
            expected: vec![time_steps * batch, c, h, w],
            actual: vec![n, c, h, w],
        });
    }
    Ok(standard(x).into_shape_with_order((time_steps, batch, c, h, w))?)
}

/// Mean over `axis`, failing on an empty axis instead of returning `None`.
pub fn mean_axis<D: Dimension + RemoveAxis>(
    x: &Array<f32, D>,
    axis: Axis,
) -> Result<Array<f32, D::Smaller>> {
    x.mean_axis(axis).ok_or_else(|| TensorError::ShapeMismatch {
        op: "mean_axis",
        expected: vec![1],
        actual: x.shape().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_unflatten_preserves_order() {
        let x = Array5::from_shape_fn((2, 3, 1, 1, 2), |(t, b, _, _, w)| (t * 100 + b * 10 + w) as f32);
        let flat = flatten_time(&x).unwrap();
        assert_eq!(flat.dim(), (6, 1, 1, 2));
        assert_eq!(flat[[4, 0, 0, 1]], 111.0);

        let back = unflatten_time(flat, 2, 3).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_flatten_non_standard_layout() {
        let x = Array5::from_shape_fn((2, 2, 1, 1, 1), |(t, b, _, _, _)| (t * 10 + b) as f32);
        let mut swapped = x.clone();
        swapped.swap_axes(0, 1);
        let flat = flatten_time(&swapped).unwrap();
        // logical order is (b, t) after the swap
        let values: Vec<f32> = flat.iter().copied().collect();
        assert_eq!(values, vec![0.0, 10.0, 1.0, 11.0]);
    }

    #[test]
    fn test_unflatten_rejects_wrong_count() {
        let x = Array4::<f32>::zeros((5, 1, 1, 1));
        assert!(matches!(
            unflatten_time(x, 2, 3),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_mean_axis_empty() {
        let x = Array4::<f32>::zeros((0, 2, 1, 1));
        assert!(mean_axis(&x, Axis(0)).is_err());
    }
}
