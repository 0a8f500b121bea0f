// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spatial pooling and resizing over NCHW tensors

use ndarray::parallel::prelude::*;
use ndarray::{Array4, Axis};

use crate::error::{Result, TensorError};

/// Max pooling with implicit `-inf` padding (floor mode, no dilation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl MaxPool2d {
    pub fn new(kernel_size: usize, stride: usize, padding: usize) -> Result<Self> {
        if kernel_size == 0 || stride == 0 {
            return Err(TensorError::InvalidConfig(format!(
                "max_pool(k={kernel_size}, s={stride}) needs non-zero kernel and stride"
            )));
        }
        // every window must overlap the input
        if padding > kernel_size / 2 {
            return Err(TensorError::InvalidConfig(format!(
                "max_pool padding {padding} exceeds half the kernel {kernel_size}"
            )));
        }
        Ok(Self {
            kernel_size,
            stride,
            padding,
        })
    }

    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        let padded_h = height + 2 * self.padding;
        let padded_w = width + 2 * self.padding;
        if height == 0 || width == 0 || padded_h < self.kernel_size || padded_w < self.kernel_size {
            return Err(TensorError::InvalidConfig(format!(
                "input {height}x{width} too small for max_pool(k={}, p={})",
                self.kernel_size, self.padding
            )));
        }
        Ok((
            (padded_h - self.kernel_size) / self.stride + 1,
            (padded_w - self.kernel_size) / self.stride + 1,
        ))
    }

    pub fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = self.output_size(h, w)?;
        let (k, s, p) = (self.kernel_size as isize, self.stride as isize, self.padding as isize);

        let mut output = Array4::<f32>::from_elem((n, c, oh, ow), f32::NEG_INFINITY);
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut out, sample)| {
                for ch in 0..c {
                    for oy in 0..oh {
                        let y0 = oy as isize * s - p;
                        for ox in 0..ow {
                            let x0 = ox as isize * s - p;
                            let mut best = f32::NEG_INFINITY;
                            for iy in (y0.max(0))..(y0 + k).min(h as isize) {
                                for ix in (x0.max(0))..(x0 + k).min(w as isize) {
                                    best = best.max(sample[[ch, iy as usize, ix as usize]]);
                                }
                            }
                            out[[ch, oy, ox]] = best;
                        }
                    }
                }
            });
        Ok(output)
    }
}

/// Nearest-neighbour resize of the two spatial axes to `(height, width)`.
///
/// Source index is `floor(dst · in / out)`.
pub fn upsample_nearest(x: &Array4<f32>, size: (usize, usize)) -> Result<Array4<f32>> {
    let (n, c, h, w) = x.dim();
    let (oh, ow) = size;
    if h == 0 || w == 0 || oh == 0 || ow == 0 {
        return Err(TensorError::InvalidConfig(format!(
            "cannot resize {h}x{w} to {oh}x{ow}"
        )));
    }
    if (h, w) == (oh, ow) {
        return Ok(x.to_owned());
    }
    Ok(Array4::from_shape_fn((n, c, oh, ow), |(b, ch, y, xx)| {
        x[[b, ch, y * h / oh, xx * w / ow]]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pool_3_2_1_halves() {
        let pool = MaxPool2d::new(3, 2, 1).unwrap();
        for size in [2usize, 4, 8, 16, 32] {
            assert_eq!(pool.output_size(size, size).unwrap(), (size / 2, size / 2));
        }
    }

    #[test]
    fn test_pool_5_4_1_quarters() {
        let pool = MaxPool2d::new(5, 4, 1).unwrap();
        for size in [4usize, 8, 16, 32] {
            assert_eq!(pool.output_size(size, size).unwrap(), (size / 4, size / 4));
        }
    }

    #[test]
    fn test_pool_values_ignore_padding() {
        let pool = MaxPool2d::new(3, 2, 1).unwrap();
        let x = array![[[[-5.0f32, -4.0, -3.0, -2.0],
                         [-1.0, -6.0, -7.0, -8.0],
                         [-9.0, -10.0, -11.0, -12.0],
                         [-13.0, -14.0, -15.0, -0.5]]]];
        let y = pool.forward(&x).unwrap();
        // the lower-left window still reaches row 1
        assert_eq!(y, array![[[[-1.0f32, -2.0], [-1.0, -0.5]]]]);
    }

    #[test]
    fn test_pool_rejects_large_padding() {
        assert!(MaxPool2d::new(3, 2, 2).is_err());
    }

    #[test]
    fn test_upsample_nearest_doubles() {
        let x = array![[[[1.0f32, 2.0], [3.0, 4.0]]]];
        let y = upsample_nearest(&x, (4, 4)).unwrap();
        assert_eq!(
            y,
            array![[[[1.0f32, 1.0, 2.0, 2.0],
                     [1.0, 1.0, 2.0, 2.0],
                     [3.0, 3.0, 4.0, 4.0],
                     [3.0, 3.0, 4.0, 4.0]]]]
        );
    }

    #[test]
    fn test_upsample_same_size_is_copy() {
        let x = array![[[[1.0f32, 2.0]]]];
        assert_eq!(upsample_nearest(&x, (1, 2)).unwrap(), x);
    }
}
