// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Frequency-domain kernels
//!
//! The 2-D transform runs over the last two axes of a `(T, B, C, H, W)`
//! tensor. Each `(H, W)` plane is transformed independently: rows first,
//! then columns, with orthonormal scaling `1/sqrt(H·W)`. All transform
//! arithmetic is done in `f64`; results are cast back to `f32`.

use std::sync::Arc;

use ndarray::parallel::prelude::*;
use rayon::slice::ParallelSliceMut;
use ndarray::{Array, Array3, Array4, Array5, Axis, Dimension};
use num_complex::Complex64;
use rand::Rng;
use rustfft::{Fft, FftPlanner};

use crate::error::{Result, TensorError};
use crate::init::normal;
use crate::param::{qualify, Parameterized, TensorKind, TensorVisitor, TensorVisitorMut};

/// Orthonormal 2-D DFT of every `(H, W)` plane, row-major plane order.
fn transform_planes(x: &Array5<f32>) -> Vec<Complex64> {
    let (_, _, _, h, w) = x.dim();
    let mut data: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v as f64, 0.0)).collect();
    if data.is_empty() {
        return data;
    }

    let mut planner = FftPlanner::<f64>::new();
    let row_fft: Arc<dyn Fft<f64>> = planner.plan_fft_forward(w);
    let col_fft: Arc<dyn Fft<f64>> = planner.plan_fft_forward(h);
    let scale = 1.0 / ((h * w) as f64).sqrt();
    let scratch_len = row_fft
        .get_inplace_scratch_len()
        .max(col_fft.get_inplace_scratch_len());

    data.par_chunks_mut(h * w).for_each(|plane| {
        let mut scratch = vec![Complex64::default(); scratch_len];
        // processes each of the h rows in turn
        row_fft.process_with_scratch(plane, &mut scratch);

        let mut column = vec![Complex64::default(); h];
        for col in 0..w {
            for (row, slot) in column.iter_mut().enumerate() {
                *slot = plane[row * w + col];
            }
            col_fft.process_with_scratch(&mut column, &mut scratch);
            for (row, value) in column.iter().enumerate() {
                plane[row * w + col] = *value * scale;
            }
        }
    });
    data
}

/// Orthonormal FFT over `(H, W)`, returning `(real, imaginary)` parts.
pub fn fft2_ortho(x: &Array5<f32>) -> Result<(Array5<f32>, Array5<f32>)> {
    let spectrum = transform_planes(x);
    let re = Array5::from_shape_vec(x.raw_dim(), spectrum.iter().map(|c| c.re as f32).collect())?;
    let im = Array5::from_shape_vec(x.raw_dim(), spectrum.iter().map(|c| c.im as f32).collect())?;
    Ok((re, im))
}

/// Real part of the orthonormal FFT over `(H, W)`.
///
/// A second forward transform is *not* the inverse: transforming the complex
/// spectrum `re + i·im` again gives `x[(-h) mod H, (-w) mod W]`, i.e.
/// `fft2_ortho_real(re) - imag(fft2_ortho(im))`.
pub fn fft2_ortho_real(x: &Array5<f32>) -> Result<Array5<f32>> {
    let spectrum = transform_planes(x);
    Ok(Array5::from_shape_vec(
        x.raw_dim(),
        spectrum.iter().map(|c| c.re as f32).collect(),
    )?)
}

/// `x - λ` above `λ`, `x + λ` below `-λ`, zero in between.
pub fn softshrink<D: Dimension>(x: &Array<f32, D>, lambda: f32) -> Array<f32, D> {
    x.mapv(|v| {
        if v > lambda {
            v - lambda
        } else if v < -lambda {
            v + lambda
        } else {
            0.0
        }
    })
}

/// Shared block-diagonal channel mixer.
///
/// Channels are split into `K` blocks of `D` channels; block `k` is mixed by
/// its own `D×D` matrix: `out[n,k,o,h,w] = Σ_i x[n,k,i,h,w] · W[k,i,o]`.
#[derive(Debug, Clone)]
pub struct BlockDiagonalWeight {
    /// `(K, D, D)`
    weight: Array3<f32>,
}

impl BlockDiagonalWeight {
    pub fn new<R: Rng + ?Sized>(channels: usize, num_blocks: usize, scale: f32, rng: &mut R) -> Result<Self> {
        if num_blocks == 0 || channels == 0 {
            return Err(TensorError::InvalidConfig(format!(
                "block-diagonal weight needs channels ({channels}) and blocks ({num_blocks}) > 0"
            )));
        }
        if channels % num_blocks != 0 {
            return Err(TensorError::NotDivisible {
                what: "channels",
                value: channels,
                divisor: num_blocks,
            });
        }
        let block = channels / num_blocks;
        Ok(Self {
            weight: normal((num_blocks, block, block), scale, rng)?,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.weight.dim().0
    }

    pub fn block_size(&self) -> usize {
        self.weight.dim().1
    }

    pub fn channels(&self) -> usize {
        self.num_blocks() * self.block_size()
    }

    /// Mix `(N, C, H, W)` block-wise; output has the same shape.
    pub fn mix(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.channels() {
            return Err(TensorError::ShapeMismatch {
                op: "block_diagonal_mix",
                expected: vec![n, self.channels(), h, w],
                actual: vec![n, c, h, w],
            });
        }
        let (k, d) = (self.num_blocks(), self.block_size());
        let input = x.as_standard_layout();
        let blocks = input.view().into_shape_with_order((n, k, d, h * w))?;

        let mut output = Array4::<f32>::zeros((n, k, d, h * w));
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(blocks.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut out, sample)| {
                for (block, mut out_block) in out.axis_iter_mut(Axis(0)).enumerate() {
                    let mixer = self.weight.index_axis(Axis(0), block);
                    out_block.assign(&mixer.t().dot(&sample.index_axis(Axis(0), block)));
                }
            });
        Ok(output.into_shape_with_order((n, c, h, w))?)
    }
}

impl Parameterized for BlockDiagonalWeight {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        visitor(&qualify(prefix, "w1"), TensorKind::Learnable, self.weight.view().into_dyn());
    }

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()> {
        visitor(&qualify(prefix, "w1"), TensorKind::Learnable, self.weight.view_mut().into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::{seeded_rng, uniform};
    use ndarray::array;

    fn max_abs_diff(a: &Array5<f32>, b: &Array5<f32>) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_constant_plane_concentrates_at_dc() {
        let x = Array5::<f32>::ones((1, 1, 1, 4, 4));
        let (re, im) = fft2_ortho(&x).unwrap();
        // ortho scaling: sum / sqrt(16) = 16 / 4
        assert!((re[[0, 0, 0, 0, 0]] - 4.0).abs() < 1e-6);
        let rest: f32 = re.iter().skip(1).map(|v| v.abs()).sum();
        assert!(rest < 1e-5);
        assert!(im.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_transform_preserves_energy() {
        let x: Array5<f32> = uniform((2, 1, 3, 4, 8), 1.0, &mut seeded_rng(5));
        let (re, im) = fft2_ortho(&x).unwrap();
        let energy_in: f32 = x.iter().map(|v| v * v).sum();
        let energy_out: f32 = re.iter().zip(im.iter()).map(|(r, i)| r * r + i * i).sum();
        assert!((energy_in - energy_out).abs() / energy_in < 1e-4);
    }

    #[test]
    fn test_applying_transform_twice_reverses_indices() {
        let x: Array5<f32> = uniform((1, 2, 2, 4, 6), 1.0, &mut seeded_rng(9));
        let (re, im) = fft2_ortho(&x).unwrap();
        // F(F(x)) = F(re) + i·F(im); its real part is Re F(re) - Im F(im)
        let (re_re, _) = fft2_ortho(&re).unwrap();
        let (_, im_im) = fft2_ortho(&im).unwrap();
        let twice = &re_re - &im_im;
        let reversed = Array5::from_shape_fn(x.raw_dim(), |(t, b, c, hh, ww)| {
            x[[t, b, c, (4 - hh) % 4, (6 - ww) % 6]]
        });
        assert!(max_abs_diff(&twice, &reversed) < 1e-5);
        assert_eq!(fft2_ortho_real(&re).unwrap(), re_re);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let x: Array5<f32> = uniform((1, 1, 2, 4, 4), 1.0, &mut seeded_rng(2));
        assert_eq!(fft2_ortho_real(&x).unwrap(), fft2_ortho_real(&x).unwrap());
    }

    #[test]
    fn test_softshrink() {
        let x = array![-1.0f32, -0.06, 0.0, 0.05, 0.5];
        let y = softshrink(&x, 0.06);
        let expected = array![-0.94f32, 0.0, 0.0, 0.0, 0.44];
        assert!(y.iter().zip(expected.iter()).all(|(a, b)| (a - b).abs() < 1e-6));
    }

    #[test]
    fn test_block_diagonal_rejects_indivisible_channels() {
        assert!(matches!(
            BlockDiagonalWeight::new(10, 4, 0.002, &mut seeded_rng(0)),
            Err(TensorError::NotDivisible { value: 10, divisor: 4, .. })
        ));
    }

    #[test]
    fn test_block_diagonal_mix_keeps_blocks_separate() {
        let mut mixer = BlockDiagonalWeight::new(4, 2, 0.002, &mut seeded_rng(0)).unwrap();
        // block 0 swaps its two channels, block 1 doubles them
        mixer.weight = array![[[0.0f32, 1.0], [1.0, 0.0]], [[2.0, 0.0], [0.0, 2.0]]];
        let x = Array4::from_shape_vec((1, 4, 1, 1), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let y = mixer.mix(&x).unwrap();
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), vec![2.0, 1.0, 6.0, 8.0]);
    }

    #[test]
    fn test_block_diagonal_uses_input_index_first() {
        let mut mixer = BlockDiagonalWeight::new(2, 1, 0.002, &mut seeded_rng(0)).unwrap();
        // W[i, o]: out_0 = x_0·W[0,0] + x_1·W[1,0]
        mixer.weight = array![[[1.0f32, 0.0], [5.0, 1.0]]];
        let x = Array4::from_shape_vec((1, 2, 1, 1), vec![1.0f32, 1.0]).unwrap();
        let y = mixer.mix(&x).unwrap();
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), vec![6.0, 1.0]);
    }
}
