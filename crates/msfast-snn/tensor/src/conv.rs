// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Convolutions
//!
//! `Conv2d` lowers each sample to an im2col matrix and multiplies it by the
//! flattened kernel; samples run in parallel. `Conv1d` only supports a kernel
//! of size 1, which is all the temporal fusion path needs.

use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView3, Axis};
use rand::Rng;
use tracing::trace;

use crate::error::{Result, TensorError};
use crate::init::{fan_in_bound, uniform};
use crate::param::{qualify, Parameterized, TensorKind, TensorVisitor, TensorVisitorMut};

/// 2-D convolution over NCHW input, square kernel, no dilation or groups.
#[derive(Debug, Clone)]
pub struct Conv2d {
    /// `(out_channels, in_channels, k, k)`
    weight: Array4<f32>,
    bias: Option<Array1<f32>>,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 || kernel_size == 0 || stride == 0 {
            return Err(TensorError::InvalidConfig(format!(
                "conv2d({in_channels} -> {out_channels}, k={kernel_size}, s={stride}) needs non-zero sizes"
            )));
        }
        let bound = fan_in_bound(in_channels * kernel_size * kernel_size);
        let weight = uniform((out_channels, in_channels, kernel_size, kernel_size), bound, rng);
        let bias = if bias {
            Some(uniform(out_channels, bound, rng))
        } else {
            None
        };
        Ok(Self {
            weight,
            bias,
            stride,
            padding,
        })
    }

    /// 1×1 convolution, stride 1, no padding
    pub fn pointwise<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        Self::new(in_channels, out_channels, 1, 1, 0, bias, rng)
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn kernel_size(&self) -> usize {
        self.weight.dim().2
    }

    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize)> {
        let k = self.kernel_size();
        let padded_h = height + 2 * self.padding;
        let padded_w = width + 2 * self.padding;
        if padded_h < k || padded_w < k {
            return Err(TensorError::InvalidConfig(format!(
                "input {height}x{width} (padding {}) smaller than kernel {k}",
                self.padding
            )));
        }
        Ok(((padded_h - k) / self.stride + 1, (padded_w - k) / self.stride + 1))
    }

    pub fn forward(&self, x: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.in_channels() {
            return Err(TensorError::ShapeMismatch {
                op: "conv2d",
                expected: vec![n, self.in_channels(), h, w],
                actual: vec![n, c, h, w],
            });
        }
        let (oh, ow) = self.output_size(h, w)?;
        let k = self.kernel_size();
        let out_c = self.out_channels();
        let kernel = self.weight.view().into_shape_with_order((out_c, c * k * k))?;
        let direct = k == 1 && self.stride == 1 && self.padding == 0;
        trace!(
            target: "msfast_snn_tensor",
            "[CONV2D] {}x{}x{} -> {}x{}x{}, k={} ({})",
            c, h, w, out_c, oh, ow, k,
            if direct { "direct" } else { "im2col" }
        );

        let mut output = Array4::<f32>::zeros((n, out_c, oh, ow));
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)).into_par_iter())
            .try_for_each(|(mut out, sample)| -> Result<()> {
                let cols = if direct {
                    sample.as_standard_layout().into_owned().into_shape_with_order((c, h * w))?
                } else {
                    im2col(&sample, k, self.stride, self.padding, oh, ow)
                };
                let y = kernel.dot(&cols);
                out.assign(&y.into_shape_with_order((out_c, oh, ow))?);
                Ok(())
            })?;

        if let Some(bias) = &self.bias {
            output += &bias.view().into_shape_with_order((1, out_c, 1, 1))?;
        }
        Ok(output)
    }
}

/// Unfold one `(C, H, W)` sample into `(C·k·k, oh·ow)` columns.
fn im2col(
    sample: &ArrayView3<f32>,
    k: usize,
    stride: usize,
    padding: usize,
    oh: usize,
    ow: usize,
) -> Array2<f32> {
    let (c, h, w) = sample.dim();
    let mut cols = Array2::<f32>::zeros((c * k * k, oh * ow));
    for ci in 0..c {
        for ky in 0..k {
            for kx in 0..k {
                let row = (ci * k + ky) * k + kx;
                for oy in 0..oh {
                    let iy = (oy * stride + ky) as isize - padding as isize;
                    if iy < 0 || iy >= h as isize {
                        continue;
                    }
                    for ox in 0..ow {
                        let ix = (ox * stride + kx) as isize - padding as isize;
                        if ix < 0 || ix >= w as isize {
                            continue;
                        }
                        cols[[row, oy * ow + ox]] = sample[[ci, iy as usize, ix as usize]];
                    }
                }
            }
        }
    }
    cols
}

impl Parameterized for Conv2d {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view().into_dyn());
        if let Some(bias) = &self.bias {
            visitor(&qualify(prefix, "bias"), TensorKind::Learnable, bias.view().into_dyn());
        }
    }

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()> {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view_mut().into_dyn())?;
        if let Some(bias) = &mut self.bias {
            visitor(&qualify(prefix, "bias"), TensorKind::Learnable, bias.view_mut().into_dyn())?;
        }
        Ok(())
    }
}

/// Kernel-size-1 convolution over `(N, C, L)`, i.e. a per-position linear map
/// across channels.
#[derive(Debug, Clone)]
pub struct Conv1d {
    /// `(out_channels, in_channels, 1)`
    weight: Array3<f32>,
    bias: Option<Array1<f32>>,
}

impl Conv1d {
    pub fn pointwise<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(TensorError::InvalidConfig(format!(
                "conv1d({in_channels} -> {out_channels}) needs non-zero channels"
            )));
        }
        let bound = fan_in_bound(in_channels);
        let weight = uniform((out_channels, in_channels, 1), bound, rng);
        let bias = if bias {
            Some(uniform(out_channels, bound, rng))
        } else {
            None
        };
        Ok(Self { weight, bias })
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn forward(&self, x: &Array3<f32>) -> Result<Array3<f32>> {
        let (n, c, len) = x.dim();
        if c != self.in_channels() {
            return Err(TensorError::ShapeMismatch {
                op: "conv1d",
                expected: vec![n, self.in_channels(), len],
                actual: vec![n, c, len],
            });
        }
        let out_c = self.out_channels();
        let kernel = self.weight.index_axis(Axis(2), 0);

        let mut output = Array3::<f32>::zeros((n, out_c, len));
        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut out, sample)| out.assign(&kernel.dot(&sample)));

        if let Some(bias) = &self.bias {
            output += &bias.view().into_shape_with_order((1, out_c, 1))?;
        }
        Ok(output)
    }
}

impl Parameterized for Conv1d {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>) {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view().into_dyn());
        if let Some(bias) = &self.bias {
            visitor(&qualify(prefix, "bias"), TensorKind::Learnable, bias.view().into_dyn());
        }
    }

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()> {
        visitor(&qualify(prefix, "weight"), TensorKind::Learnable, self.weight.view_mut().into_dyn())?;
        if let Some(bias) = &mut self.bias {
            visitor(&qualify(prefix, "bias"), TensorKind::Learnable, bias.view_mut().into_dyn())?;
        }
        Ok(())
    }
}
