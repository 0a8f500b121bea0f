// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named tensor traversal shared by layers, blocks and checkpoints

use ndarray::{ArrayViewD, ArrayViewMutD};

use crate::error::Result;

/// Whether a tensor is trained or only tracked (batch-norm running stats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorKind {
    Learnable,
    Buffer,
}

/// Visitor for immutable traversal: `(qualified_name, kind, tensor)`
pub type TensorVisitor<'v> = dyn FnMut(&str, TensorKind, ArrayViewD<'_, f32>) + 'v;

/// Visitor for mutable traversal. Returning `Err` aborts the walk.
pub type TensorVisitorMut<'v> = dyn FnMut(&str, TensorKind, ArrayViewMutD<'_, f32>) -> Result<()> + 'v;

/// Anything that owns named tensors.
///
/// Names are dot-qualified (`block.0.attn.bn3.weight`). Implementations visit
/// tensors in a fixed order so that traversal output is reproducible.
pub trait Parameterized {
    fn visit_tensors(&self, prefix: &str, visitor: &mut TensorVisitor<'_>);

    fn visit_tensors_mut(&mut self, prefix: &str, visitor: &mut TensorVisitorMut<'_>) -> Result<()>;

    /// Number of learnable scalars (buffers excluded)
    fn num_parameters(&self) -> usize {
        let mut total = 0;
        self.visit_tensors("", &mut |_, kind, tensor| {
            if kind == TensorKind::Learnable {
                total += tensor.len();
            }
        });
        total
    }
}

/// Join a prefix and a local name with a dot.
pub fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("", "weight"), "weight");
        assert_eq!(qualify("block.0", "weight"), "block.0.weight");
    }
}
