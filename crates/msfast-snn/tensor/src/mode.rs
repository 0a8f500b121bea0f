// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Execution mode of a forward pass.
///
/// `Train` normalises with batch statistics and updates running statistics;
/// `Eval` uses the running statistics and leaves all state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn is_training(self) -> bool {
        matches!(self, Mode::Train)
    }
}
