// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # msfast-observability
//!
//! Unified logging infrastructure for MS-FAST.
//!
//! Provides consistent `tracing` setup across all MS-FAST crates with
//! per-crate debug flag support:
//! - console output (human-readable)
//! - optional JSON log files, one folder per run, with retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known MS-FAST crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "msfast",
    "msfast-config",
    "msfast-snn-neuron",
    "msfast-snn-tensor",
    "msfast-snn-model",
    "msfast-inference-engine",
];

/// Convert a package name into the tracing target of its library
/// (`msfast-snn-model` -> `msfast_snn_model`).
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_target() {
        assert_eq!(crate_target("msfast-snn-model"), "msfast_snn_model");
        assert_eq!(crate_target("msfast"), "msfast");
    }
}
