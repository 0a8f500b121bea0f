// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that the model hyperparameters describe a network the tokenizer and
//! the spectral mixing block can actually build, and that the schedule and
//! logging values are in range.

use crate::{ConfigError, ConfigResult, MsFastConfig};

/// Total spatial downsampling of the tokenizer (four stride-2 pools).
pub const TOKENIZER_STRIDE: usize = 16;

/// The tokenizer's first stage produces `embed_dims / 8` channels.
pub const STEM_CHANNEL_DIVISOR: usize = 8;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "json"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotDivisible { field: String, value: usize, divisor: usize },
    MustBePositive { field: String },
    OutOfRange { field: String, value: f64, min: f64, max: f64 },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDivisible { field, value, divisor } => {
                write!(f, "{} = {} must be divisible by {}", field, value, divisor)
            }
            Self::MustBePositive { field } => write!(f, "{} must be greater than zero", field),
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{} = {} is outside [{}, {})", field, value, min, max)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive sizes (image, patch, channels, heads, time steps)
/// - Divisibility constraints imposed by the tokenizer and spectral blocks
/// - Rates and coefficients within their valid ranges
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation if validation fails
pub fn validate_config(config: &MsFastConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Run every check and return the individual violations.
pub fn collect_errors(config: &MsFastConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_model_sizes(config, &mut errors);
    validate_divisibility(config, &mut errors);
    validate_rates(config, &mut errors);
    validate_schedule(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn positive(field: &str, value: usize, errors: &mut Vec<ConfigValidationError>) -> bool {
    if value == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: field.to_string(),
        });
        return false;
    }
    true
}

fn divisible(
    field: &str,
    value: usize,
    divisor: usize,
    errors: &mut Vec<ConfigValidationError>,
) {
    if divisor != 0 && value % divisor != 0 {
        errors.push(ConfigValidationError::NotDivisible {
            field: field.to_string(),
            value,
            divisor,
        });
    }
}

fn in_range(field: &str, value: f64, min: f64, max: f64, errors: &mut Vec<ConfigValidationError>) {
    if !(value >= min && value < max) {
        errors.push(ConfigValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        });
    }
}

fn validate_model_sizes(config: &MsFastConfig, errors: &mut Vec<ConfigValidationError>) {
    let model = &config.model;
    positive("model.img_size_h", model.img_size_h, errors);
    positive("model.img_size_w", model.img_size_w, errors);
    positive("model.patch_size", model.patch_size, errors);
    positive("model.in_channels", model.in_channels, errors);
    positive("model.embed_dims", model.embed_dims, errors);
    positive("model.num_heads", model.num_heads, errors);
    positive("model.time_steps", model.time_steps, errors);
}

fn validate_divisibility(config: &MsFastConfig, errors: &mut Vec<ConfigValidationError>) {
    let model = &config.model;

    // Spectral mixing splits channels into equal blocks
    divisible("model.embed_dims", model.embed_dims, model.num_heads, errors);
    // Tokenizer stem width is embed_dims / 8, second stage embed_dims / 4
    divisible(
        "model.embed_dims",
        model.embed_dims,
        STEM_CHANNEL_DIVISOR,
        errors,
    );
    divisible(
        "model.img_size_h",
        model.img_size_h,
        TOKENIZER_STRIDE,
        errors,
    );
    divisible(
        "model.img_size_w",
        model.img_size_w,
        TOKENIZER_STRIDE,
        errors,
    );
    divisible("model.img_size_h", model.img_size_h, model.patch_size, errors);
    divisible("model.img_size_w", model.img_size_w, model.patch_size, errors);
}

fn validate_rates(config: &MsFastConfig, errors: &mut Vec<ConfigValidationError>) {
    let model = &config.model;
    in_range("model.drop_rate", model.drop_rate as f64, 0.0, 1.0, errors);
    in_range(
        "model.attn_drop_rate",
        model.attn_drop_rate as f64,
        0.0,
        1.0,
        errors,
    );
    in_range(
        "model.drop_path_rate",
        model.drop_path_rate as f64,
        0.0,
        1.0,
        errors,
    );

    if !(model.mlp_ratio.is_finite() && model.mlp_ratio > 0.0) || model.mlp_hidden_dims() == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.mlp_ratio".to_string(),
            reason: format!(
                "{} yields an empty hidden layer for embed_dims {}",
                model.mlp_ratio, model.embed_dims
            ),
        });
    }
    if !(model.norm_eps.is_finite() && model.norm_eps > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "model.norm_eps".to_string(),
            reason: "must be a positive finite number".to_string(),
        });
    }
}

fn validate_schedule(config: &MsFastConfig, errors: &mut Vec<ConfigValidationError>) {
    let schedule = &config.schedule;
    if schedule.warmup_epochs == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "schedule.warmup_epochs".to_string(),
        });
    }
    positive("schedule.loader_length", schedule.loader_length, errors);
    if !(0.0..=1.0).contains(&schedule.initial_alpha) {
        errors.push(ConfigValidationError::OutOfRange {
            field: "schedule.initial_alpha".to_string(),
            value: schedule.initial_alpha as f64,
            min: 0.0,
            max: 1.0,
        });
    }
}

fn validate_logging(config: &MsFastConfig, errors: &mut Vec<ConfigValidationError>) {
    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
        });
    }
    if !LOG_FORMATS.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: format!("expected one of {}", LOG_FORMATS.join(", ")),
        });
    }
    positive("runtime.top_k", config.runtime.top_k, errors);
}
