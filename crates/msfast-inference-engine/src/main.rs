// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use msfast_config::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config, validate_config,
    MsFastConfig,
};
use msfast_inference_engine::{Classifier, ImagePreprocessor};
use msfast_observability::{debug_flags_help, init_logging, parse_debug_flags, LogFormat, LoggingOptions};

/// MS-FAST Inference Engine - classify images with a spiking multi-scale fusion network
#[derive(Parser, Debug)]
#[command(name = "msfast-inference-engine", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to msfast_configuration.toml (searched for when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkpoint to restore (overrides runtime.checkpoint)
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Images to classify
    #[arg(short, long = "image", required = true, num_args = 1..)]
    images: Vec<PathBuf>,

    /// Number of classes to report per image
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Parameter seed used when no checkpoint is given
    #[arg(long)]
    seed: Option<u64>,

    /// Model preset (MS_FAST, tiny) replacing the [model] section
    #[arg(long)]
    preset: Option<String>,

    /// Write JSON logs under this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(preset) = &self.preset {
            overrides.insert("preset".to_string(), preset.clone());
        }
        if let Some(checkpoint) = &self.checkpoint {
            overrides.insert("checkpoint".to_string(), checkpoint.display().to_string());
        }
        if let Some(top_k) = self.top_k {
            overrides.insert("top_k".to_string(), top_k.to_string());
        }
        if let Some(seed) = self.seed {
            overrides.insert("seed".to_string(), seed.to_string());
        }
        if self.verbose {
            overrides.insert("log_level".to_string(), "debug".to_string());
        }
        overrides
    }
}

fn resolve_config(args: &Args) -> Result<MsFastConfig> {
    let overrides = args.overrides();
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config_file().ok(),
    };

    let config = match config_path {
        Some(path) => load_config(Some(&path), Some(&overrides))
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            let mut config = MsFastConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &overrides).context("Invalid command-line override")?;
            config
        }
    };
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    // `--debug-*` flags belong to the observability layer, not clap
    let debug_flags = parse_debug_flags();
    let args = Args::parse_from(env::args().filter(|arg| !arg.starts_with("--debug-")));

    let config = resolve_config(&args)?;

    let format: LogFormat = config.logging.format.parse().map_err(anyhow::Error::msg)?;
    let mut logging = LoggingOptions::console(config.logging.level.clone()).with_format(format);
    if let Some(dir) = &args.log_dir {
        logging = logging.with_log_dir(dir);
    } else if config.logging.file_logging {
        logging = logging.with_log_dir(&config.logging.log_dir);
    }
    let _logging_guard = init_logging(&debug_flags, &logging).context("Failed to initialize logging")?;

    info!(
        "MS-FAST inference engine v{} ({} images)",
        env!("CARGO_PKG_VERSION"),
        args.images.len()
    );

    let mut classifier = Classifier::from_config(&config).context("Failed to build network")?;
    let preprocessor = ImagePreprocessor::for_model(classifier.network().config())?;
    info!(
        "Input {}x{}, {} classes, alpha {:.4}",
        preprocessor.size().0,
        preprocessor.size().1,
        classifier.network().output_dim(),
        classifier.network().alpha()
    );

    let batch = preprocessor.load_batch(&args.images)?;
    let top_k = config.runtime.top_k.min(classifier.network().output_dim());
    let predictions = classifier.classify(&batch, top_k)?;

    for (path, ranked) in args.images.iter().zip(&predictions) {
        println!("{}", path.display());
        for (rank, prediction) in ranked.iter().enumerate() {
            println!(
                "  #{:<2} class {:>4}  p={:.4}  logit={:+.4}",
                rank + 1,
                prediction.class_index,
                prediction.probability,
                prediction.logit
            );
        }
    }

    Ok(())
}
