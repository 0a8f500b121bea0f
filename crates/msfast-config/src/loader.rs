// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, MsFastConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "msfast_configuration.toml";

/// Find the MS-FAST configuration file
///
/// Search order:
/// 1. `MSFAST_CONFIG_PATH` environment variable
/// 2. Current working directory: `./msfast_configuration.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("MSFAST_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by MSFAST_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "MS-FAST configuration file '{}' not found in any of these locations:\n{}\n\nSet MSFAST_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is left to [`crate::validate_config`] so callers can report every
/// violation at once.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<MsFastConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: MsFastConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `MSFAST_EMBED_DIMS` -> `model.embed_dims`
/// - `MSFAST_NUM_HEADS` -> `model.num_heads`
/// - `MSFAST_DEPTHS` -> `model.depths`
/// - `MSFAST_TIME_STEPS` -> `model.time_steps`
/// - `MSFAST_NUM_CLASSES` -> `model.num_classes`
/// - `MSFAST_WARMUP_EPOCHS` -> `schedule.warmup_epochs`
/// - `MSFAST_SEED` -> `runtime.seed`
/// - `MSFAST_CHECKPOINT` -> `runtime.checkpoint`
/// - `MSFAST_LOG_LEVEL` -> `logging.level`
/// - `MSFAST_FILE_LOGGING` -> `logging.file_logging`
/// - `MSFAST_LOG_FORMAT` -> `logging.format`
///
/// Values that fail to parse are ignored and the file value is kept.
pub fn apply_environment_overrides(config: &mut MsFastConfig) {
    if let Some(v) = env_parsed::<usize>("MSFAST_EMBED_DIMS") {
        config.model.embed_dims = v;
    }
    if let Some(v) = env_parsed::<usize>("MSFAST_NUM_HEADS") {
        config.model.num_heads = v;
    }
    if let Some(v) = env_parsed::<usize>("MSFAST_DEPTHS") {
        config.model.depths = v;
    }
    if let Some(v) = env_parsed::<usize>("MSFAST_TIME_STEPS") {
        config.model.time_steps = v;
    }
    if let Some(v) = env_parsed::<usize>("MSFAST_NUM_CLASSES") {
        config.model.num_classes = v;
    }

    if let Some(v) = env_parsed::<u32>("MSFAST_WARMUP_EPOCHS") {
        config.schedule.warmup_epochs = v;
    }

    if let Some(v) = env_parsed::<u64>("MSFAST_SEED") {
        config.runtime.seed = v;
    }
    if let Ok(value) = env::var("MSFAST_CHECKPOINT") {
        config.runtime.checkpoint = Some(PathBuf::from(value));
    }

    if let Ok(value) = env::var("MSFAST_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("MSFAST_FILE_LOGGING") {
        config.logging.file_logging = parse_flag(&value);
    }
    if let Ok(value) = env::var("MSFAST_LOG_FORMAT") {
        config.logging.format = value;
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"preset": "tiny", "time_steps": "2"}`)
///
/// `preset` is applied first so that individual keys can refine it.
///
/// # Errors
///
/// Unlike environment overrides, CLI values are explicit user input: an
/// unparsable value or unknown preset is reported instead of ignored.
pub fn apply_cli_overrides(
    config: &mut MsFastConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(name) = cli_args.get("preset") {
        config.model = crate::ModelConfig::preset(name)?;
    }

    if let Some(value) = cli_args.get("img_size") {
        let size = cli_parsed::<usize>("img_size", value)?;
        config.model.img_size_h = size;
        config.model.img_size_w = size;
    }
    if let Some(value) = cli_args.get("embed_dims") {
        config.model.embed_dims = cli_parsed("embed_dims", value)?;
    }
    if let Some(value) = cli_args.get("num_heads") {
        config.model.num_heads = cli_parsed("num_heads", value)?;
    }
    if let Some(value) = cli_args.get("depths") {
        config.model.depths = cli_parsed("depths", value)?;
    }
    if let Some(value) = cli_args.get("time_steps") {
        config.model.time_steps = cli_parsed("time_steps", value)?;
    }
    if let Some(value) = cli_args.get("num_classes") {
        config.model.num_classes = cli_parsed("num_classes", value)?;
    }

    if let Some(value) = cli_args.get("warmup_epochs") {
        config.schedule.warmup_epochs = cli_parsed("warmup_epochs", value)?;
    }

    if let Some(value) = cli_args.get("seed") {
        config.runtime.seed = cli_parsed("seed", value)?;
    }
    if let Some(value) = cli_args.get("top_k") {
        config.runtime.top_k = cli_parsed("top_k", value)?;
    }
    if let Some(value) = cli_args.get("checkpoint") {
        config.runtime.checkpoint = Some(PathBuf::from(value));
    }

    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("log_format") {
        config.logging.format = value.clone();
    }
    if let Some(value) = cli_args.get("file_logging") {
        config.logging.file_logging = parse_flag(value);
    }

    Ok(())
}

fn cli_parsed<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("MSFAST_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("MSFAST_CONFIG_PATH");

        assert!(result.is_ok());
        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("does_not_exist.toml");

        env::set_var("MSFAST_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("MSFAST_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("MSFAST_EMBED_DIMS");
        env::remove_var("MSFAST_TIME_STEPS");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[model]").unwrap();
        writeln!(file, "embed_dims = 32").unwrap();
        writeln!(file, "time_steps = 2").unwrap();
        writeln!(file, "[schedule]").unwrap();
        writeln!(file, "warmup_epochs = 10").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.model.embed_dims, 32);
        assert_eq!(config.model.time_steps, 2);
        assert_eq!(config.schedule.warmup_epochs, 10);
        assert_eq!(config.model.num_classes, 200);
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = MsFastConfig::default();

        env::set_var("MSFAST_DEPTHS", "2");
        env::set_var("MSFAST_SEED", "7");
        env::set_var("MSFAST_TIME_STEPS", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("MSFAST_DEPTHS");
        env::remove_var("MSFAST_SEED");
        env::remove_var("MSFAST_TIME_STEPS");

        assert_eq!(config.model.depths, 2);
        assert_eq!(config.runtime.seed, 7);
        assert_eq!(config.model.time_steps, 4);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = MsFastConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("preset".to_string(), "tiny".to_string());
        cli_args.insert("time_steps".to_string(), "3".to_string());
        cli_args.insert("log_format".to_string(), "json".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.model.embed_dims, 16);
        assert_eq!(config.model.time_steps, 3);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_cli_override_rejects_garbage() {
        let mut config = MsFastConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("depths".to_string(), "four".to_string());

        let result = apply_cli_overrides(&mut config, &cli_args);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[model]").unwrap();
        writeln!(file, "depths = 6").unwrap();
        writeln!(file, "num_classes = 10").unwrap();

        env::set_var("MSFAST_DEPTHS", "3");
        env::set_var("MSFAST_NUM_CLASSES", "100");

        let mut cli_args = HashMap::new();
        cli_args.insert("depths".to_string(), "1".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("MSFAST_DEPTHS");
        env::remove_var("MSFAST_NUM_CLASSES");

        // CLI wins for depths, env wins for num_classes (no CLI override)
        assert_eq!(config.model.depths, 1);
        assert_eq!(config.model.num_classes, 100);
    }
}
