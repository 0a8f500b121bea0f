// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Alpha schedule preview.
//!
//! Replays the alpha annealing schedule for a given loader length and prints
//! every iteration at which alpha changes, up to and including the first one
//! at which it reaches zero.

use std::env;
use std::path::PathBuf;
use std::process;

use msfast::config::{load_config, MsFastConfig, ScheduleConfig};
use msfast::model::AlphaSchedule;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: schedule_preview [--config <path>] [--loader-length <n>] [--warmup-epochs <n>] [--every <n>]\n\n\
         Defaults come from the [schedule] section of the configuration\n\
         (or the built-in defaults when no file is given).\n\
         --every prints only every n-th update.\n"
    );
    process::exit(2);
}

struct Options {
    config: Option<PathBuf>,
    loader_length: Option<u64>,
    warmup_epochs: Option<u32>,
    every: usize,
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: Option<String>) -> T {
    let value = value.unwrap_or_else(|| usage_and_exit());
    value.parse().unwrap_or_else(|_| {
        eprintln!("Invalid value for {flag}: {value}");
        usage_and_exit();
    })
}

fn parse_args() -> Options {
    let mut options = Options {
        config: None,
        loader_length: None,
        warmup_epochs: None,
        every: 1,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                options.config = Some(PathBuf::from(v));
            }
            "--loader-length" => options.loader_length = Some(parse_number(&arg, args.next())),
            "--warmup-epochs" => options.warmup_epochs = Some(parse_number(&arg, args.next())),
            "--every" => options.every = parse_number::<usize>(&arg, args.next()).max(1),
            "-h" | "--help" => usage_and_exit(),
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    options
}

fn schedule_config(options: &Options) -> ScheduleConfig {
    let mut schedule = match &options.config {
        Some(path) => load_config(Some(path), None)
            .unwrap_or_else(|e| {
                eprintln!("Failed to load {}: {e}", path.display());
                process::exit(2);
            })
            .schedule,
        None => MsFastConfig::default().schedule,
    };
    if let Some(warmup) = options.warmup_epochs {
        schedule.warmup_epochs = warmup;
    }
    if let Some(length) = options.loader_length {
        schedule.loader_length = length as usize;
    }
    schedule
}

fn main() {
    let options = parse_args();
    let config = schedule_config(&options);
    let loader_length = config.loader_length as u64;
    if loader_length == 0 {
        eprintln!("loader length must be greater than zero");
        process::exit(2);
    }

    let mut schedule = AlphaSchedule::from_config(&config).unwrap_or_else(|e| {
        eprintln!("Invalid schedule: {e}");
        process::exit(2);
    });
    let horizon = schedule.horizon(loader_length);

    println!(
        "warmup_epochs={} loader_length={} horizon={} initial_alpha={:.4}",
        config.warmup_epochs,
        loader_length,
        horizon,
        schedule.alpha()
    );
    println!("{:>10}  {:>8}  {:>10}", "iteration", "epoch", "alpha");

    let mut updates = 0usize;
    loop {
        let update = schedule.advance(loader_length).unwrap_or_else(|e| {
            eprintln!("Schedule failed: {e}");
            process::exit(1);
        });
        let Some(alpha) = update else { continue };

        let reached_zero = alpha == 0.0;
        if updates % options.every == 0 || reached_zero {
            println!(
                "{:>10}  {:>8.2}  {:>10.6}",
                schedule.iteration(),
                schedule.iteration() as f64 / loader_length as f64,
                alpha
            );
        }
        updates += 1;
        if reached_zero {
            break;
        }
    }
}
