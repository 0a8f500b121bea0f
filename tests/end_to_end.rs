// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests through the `msfast` facade: configuration file to
//! network, forward passes, schedule and checkpoint reload.

use std::fs;
use std::path::PathBuf;

use msfast::prelude::*;
use msfast::tensor::{fft2_ortho, fft2_ortho_real, seeded_rng};
use ndarray::{Array4, Array5};
use rand::Rng;

fn random_images(batch: usize, h: usize, w: usize, seed: u64) -> Array4<f32> {
    let mut rng = seeded_rng(seed);
    Array4::from_shape_fn((batch, 3, h, w), |_| rng.gen_range(-1.0..1.0))
}

#[test]
fn test_shipped_configuration_describes_ms_fast() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("msfast_configuration.toml");
    let config = load_config(Some(&path), None).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.model, ModelConfig::ms_fast());
    assert_eq!(config.schedule, ScheduleConfig::default());
}

#[test]
fn test_config_file_to_logits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("msfast_configuration.toml");
    fs::write(
        &path,
        r#"
        [model]
        img_size_h = 32
        img_size_w = 64
        embed_dims = 32
        num_heads = 8
        depths = 2
        time_steps = 2
        num_classes = 10

        [runtime]
        seed = 7
        "#,
    )
    .unwrap();

    let config = load_config(Some(&path), None).unwrap();
    let mut network = MsFastNetwork::from_config(&config).unwrap();
    let images = random_images(3, 32, 64, 1);
    let (_, grid) = network
        .tokenizer()
        .clone()
        .forward(&images.broadcast((2, 3, 3, 32, 64)).unwrap().to_owned(), 1.0, Mode::Eval)
        .unwrap();
    assert_eq!(grid, (2, 4));

    for mode in [Mode::Train, Mode::Eval] {
        let logits = network.forward(&images, mode).unwrap();
        assert_eq!(logits.dim(), (3, 10));
        assert!(logits.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_training_iterations_then_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("ckpt.json");
    let config = ModelConfig {
        num_classes: 3,
        ..ModelConfig::tiny()
    };
    let mut network = MsFastNetwork::new(&config, AlphaSchedule::new(1, 1.0).unwrap(), 5).unwrap();
    let images = random_images(2, 32, 32, 2);

    // loader length 2 -> update every 2 iterations, horizon 2
    network.forward_train(&images, 2).unwrap();
    assert_eq!(network.alpha(), 1.0);
    network.forward_train(&images, 2).unwrap();
    assert_eq!(network.alpha(), 0.0);

    network.save_checkpoint(&checkpoint).unwrap();
    let restored = MsFastNetwork::load_checkpoint(&checkpoint).unwrap();
    assert_eq!(restored.alpha(), 0.0);
    assert_eq!(restored.schedule().iteration(), 2);
    assert_eq!(restored.state_dict(), network.state_dict());
}

#[test]
fn test_spiking_node_pure_spikes_are_binary() {
    let node = SpikingNode::lif();
    let input = Array5::from_shape_fn((3, 2, 2, 2, 2), |(t, b, c, h, w)| (t + b + c + h + w) as f32 * 0.6);
    let out = node.forward(&input, 0.0).unwrap();
    assert!(out.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_double_transform_is_spatial_reversal() {
    let x = Array5::from_shape_fn((1, 1, 1, 3, 4), |(_, _, _, h, w)| (h * 4 + w) as f32 + 0.5 * (h * w) as f32);
    let (re, im) = fft2_ortho(&x).unwrap();
    assert_eq!(fft2_ortho(&x).unwrap(), (re.clone(), im.clone()));

    // real part of F(re + i·im)
    let twice = fft2_ortho_real(&re).unwrap() - &fft2_ortho(&im).unwrap().1;
    let (h, w) = (3, 4);
    for i in 0..h {
        for j in 0..w {
            let expected = x[[0, 0, 0, (h - i) % h, (w - j) % w]];
            assert!((twice[[0, 0, 0, i, j]] - expected).abs() < 1e-4);
        }
    }
}
