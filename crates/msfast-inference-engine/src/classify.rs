// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Eval-mode classification and top-k ranking

use std::cmp::Ordering;

use msfast_config::MsFastConfig;
use msfast_snn_model::{Mode, MsFastNetwork};
use ndarray::{Array2, Array4, ArrayView1, Axis};
use tracing::{debug, info, warn};

use crate::error::{InferenceError, Result};

/// One ranked class for one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub probability: f32,
    pub logit: f32,
}

/// Row-wise softmax, shifted by each row's maximum.
pub fn softmax(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = logits.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// The `k` largest entries of `probabilities`, highest first. Ties keep the
/// lower class index first.
pub fn top_k(probabilities: ArrayView1<'_, f32>, logits: ArrayView1<'_, f32>, k: usize) -> Vec<Prediction> {
    let mut ranked: Vec<Prediction> = probabilities
        .iter()
        .zip(logits.iter())
        .enumerate()
        .map(|(class_index, (&probability, &logit))| Prediction {
            class_index,
            probability,
            logit,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then(a.class_index.cmp(&b.class_index))
    });
    ranked.truncate(k);
    ranked
}

/// Wraps a network for repeated eval-mode classification
pub struct Classifier {
    network: MsFastNetwork,
}

impl Classifier {
    pub fn new(network: MsFastNetwork) -> Self {
        Self { network }
    }

    /// Build the network described by `config`, restoring
    /// `runtime.checkpoint` when one is set.
    ///
    /// A checkpoint carries its own model configuration; it takes precedence
    /// over the `[model]` section.
    pub fn from_config(config: &MsFastConfig) -> Result<Self> {
        let network = match &config.runtime.checkpoint {
            Some(path) => {
                let network = MsFastNetwork::load_checkpoint(path)?;
                if network.config() != &config.model {
                    warn!(
                        target: "msfast_inference_engine",
                        "Checkpoint {} overrides the configured model section",
                        path.display()
                    );
                }
                network
            }
            None => {
                warn!(
                    target: "msfast_inference_engine",
                    "No checkpoint configured: classifying with freshly initialised parameters (seed {})",
                    config.runtime.seed
                );
                MsFastNetwork::from_config(config)?
            }
        };
        Ok(Self::new(network))
    }

    pub fn network(&self) -> &MsFastNetwork {
        &self.network
    }

    /// Raw eval-mode logits `(B, num_classes)`.
    pub fn logits(&mut self, batch: &Array4<f32>) -> Result<Array2<f32>> {
        if batch.dim().0 == 0 {
            return Err(InferenceError::EmptyBatch);
        }
        let logits = self.network.forward(batch, Mode::Eval)?;
        debug!(target: "msfast_inference_engine", "Logits {:?}", logits.dim());
        Ok(logits)
    }

    /// Top-`k` predictions per image.
    pub fn classify(&mut self, batch: &Array4<f32>, k: usize) -> Result<Vec<Vec<Prediction>>> {
        let available = self.network.output_dim();
        if k == 0 || k > available {
            return Err(InferenceError::InvalidTopK { requested: k, available });
        }
        let logits = self.logits(batch)?;
        let probabilities = softmax(&logits);
        let ranked: Vec<Vec<Prediction>> = probabilities
            .axis_iter(Axis(0))
            .zip(logits.axis_iter(Axis(0)))
            .map(|(p, l)| top_k(p, l, k))
            .collect();
        info!(
            target: "msfast_inference_engine",
            "Classified {} images (alpha {:.4})",
            ranked.len(),
            self.network.alpha()
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msfast_config::ModelConfig;
    use msfast_snn_model::AlphaSchedule;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let logits = array![[1.0f32, 2.0, 3.0], [1000.0, 1000.0, -1000.0]];
        let p = softmax(&logits);
        for row in p.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((p[[1, 0]] - 0.5).abs() < 1e-6);
        assert!(p[[0, 2]] > p[[0, 1]] && p[[0, 1]] > p[[0, 0]]);
    }

    #[test]
    fn test_top_k_order_and_ties() {
        let logits = array![0.0f32, 2.0, 2.0, -1.0];
        let p = softmax(&logits.clone().insert_axis(Axis(0)));
        let ranked = top_k(p.row(0), logits.view(), 3);
        let classes: Vec<usize> = ranked.iter().map(|p| p.class_index).collect();
        assert_eq!(classes, vec![1, 2, 0]);
        assert_eq!(ranked[0].logit, 2.0);
    }

    #[test]
    fn test_classify_rejects_bad_k() {
        let config = ModelConfig {
            num_classes: 4,
            ..ModelConfig::tiny()
        };
        let network = MsFastNetwork::new(&config, AlphaSchedule::default(), 0).unwrap();
        let mut classifier = Classifier::new(network);
        let batch = Array4::<f32>::zeros((1, 3, 32, 32));
        assert!(matches!(
            classifier.classify(&batch, 5),
            Err(InferenceError::InvalidTopK { requested: 5, available: 4 })
        ));
        assert!(classifier.classify(&batch, 0).is_err());
        assert_eq!(classifier.classify(&batch, 4).unwrap()[0].len(), 4);
    }

    #[test]
    fn test_from_config_prefers_checkpoint_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        let saved = ModelConfig {
            num_classes: 6,
            ..ModelConfig::tiny()
        };
        MsFastNetwork::new(&saved, AlphaSchedule::default(), 1)
            .unwrap()
            .save_checkpoint(&path)
            .unwrap();

        let mut config = MsFastConfig::default();
        config.runtime.checkpoint = Some(path);
        let classifier = Classifier::from_config(&config).unwrap();
        assert_eq!(classifier.network().config(), &saved);
        assert_eq!(classifier.network().output_dim(), 6);
    }
}
