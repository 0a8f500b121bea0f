// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Checkpoint persistence
//!
//! A checkpoint holds the model configuration, the alpha schedule and every
//! named tensor (learnable parameters and batch-norm running statistics),
//! serialised as JSON. Loading checks that the tensor names and shapes match
//! the network exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::ArrayViewD;
use msfast_config::ModelConfig;
use msfast_snn_tensor::{Parameterized, TensorError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ModelError, Result};
use crate::network::MsFastNetwork;
use crate::schedule::AlphaSchedule;

/// Bumped whenever the on-disk layout changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Ordered map from qualified tensor name to its contents
pub type StateDict = BTreeMap<String, StoredTensor>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub model: ModelConfig,
    pub schedule: AlphaSchedule,
    pub tensors: StateDict,
}

impl MsFastNetwork {
    /// Snapshot of every named tensor.
    pub fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        self.visit_tensors("", &mut |name, _, tensor| {
            state.insert(
                name.to_string(),
                StoredTensor {
                    shape: tensor.shape().to_vec(),
                    data: tensor.iter().copied().collect(),
                },
            );
        });
        state
    }

    /// Overwrite every named tensor from `state`.
    ///
    /// Fails on missing names, unexpected names or shape mismatches. Tensors
    /// are validated before anything is written.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let mut expected = BTreeSet::new();
        let mut problems = Vec::new();
        self.visit_tensors("", &mut |name, _, tensor| {
            expected.insert(name.to_string());
            match state.get(name) {
                None => problems.push(format!("missing tensor {name}")),
                Some(stored) if stored.shape != tensor.shape() => problems.push(format!(
                    "tensor {name}: expected shape {:?}, found {:?}",
                    tensor.shape(),
                    stored.shape
                )),
                Some(stored) if stored.data.len() != tensor.len() => problems.push(format!(
                    "tensor {name}: {} values for shape {:?}",
                    stored.data.len(),
                    stored.shape
                )),
                Some(_) => {}
            }
        });
        problems.extend(
            state
                .keys()
                .filter(|name| !expected.contains(*name))
                .map(|name| format!("unexpected tensor {name}")),
        );
        if !problems.is_empty() {
            return Err(ModelError::Checkpoint(problems.join("; ")));
        }

        self.visit_tensors_mut("", &mut |name, _, mut tensor| {
            let stored = state
                .get(name)
                .ok_or_else(|| TensorError::InvalidConfig(format!("missing tensor {name}")))?;
            let source = ArrayViewD::from_shape(stored.shape.as_slice(), &stored.data)?;
            tensor.assign(&source);
            Ok(())
        })?;
        Ok(())
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            format_version: CHECKPOINT_FORMAT_VERSION,
            model: self.config().clone(),
            schedule: self.schedule().clone(),
            tensors: self.state_dict(),
        }
    }

    /// Restore tensors and schedule. The checkpoint must describe the same
    /// architecture as this network.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(ModelError::Checkpoint(format!(
                "unsupported checkpoint format {} (expected {})",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        if &checkpoint.model != self.config() {
            return Err(ModelError::Checkpoint(
                "checkpoint was saved from a different model configuration".into(),
            ));
        }
        checkpoint
            .schedule
            .validate()
            .map_err(|e| ModelError::Checkpoint(format!("invalid alpha schedule: {e}")))?;
        self.load_state_dict(&checkpoint.tensors)?;
        self.set_schedule(checkpoint.schedule.clone());
        Ok(())
    }

    pub fn save_checkpoint(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &self.checkpoint())?;
        info!(target: "msfast_snn_model", "Saved checkpoint to {}", path.display());
        Ok(())
    }

    /// Rebuild a network from a checkpoint file, using the configuration
    /// stored inside it.
    pub fn load_checkpoint(path: &Path) -> Result<Self> {
        let checkpoint = read_checkpoint(path)?;
        let mut network = MsFastNetwork::new(&checkpoint.model, AlphaSchedule::default(), 0)?;
        network.restore(&checkpoint)?;
        info!(
            target: "msfast_snn_model",
            "Loaded checkpoint {} (iteration {}, alpha {:.4})",
            path.display(),
            network.schedule().iteration(),
            network.alpha()
        );
        Ok(network)
    }
}

pub fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msfast_snn_tensor::TensorKind;

    fn tiny(seed: u64) -> MsFastNetwork {
        MsFastNetwork::new(&ModelConfig::tiny(), AlphaSchedule::default(), seed).unwrap()
    }

    #[test]
    fn test_state_dict_contains_buffers_and_parameters() {
        let network = tiny(0);
        let state = network.state_dict();
        assert!(state.contains_key("patch_embed.proj_conv.weight"));
        assert!(state.contains_key("block.0.attn.w1"));
        assert!(state.contains_key("block.0.mlp.mlp1_bn.running_mean"));
        assert!(state.contains_key("head.bias"));

        let mut buffers = 0;
        network.visit_tensors("", &mut |_, kind, t| {
            if kind == TensorKind::Buffer {
                buffers += t.len();
            }
        });
        let total: usize = state.values().map(|t| t.data.len()).sum();
        assert_eq!(total, network.num_parameters() + buffers);
    }

    #[test]
    fn test_load_state_dict_copies_values() {
        let source = tiny(1);
        let mut target = tiny(2);
        assert_ne!(source.state_dict(), target.state_dict());
        target.load_state_dict(&source.state_dict()).unwrap();
        assert_eq!(source.state_dict(), target.state_dict());
    }

    #[test]
    fn test_load_state_dict_rejects_bad_input_without_writing() {
        let mut target = tiny(2);
        let before = target.state_dict();

        let mut state = tiny(1).state_dict();
        state.insert("bogus.weight".into(), StoredTensor { shape: vec![1], data: vec![0.0] });
        assert!(matches!(target.load_state_dict(&state), Err(ModelError::Checkpoint(_))));

        let mut state = tiny(1).state_dict();
        if let Some(t) = state.get_mut("head.weight") {
            t.shape = vec![t.data.len()];
        }
        assert!(target.load_state_dict(&state).is_err());

        let mut state = tiny(1).state_dict();
        state.remove("head.bias");
        assert!(target.load_state_dict(&state).is_err());

        assert_eq!(target.state_dict(), before);
    }

    #[test]
    fn test_restore_rejects_invalid_schedule() {
        let mut network = tiny(0);
        let before = network.state_dict();

        let mut checkpoint = tiny(1).checkpoint();
        checkpoint.schedule =
            serde_json::from_str(r#"{"iteration":4,"alpha":-0.5,"warmup_epochs":2}"#).unwrap();
        assert!(matches!(network.restore(&checkpoint), Err(ModelError::Checkpoint(_))));

        checkpoint.schedule =
            serde_json::from_str(r#"{"iteration":4,"alpha":0.5,"warmup_epochs":0}"#).unwrap();
        assert!(matches!(network.restore(&checkpoint), Err(ModelError::Checkpoint(_))));

        // nothing was written
        assert_eq!(network.state_dict(), before);
        assert_eq!(network.schedule(), &AlphaSchedule::default());
    }

    #[test]
    fn test_load_checkpoint_file_with_invalid_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut checkpoint = tiny(3).checkpoint();
        checkpoint.schedule =
            serde_json::from_str(r#"{"iteration":0,"alpha":2.0,"warmup_epochs":5}"#).unwrap();
        std::fs::write(&path, serde_json::to_string(&checkpoint).unwrap()).unwrap();

        assert!(matches!(
            MsFastNetwork::load_checkpoint(&path),
            Err(ModelError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_restore_rejects_other_architecture() {
        let other = MsFastNetwork::new(
            &ModelConfig {
                num_classes: 7,
                ..ModelConfig::tiny()
            },
            AlphaSchedule::default(),
            0,
        )
        .unwrap();
        let mut network = tiny(0);
        assert!(matches!(
            network.restore(&other.checkpoint()),
            Err(ModelError::Checkpoint(_))
        ));
    }
}
