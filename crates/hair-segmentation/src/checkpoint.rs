use std::path::{Path, PathBuf};
use burn::module::Module;
use burn::prelude::{Backend, Device};
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{config_from_file, LoadArgs, PyTorchFileRecorder};
use log::{debug, warn};
use serde::Deserialize;
use crate::error::EvalError;
use crate::model::hairnet::HairNetRecord;
use crate::model::{HairNet, HairNetConfig};

/// Training progress stored next to the parameters.
#[derive(Debug, Deserialize)]
struct CheckpointMeta {
	epoch: Option<usize>,
}

pub struct Checkpoint<B: Backend> {
	pub path: PathBuf,
	pub record: HairNetRecord<B>,
	pub epoch: Option<usize>,
}

impl<B: Backend> Checkpoint<B> {
	/// Fails with [EvalError::MissingCheckpoint] before touching anything else.
	pub fn ensure_exists<P: AsRef<Path>>(path: P) -> Result<PathBuf, EvalError> {
		let path = path.as_ref();
		if !path.exists() {
			return Err(EvalError::MissingCheckpoint(path.to_path_buf()));
		}
		Ok(path.to_path_buf())
	}

	/// Reads a `torch.save({"state_dict": ..., "epoch": ...})` bundle onto `device`.
	pub fn load<P: AsRef<Path>>(path: P, device: &Device<B>) -> Result<Self, EvalError> {
		let path = Self::ensure_exists(path)?;

		let load_args = LoadArgs::new(path.clone())
			.with_top_level_key("state_dict")
			// Saved from a data parallel wrapper: module.* -> *
			.with_key_remap("^module\\.(.+)", "$1")
			// Map *.downsample.0.* -> *.downsample.conv.*
			.with_key_remap("(.+)\\.downsample\\.0\\.(.+)", "$1.downsample.conv.$2")
			// Map *.downsample.1.* -> *.downsample.bn.*
			.with_key_remap("(.+)\\.downsample\\.1\\.(.+)", "$1.downsample.bn.$2")
			// Map layer[i].[j].* -> layer[i].blocks.[j].*
			.with_key_remap("(layer[1-4])\\.([0-9]+)\\.(.+)", "$1.blocks.$2.$3");
		let record = PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

		let epoch = match config_from_file::<CheckpointMeta, _>(&path, None) {
			Ok(CheckpointMeta { epoch: Some(epoch) }) => Some(epoch),
			Ok(CheckpointMeta { epoch: None }) => {
				warn!("{} has no epoch entry", path.display());
				None
			}
			Err(err) => {
				warn!("Could not read the epoch of {}: {:?}", path.display(), err);
				None
			}
		};

		Ok(Self { path, record, epoch })
	}

	/// Fresh network with the checkpoint parameters, placed on `device`.
	pub fn into_model(self, config: &HairNetConfig, device: &Device<B>) -> HairNet<B> {
		debug!("Building network from {}", self.path.display());
		config.init::<B>(device).load_record(self.record)
	}
}
