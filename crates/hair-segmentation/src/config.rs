use std::path::{Path, PathBuf};
use burn::config::Config;
use crate::data::{IMAGENET_MEAN, IMAGENET_STD};

pub const LOGS_DIR: &str = "logs";
pub const CHECKPOINT_FILE: &str = "checkpoint.pth";

#[derive(Config, Debug)]
pub struct EvaluationConfig {
	pub batch_size: usize,
	#[config(default = 512)]
	pub image_size: usize,
	#[config(default = "IMAGENET_MEAN")]
	pub mean: [f32; 3],
	#[config(default = "IMAGENET_STD")]
	pub std: [f32; 3],
	#[config(default = "vec![\"hair\".to_string()]")]
	pub classes: Vec<String>,
	#[config(default = 0.5)]
	pub overlay_alpha: f32,
}

/// Everything one evaluation run needs, built once from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
	pub evaluate_name: String,
	pub model_name: String,
	pub batch_size: usize,
	pub save: bool,
	pub gpu_ids: Option<Vec<usize>>,
	pub data_dir: PathBuf,
}

impl RunConfig {
	pub fn save_dir(&self) -> PathBuf {
		PathBuf::from(format!("evaluate_{}", self.evaluate_name))
	}

	pub fn checkpoint_path(&self) -> PathBuf {
		checkpoint_path(LOGS_DIR, &self.model_name)
	}

	pub fn evaluation(&self) -> EvaluationConfig {
		EvaluationConfig::new(self.batch_size)
	}
}

pub fn checkpoint_path<P: AsRef<Path>>(logs_dir: P, model_name: &str) -> PathBuf {
	logs_dir.as_ref().join(model_name).join(CHECKPOINT_FILE)
}
