use std::path::PathBuf;
use std::process::ExitCode;
use burn::record::RecorderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
	#[error("model path {} does not exist", .0.display())]
	MissingCheckpoint(PathBuf),
	#[error("Failed to load checkpoint: {0}")]
	Checkpoint(#[from] RecorderError),
	#[error("Std IO error: {0}")]
	StdIoError(#[from] std::io::Error),
	#[error("Image error: {0}")]
	ImageError(#[from] image::ImageError),
	#[error("Missing label mask for {}", .0.display())]
	MissingLabels(PathBuf),
	#[error("Sample '{name}' is {width}x{height}, expected {expected}x{expected}")]
	InvalidSampleSize {
		name: String,
		width: u32,
		height: u32,
		expected: usize,
	},
	#[error("Unknown sample id {0}")]
	UnknownSample(usize),
	#[error("Display error: {0}")]
	Display(String),
}

impl EvalError {
	/// A missing checkpoint is the one failure with a dedicated status.
	pub fn exit_code(&self) -> ExitCode {
		match self {
			EvalError::MissingCheckpoint(_) => ExitCode::from(1),
			_ => ExitCode::from(2),
		}
	}
}
