use std::path::PathBuf;
use clap::Parser;
use crate::config::RunConfig;

/// Hair segmentation evaluation
#[derive(Parser, Debug)]
#[command(name = "hair-segmentation", about = "Evaluate a hair segmentation checkpoint on the test split")]
pub struct EvalArgs {
	/// Evaluate name, the output directory becomes evaluate_<name>
	pub evaluate_name: String,

	/// Model name, loads logs/<model_name>/checkpoint.pth
	#[arg(long = "model_name")]
	pub model_name: String,

	/// Batch size
	#[arg(long = "batch_size", value_parser = clap::value_parser!(u64).range(1..))]
	pub batch_size: u64,

	/// Save figures instead of showing them
	#[arg(long)]
	pub save: bool,

	/// GPU ids to run on, all visible GPUs when omitted
	#[arg(long = "gpu_ids", num_args = 0..)]
	pub gpu_ids: Option<Vec<usize>>,

	/// Root of the test split (images/ and labels/)
	#[arg(long = "data_dir", default_value = "data/helen/test")]
	pub data_dir: PathBuf,
}

impl From<EvalArgs> for RunConfig {
	fn from(args: EvalArgs) -> Self {
		Self {
			evaluate_name: args.evaluate_name,
			model_name: args.model_name,
			batch_size: args.batch_size as usize,
			save: args.save,
			gpu_ids: args.gpu_ids.filter(|ids| !ids.is_empty()),
			data_dir: args.data_dir,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(args: &[&str]) -> Result<RunConfig, clap::Error> {
		EvalArgs::try_parse_from(args).map(RunConfig::from)
	}

	#[test]
	fn parses_full_command_line() {
		let config = parse(&[
			"hair-segmentation",
			"helen",
			"--model_name",
			"dfn",
			"--batch_size",
			"8",
			"--save",
			"--gpu_ids",
			"2",
			"3",
		])
		.unwrap();

		assert_eq!(config.evaluate_name, "helen");
		assert_eq!(config.model_name, "dfn");
		assert_eq!(config.batch_size, 8);
		assert!(config.save);
		assert_eq!(config.gpu_ids, Some(vec![2, 3]));
		assert_eq!(config.data_dir, PathBuf::from("data/helen/test"));
	}

	#[test]
	fn optional_flags_default_off() {
		let config = parse(&["hair-segmentation", "run", "--model_name", "dfn", "--batch_size", "1"]).unwrap();

		assert!(!config.save);
		assert_eq!(config.gpu_ids, None);
	}

	#[test]
	fn empty_gpu_list_means_all() {
		let config = parse(&[
			"hair-segmentation",
			"run",
			"--model_name",
			"dfn",
			"--batch_size",
			"1",
			"--gpu_ids",
		])
		.unwrap();

		assert_eq!(config.gpu_ids, None);
	}

	#[test]
	fn missing_required_fields_fail() {
		assert!(parse(&["hair-segmentation", "run", "--batch_size", "1"]).is_err());
		assert!(parse(&["hair-segmentation", "run", "--model_name", "dfn"]).is_err());
		assert!(parse(&["hair-segmentation", "--model_name", "dfn", "--batch_size", "1"]).is_err());
	}

	#[test]
	fn zero_batch_size_is_rejected() {
		assert!(parse(&["hair-segmentation", "run", "--model_name", "dfn", "--batch_size", "0"]).is_err());
	}
}
