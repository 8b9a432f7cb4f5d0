use std::process::ExitCode;
use burn::config::Config;
use burn_tch::{LibTorch, LibTorchDevice};
use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use crate::args::EvalArgs;
use crate::checkpoint::Checkpoint;
use crate::config::RunConfig;
use crate::dataset::HelenDataset;
use crate::device::DeviceSelection;
use crate::error::EvalError;
use crate::eval::{EvaluationSummary, Evaluator};
use crate::model::{HairNetConfig, ReplicatedModel};
use crate::visualize::create_sink;

mod args;
mod checkpoint;
mod config;
mod data;
mod dataset;
mod device;
mod error;
mod eval;
mod metrics;
mod model;
mod visualize;

// No autodiff wrapper, so nothing records gradients during evaluation.
type EvalBackend = LibTorch<f32>;

fn main() -> ExitCode {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .ok();

    let config = RunConfig::from(EvalArgs::parse());

    match evaluate(&config) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            match &err {
                // printed regardless of the log level
                EvalError::MissingCheckpoint(path) => {
                    eprintln!("=> no checkpoint found at '{}'", path.display())
                }
                _ => error!("{err}"),
            }
            err.exit_code()
        }
    }
}

fn evaluate(config: &RunConfig) -> Result<EvaluationSummary, EvalError> {
    let devices = DeviceSelection::detect(config.gpu_ids.as_deref());

    let save_dir = config.save_dir();
    std::fs::create_dir_all(&save_dir)?;

    let model_path = Checkpoint::<EvalBackend>::ensure_exists(config.checkpoint_path())?;

    // Deserialize on the CPU first, then replicate onto the selected devices
    println!("=> loading checkpoint '{}'", model_path.display());
    let checkpoint = Checkpoint::<EvalBackend>::load(&model_path, &LibTorchDevice::Cpu)?;
    let epoch = checkpoint
        .epoch
        .map_or_else(|| "unknown".to_string(), |epoch| epoch.to_string());
    let model = checkpoint.into_model(&HairNetConfig::new(), &LibTorchDevice::Cpu);
    let model = ReplicatedModel::<EvalBackend, _>::new(model, &devices.devices);
    info!("Model replicated on {} device(s)", model.num_replicas());
    println!("=> loaded checkpoint '{}' (epoch {})", model_path.display(), epoch);

    let evaluation = config.evaluation();
    evaluation.save(save_dir.join("config.json"))?;

    let dataset = HelenDataset::new(&config.data_dir, evaluation.image_size)?;
    let mut sink = create_sink(config.save, &save_dir)?;

    let time = std::time::Instant::now();
    let summary = Evaluator::<EvalBackend, _>::new(&model, &evaluation, devices.primary)
        .run(&dataset, sink.as_mut())?;
    info!("Evaluated {} samples in {:.3}s", summary.samples, time.elapsed().as_secs_f64());

    for (class, f1) in summary.scores.f1_results() {
        if let Some(counts) = summary.scores.counts(&class) {
            info!(
                "{class}: precision {:.4} recall {:.4} f1 {:.4}",
                counts.precision(),
                counts.recall(),
                f1
            );
        }
    }

    Ok(summary)
}
