use std::fmt;
use std::time::Instant;
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::Backend;
use log::{debug, info};
use rayon::prelude::*;
use crate::config::EvaluationConfig;
use crate::data::{BatchAssembler, SegmentationBatcher, SegmentationItem};
use crate::dataset::SegmentationSource;
use crate::error::EvalError;
use crate::metrics::{AccuracyScore, AverageMeter};
use crate::model::SegmentationModel;
use crate::visualize::{Figure, VisualizationSink};

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
	pub samples: usize,
	pub flushes: usize,
	/// F1 of the first class over every evaluated pixel.
	pub f1: f64,
	pub scores: AccuracyScore,
	pub batch_time: AverageMeter,
}

impl fmt::Display for EvaluationSummary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Validation: [{}]\tTime {:.3} ({:.3})\tAcc of f-score [{:.4}]",
			self.samples,
			self.batch_time.val,
			self.batch_time.avg(),
			self.f1
		)
	}
}

pub struct Evaluator<'a, B: Backend, M> {
	model: &'a M,
	batcher: SegmentationBatcher<B>,
	config: &'a EvaluationConfig,
}

impl<'a, B: Backend, M: SegmentationModel<B>> Evaluator<'a, B, M> {
	pub fn new(model: &'a M, config: &'a EvaluationConfig, device: B::Device) -> Self {
		let batcher = SegmentationBatcher::new(device, config.image_size, config.mean, config.std);
		Self { model, batcher, config }
	}

	/// Runs every sample of `source` through the model, in source order, and
	/// hands one figure per sample to `sink`.
	pub fn run<D, S>(&self, source: &D, sink: &mut S) -> Result<EvaluationSummary, EvalError>
	where
		D: SegmentationSource + ?Sized,
		S: VisualizationSink + ?Sized,
	{
		let ids = source.image_ids();
		let total = ids.len();
		info!("Evaluating {total} samples with batch size {}", self.config.batch_size);

		let mut assembler = BatchAssembler::new(self.config.batch_size);
		let mut scores = AccuracyScore::new(&self.config.classes);
		let mut batch_time = AverageMeter::default();
		let mut flushes = 0;
		let mut end = Instant::now();

		for (idx, id) in ids.into_iter().enumerate() {
			let item = source.load_item(id, self.config.image_size)?;

			let Some(items) = assembler.push(item, idx + 1 == total) else {
				continue;
			};

			self.flush(items, &mut scores, sink)?;
			flushes += 1;

			batch_time.update(end.elapsed());
			end = Instant::now();
			debug!("Batch {flushes} took {:.3}s", batch_time.val);
		}

		let f1 = self
			.config
			.classes
			.first()
			.and_then(|class| scores.f1(class))
			.unwrap_or(0.0);

		Ok(EvaluationSummary {
			samples: total,
			flushes,
			f1,
			scores,
			batch_time,
		})
	}

	fn flush<S>(&self, items: Vec<SegmentationItem>, scores: &mut AccuracyScore, sink: &mut S) -> Result<(), EvalError>
	where
		S: VisualizationSink + ?Sized,
	{
		let batch = self.batcher.batch(items);
		let [_, _, height, width] = batch.images.dims();
		let pixels = height * width;

		let prediction: Vec<i64> = self
			.model
			.predict(batch.images.clone())
			.into_data()
			.iter::<i64>()
			.collect();
		let ground_truth: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();

		scores.collect(&ground_truth, &prediction);

		let images = self.batcher.normalizer().unmold(batch.images);
		let classes = &self.config.classes;
		let alpha = self.config.overlay_alpha;

		let figures: Vec<Figure> = batch
			.names
			.into_par_iter()
			.zip(images.par_iter())
			.zip(ground_truth.par_chunks(pixels).zip(prediction.par_chunks(pixels)))
			.map(|((name, image), (gt, pred))| {
				// scored on its own so every title reflects exactly one sample
				let mut sample = AccuracyScore::new(classes);
				sample.collect(gt, pred);
				let f1 = classes.first().and_then(|class| sample.f1(class)).unwrap_or(0.0);

				Figure::render(name, f1, image, gt, pred, alpha)
			})
			.collect();

		for figure in figures {
			sink.present(figure)?;
		}

		Ok(())
	}
}
