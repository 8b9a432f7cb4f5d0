use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use log::debug;
use crate::model::SegmentationModel;

/// One copy of a model per device. A batch is split along its first dimension,
/// each chunk runs on its own replica and the scores are gathered on the
/// primary (first) device.
#[derive(Debug)]
pub struct ReplicatedModel<B: Backend, M> {
	replicas: Vec<(B::Device, M)>,
}

impl<B: Backend, M: Module<B>> ReplicatedModel<B, M> {
	pub fn new(model: M, devices: &[B::Device]) -> Self {
		assert!(!devices.is_empty(), "at least one device is required");

		let replicas = devices
			.iter()
			.map(|device| (device.clone(), model.clone().fork(device)))
			.collect();

		Self { replicas }
	}

	pub fn primary_device(&self) -> &B::Device {
		&self.replicas[0].0
	}

	pub fn num_replicas(&self) -> usize {
		self.replicas.len()
	}
}

impl<B: Backend, M: Module<B> + SegmentationModel<B>> SegmentationModel<B> for ReplicatedModel<B, M> {
	fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
		let primary = self.primary_device().clone();
		let [batch_size, ..] = images.dims();

		if self.replicas.len() == 1 || batch_size == 1 {
			let (device, model) = &self.replicas[0];
			return model.forward(images.to_device(device)).to_device(&primary);
		}

		let chunks = images.chunk(self.replicas.len().min(batch_size), 0);
		debug!("Scattering batch of {batch_size} over {} replicas", chunks.len());

		let outputs = chunks
			.into_iter()
			.zip(&self.replicas)
			.map(|(chunk, (device, model))| model.forward(chunk.to_device(device)).to_device(&primary))
			.collect();

		Tensor::cat(outputs, 0)
	}
}
