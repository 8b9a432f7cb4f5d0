use burn::prelude::{Backend, Int, Tensor};

pub mod backbone;
pub mod block;
pub mod hairnet;
pub mod parallel;

pub use hairnet::{HairNet, HairNetConfig};
pub use parallel::ReplicatedModel;

/// Anything that scores every pixel of a normalized, channel first batch.
pub trait SegmentationModel<B: Backend> {
	/// [N, 3, H, W] -> [N, num_classes, H, W]
	fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;

	/// Most likely class per pixel, [N, H, W].
	fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 3, Int> {
		self.forward(images).argmax(1).squeeze(1)
	}
}

#[cfg(test)]
pub(crate) fn tiny_config() -> HairNetConfig {
	use backbone::ResNetBackboneConfig;

	HairNetConfig::new().with_decoder_channels(4).with_backbone(
		ResNetBackboneConfig::new()
			.with_blocks([1, 1, 1, 1])
			.with_expansion(1)
			.with_base_channels(4),
	)
}
