use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::Relu;
use burn::prelude::{Backend, Config, Device, Tensor};
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use crate::model::backbone::{ResNetBackbone, ResNetBackboneConfig};
use crate::model::block::{
	ChannelAttentionBlock, ChannelAttentionBlockConfig, RefineResidualBlock, RefineResidualBlockConfig,
};
use crate::model::SegmentationModel;

/// Smooth path of the discriminative feature network, inference only.
#[derive(Debug, Module)]
pub struct HairNet<B: Backend> {
	backbone: ResNetBackbone<B>,
	global_pool: AdaptiveAvgPool2d,
	global_conv: Conv2d<B>,
	relu: Relu,
	/// Deepest stage first.
	smooth: Vec<SmoothStage<B>>,
	classifier: Conv2d<B>,
}

#[derive(Debug, Module)]
pub struct SmoothStage<B: Backend> {
	rrb_in: RefineResidualBlock<B>,
	cab: ChannelAttentionBlock<B>,
	rrb_out: RefineResidualBlock<B>,
}

impl<B: Backend> SmoothStage<B> {
	fn forward(&self, stage: Tensor<B, 4>, higher: Tensor<B, 4>) -> Tensor<B, 4> {
		let low = self.rrb_in.forward(stage);
		let x = self.cab.forward(low, higher);
		self.rrb_out.forward(x)
	}
}

fn resize<B: Backend>(x: Tensor<B, 4>, size: [usize; 2], mode: InterpolateMode) -> Tensor<B, 4> {
	let [_, _, h, w] = x.dims();
	if [h, w] == size {
		return x;
	}
	interpolate(x, size, InterpolateOptions::new(mode))
}

impl<B: Backend> HairNet<B> {
	/// [N, 3, H, W] -> per class scores [N, num_classes, H, W].
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let [_, _, height, width] = input.dims();
		let stages = self.backbone.forward(input);

		let [_, _, h4, w4] = stages[3].dims();
		let global = self.global_pool.forward(stages[3].clone());
		let global = self.relu.forward(self.global_conv.forward(global));
		let mut x = resize(global, [h4, w4], InterpolateMode::Nearest);

		for (smooth, stage) in self.smooth.iter().zip(stages.into_iter().rev()) {
			let [_, _, h, w] = stage.dims();
			let higher = resize(x, [h, w], InterpolateMode::Bilinear);
			x = smooth.forward(stage, higher);
		}

		let logits = self.classifier.forward(x);
		resize(logits, [height, width], InterpolateMode::Bilinear)
	}
}

impl<B: Backend> SegmentationModel<B> for HairNet<B> {
	fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
		HairNet::forward(self, images)
	}
}

#[derive(Config, Debug)]
pub struct HairNetConfig {
	#[config(default = 2)]
	pub num_classes: usize,
	#[config(default = 512)]
	pub decoder_channels: usize,
	#[config(default = "ResNetBackboneConfig::new()")]
	pub backbone: ResNetBackboneConfig,
}

impl HairNetConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> HairNet<B> {
		let channels = self.backbone.stage_channels();
		let mid = self.decoder_channels;

		let smooth = channels
			.iter()
			.rev()
			.map(|&stage_channels| SmoothStage {
				rrb_in: RefineResidualBlockConfig::new(stage_channels, mid).init(device),
				cab: ChannelAttentionBlockConfig::new(mid).init(device),
				rrb_out: RefineResidualBlockConfig::new(mid, mid).init(device),
			})
			.collect();

		HairNet {
			backbone: self.backbone.init(device),
			global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
			global_conv: Conv2dConfig::new([channels[3], mid], [1, 1]).init(device),
			relu: Relu::new(),
			smooth,
			classifier: Conv2dConfig::new([mid, self.num_classes], [1, 1]).init(device),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::NdArray;
	use burn::tensor::Distribution;

	use crate::model::tiny_config;

	type TestBackend = NdArray;

	#[test]
	fn scores_every_input_pixel() {
		let device = Default::default();
		let model: HairNet<TestBackend> = tiny_config().init(&device);

		let input = Tensor::<TestBackend, 4>::random([2, 3, 64, 64], Distribution::Default, &device);
		let output = model.forward(input);

		assert_eq!(output.dims(), [2, 2, 64, 64]);
	}

	#[test]
	fn handles_sizes_not_divisible_by_stride() {
		let device = Default::default();
		let model: HairNet<TestBackend> = tiny_config().with_num_classes(3).init(&device);

		let input = Tensor::<TestBackend, 4>::zeros([1, 3, 40, 40], &device);

		assert_eq!(model.forward(input).dims(), [1, 3, 40, 40]);
	}

	#[test]
	fn resnet101_layout_scores_every_input_pixel() {
		let device = Default::default();
		let config = HairNetConfig::new()
			.with_decoder_channels(8)
			.with_backbone(ResNetBackboneConfig::new().with_blocks([1, 1, 1, 1]));
		let model: HairNet<TestBackend> = config.init(&device);

		let input = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);

		assert_eq!(model.forward(input).dims(), [1, 2, 64, 64]);
	}
}
