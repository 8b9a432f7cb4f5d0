use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Device, Module, Tensor};
use crate::model::block::{conv, LayerBlock, LayerBlockConfig};

pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];

/// ResNet without its classification head, returning the output of every stage.
#[derive(Debug, Module)]
pub struct ResNetBackbone<B: Backend> {
	conv1: Conv2d<B>,
	bn1: BatchNorm<B, 2>,
	relu: Relu,
	maxpool: MaxPool2d,
	layer1: LayerBlock<B>,
	layer2: LayerBlock<B>,
	layer3: LayerBlock<B>,
	layer4: LayerBlock<B>,
}

impl<B: Backend> ResNetBackbone<B> {
	/// Stage outputs at strides 4, 8, 16 and 32.
	pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 4] {
		let x = self.conv1.forward(input);
		let x = self.bn1.forward(x);
		let x = self.relu.forward(x);
		let x = self.maxpool.forward(x);

		let c1 = self.layer1.forward(x);
		let c2 = self.layer2.forward(c1.clone());
		let c3 = self.layer3.forward(c2.clone());
		let c4 = self.layer4.forward(c3.clone());

		[c1, c2, c3, c4]
	}
}

#[derive(Config, Debug)]
pub struct ResNetBackboneConfig {
	#[config(default = "RESNET101_BLOCKS")]
	pub blocks: [usize; 4],
	/// 1 for basic blocks, 4 for bottlenecks.
	#[config(default = 4)]
	pub expansion: usize,
	/// Width of the stem and of the first stage before expansion.
	#[config(default = 64)]
	pub base_channels: usize,
}

impl ResNetBackboneConfig {
	pub fn stage_channels(&self) -> [usize; 4] {
		[1, 2, 4, 8].map(|m| m * self.base_channels * self.expansion)
	}

	pub fn init<B: Backend>(&self, device: &Device<B>) -> ResNetBackbone<B> {
		assert!(
			self.expansion == 1 || self.expansion == 4,
			"ResNet backbone only supports expansion values [1, 4] for residual blocks"
		);

		let base = self.base_channels;
		let bottleneck = self.expansion > 1;
		let channels = self.stage_channels();
		let layer = |i: usize, in_channels: usize, stride: usize| {
			LayerBlockConfig::new(self.blocks[i], in_channels, channels[i], stride, bottleneck).init(device)
		};

		ResNetBackbone {
			// 7x7 conv, /2
			conv1: conv(3, base, 7, 2).init(device),
			bn1: BatchNormConfig::new(base).init(device),
			relu: Relu::new(),
			// 3x3 maxpool, /2
			maxpool: MaxPool2dConfig::new([3, 3])
				.with_strides([2, 2])
				.with_padding(PaddingConfig2d::Explicit(1, 1))
				.init(),
			layer1: layer(0, base, 1),
			layer2: layer(1, channels[0], 2),
			layer3: layer(2, channels[1], 2),
			layer4: layer(3, channels[2], 2),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::NdArray;
	use burn::tensor::Distribution;

	type TestBackend = NdArray;

	#[test]
	fn bottleneck_stages_expand_by_four() {
		let device = Default::default();
		let config = ResNetBackboneConfig::new().with_blocks([1, 1, 1, 1]);
		let backbone: ResNetBackbone<TestBackend> = config.init(&device);

		let input = Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Default, &device);
		let dims = backbone.forward(input).map(|stage| stage.dims());

		assert_eq!(config.stage_channels(), [256, 512, 1024, 2048]);
		assert_eq!(dims, [[1, 256, 16, 16], [1, 512, 8, 8], [1, 1024, 4, 4], [1, 2048, 2, 2]]);
	}

	#[test]
	fn base_channels_scale_every_stage() {
		let config = ResNetBackboneConfig::new().with_expansion(1).with_base_channels(4);

		assert_eq!(config.stage_channels(), [4, 8, 16, 32]);
	}
}
