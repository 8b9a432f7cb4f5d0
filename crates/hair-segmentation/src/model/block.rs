use std::f64::consts::SQRT_2;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Config, Device, Module, Tensor};
use burn::tensor::activation::sigmoid;

/// Bias-free conv with "same" padding for odd kernels.
pub(crate) fn conv(in_channels: usize, out_channels: usize, kernel: usize, stride: usize) -> Conv2dConfig {
	let pad = kernel / 2;
	Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
		.with_stride([stride, stride])
		.with_padding(PaddingConfig2d::Explicit(pad, pad))
		.with_bias(false)
		.with_initializer(Initializer::KaimingNormal {
			gain: SQRT_2, // recommended value for ReLU
			fan_out_only: true,
		})
}

#[derive(Debug, Module)]
pub enum ResidualBlock<B: Backend> {
	Basic(BasicBlock<B>),
	Bottleneck(Bottleneck<B>),
}

impl<B: Backend> ResidualBlock<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		match self {
			ResidualBlock::Basic(block) => block.forward(input),
			ResidualBlock::Bottleneck(block) => block.forward(input),
		}
	}
}

#[derive(Debug, Module)]
pub struct BasicBlock<B: Backend> {
	conv1: Conv2d<B>,
	bn1: BatchNorm<B, 2>,
	conv2: Conv2d<B>,
	bn2: BatchNorm<B, 2>,
	relu: Relu,
	downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let identity = shortcut(&self.downsample, &input);

		let x = self.relu.forward(self.bn1.forward(self.conv1.forward(input)));
		let x = self.bn2.forward(self.conv2.forward(x));

		self.relu.forward(x + identity)
	}
}

#[derive(Debug, Module)]
pub struct Bottleneck<B: Backend> {
	conv1: Conv2d<B>,
	bn1: BatchNorm<B, 2>,
	conv2: Conv2d<B>,
	bn2: BatchNorm<B, 2>,
	conv3: Conv2d<B>,
	bn3: BatchNorm<B, 2>,
	relu: Relu,
	downsample: Option<Downsample<B>>,
}

impl<B: Backend> Bottleneck<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let identity = shortcut(&self.downsample, &input);

		let x = self.relu.forward(self.bn1.forward(self.conv1.forward(input)));
		let x = self.relu.forward(self.bn2.forward(self.conv2.forward(x)));
		let x = self.bn3.forward(self.conv3.forward(x));

		self.relu.forward(x + identity)
	}
}

fn shortcut<B: Backend>(downsample: &Option<Downsample<B>>, input: &Tensor<B, 4>) -> Tensor<B, 4> {
	match downsample {
		Some(downsample) => downsample.forward(input.clone()),
		None => input.clone(),
	}
}

#[derive(Debug, Module)]
pub struct Downsample<B: Backend> {
	conv: Conv2d<B>,
	bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		self.bn.forward(self.conv.forward(input))
	}
}

#[derive(Config)]
pub struct ResidualBlockConfig {
	in_channels: usize,
	out_channels: usize,
	stride: usize,
	bottleneck: bool,
}

impl ResidualBlockConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> ResidualBlock<B> {
		let (in_channels, out_channels, stride) = (self.in_channels, self.out_channels, self.stride);

		let downsample = (in_channels != out_channels || stride != 1).then(|| Downsample {
			conv: conv(in_channels, out_channels, 1, stride).init(device),
			bn: BatchNormConfig::new(out_channels).init(device),
		});

		if !self.bottleneck {
			return ResidualBlock::Basic(BasicBlock {
				conv1: conv(in_channels, out_channels, 3, stride).init(device),
				bn1: BatchNormConfig::new(out_channels).init(device),
				conv2: conv(out_channels, out_channels, 3, 1).init(device),
				bn2: BatchNormConfig::new(out_channels).init(device),
				relu: Relu::new(),
				downsample,
			});
		}

		// expansion of 4 between the inner and outer width
		let inner = out_channels / 4;
		ResidualBlock::Bottleneck(Bottleneck {
			conv1: conv(in_channels, inner, 1, 1).init(device),
			bn1: BatchNormConfig::new(inner).init(device),
			conv2: conv(inner, inner, 3, stride).init(device),
			bn2: BatchNormConfig::new(inner).init(device),
			conv3: conv(inner, out_channels, 1, 1).init(device),
			bn3: BatchNormConfig::new(out_channels).init(device),
			relu: Relu::new(),
			downsample,
		})
	}
}

#[derive(Debug, Module)]
pub struct LayerBlock<B: Backend> {
	blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		self.blocks.iter().fold(input, |x, block| block.forward(x))
	}
}

#[derive(Config)]
pub struct LayerBlockConfig {
	num_blocks: usize,
	in_channels: usize,
	out_channels: usize,
	stride: usize,
	bottleneck: bool,
}

impl LayerBlockConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> LayerBlock<B> {
		let blocks = (0..self.num_blocks)
			.map(|b| {
				// only the first block changes width and resolution
				let (in_channels, stride) = if b == 0 {
					(self.in_channels, self.stride)
				} else {
					(self.out_channels, 1)
				};
				ResidualBlockConfig::new(in_channels, self.out_channels, stride, self.bottleneck).init(device)
			})
			.collect();

		LayerBlock { blocks }
	}
}

/// Refinement residual block: a 1x1 projection followed by a 3x3 residual branch.
#[derive(Debug, Module)]
pub struct RefineResidualBlock<B: Backend> {
	conv_in: Conv2d<B>,
	conv1: Conv2d<B>,
	bn: BatchNorm<B, 2>,
	conv2: Conv2d<B>,
	relu: Relu,
}

impl<B: Backend> RefineResidualBlock<B> {
	pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let x = self.conv_in.forward(input);

		let residual = self.relu.forward(self.bn.forward(self.conv1.forward(x.clone())));
		let residual = self.conv2.forward(residual);

		self.relu.forward(x + residual)
	}
}

#[derive(Config)]
pub struct RefineResidualBlockConfig {
	in_channels: usize,
	out_channels: usize,
}

impl RefineResidualBlockConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> RefineResidualBlock<B> {
		let out = self.out_channels;
		RefineResidualBlock {
			conv_in: conv(self.in_channels, out, 1, 1).with_bias(true).init(device),
			conv1: conv(out, out, 3, 1).with_bias(true).init(device),
			bn: BatchNormConfig::new(out).init(device),
			conv2: conv(out, out, 3, 1).with_bias(true).init(device),
			relu: Relu::new(),
		}
	}
}

/// Channel attention block: the higher stage decides how much of each channel
/// of the lower stage passes through.
#[derive(Debug, Module)]
pub struct ChannelAttentionBlock<B: Backend> {
	conv1: Conv2d<B>,
	conv2: Conv2d<B>,
	relu: Relu,
}

impl<B: Backend> ChannelAttentionBlock<B> {
	/// `low` and `high` must share shape [N, C, H, W].
	pub fn forward(&self, low: Tensor<B, 4>, high: Tensor<B, 4>) -> Tensor<B, 4> {
		let fused = Tensor::cat(vec![low.clone(), high.clone()], 1);
		let weights = fused.mean_dim(3).mean_dim(2); // [N, 2C, 1, 1]

		let weights = self.relu.forward(self.conv1.forward(weights));
		let weights = sigmoid(self.conv2.forward(weights));

		low * weights + high
	}
}

#[derive(Config)]
pub struct ChannelAttentionBlockConfig {
	channels: usize,
}

impl ChannelAttentionBlockConfig {
	pub fn init<B: Backend>(&self, device: &Device<B>) -> ChannelAttentionBlock<B> {
		let c = self.channels;
		ChannelAttentionBlock {
			conv1: conv(2 * c, c, 1, 1).with_bias(true).init(device),
			conv2: conv(c, c, 1, 1).with_bias(true).init(device),
			relu: Relu::new(),
		}
	}
}
