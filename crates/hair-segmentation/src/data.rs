use std::path::Path;
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::{Backend, Int};
use burn::tensor::{Tensor, TensorData};
use image::RgbImage;
use crate::error::EvalError;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// One test sample: an RGB image plus its per-pixel class indices, row major.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
	pub name: String,
	pub image: RgbImage,
	pub labels: Vec<u8>,
}

impl SegmentationItem {
	pub fn new(name: String, image: RgbImage, labels: Vec<u8>, side: usize) -> Result<Self, EvalError> {
		let (width, height) = image.dimensions();
		if width as usize != side || height as usize != side || labels.len() != side * side {
			return Err(EvalError::InvalidSampleSize {
				name,
				width,
				height,
				expected: side,
			});
		}

		Ok(Self { name, image, labels })
	}
}

/// Display name of a sample: the file name of its image without the extension.
pub fn display_name<P: AsRef<Path>>(image_path: P) -> String {
	let path = image_path.as_ref();
	path.file_stem()
		.or_else(|| path.file_name())
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Normalizer<B: Backend> {
	pub mean: Tensor<B, 4>,
	pub std: Tensor<B, 4>,
}

impl<B: Backend> Normalizer<B> {
	pub fn new(device: &B::Device, mean: [f32; 3], std: [f32; 3]) -> Self {
		let mean = Tensor::<B, 1>::from_floats(mean, device).reshape([1, 3, 1, 1]);
		let std = Tensor::<B, 1>::from_floats(std, device).reshape([1, 3, 1, 1]);
		Self { mean, std }
	}

	/// Expects [N, 3, H, W] in [0, 1].
	pub fn normalize(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		(input - self.mean.clone()) / self.std.clone()
	}

	pub fn denormalize(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		input * self.std.clone() + self.mean.clone()
	}

	/// Reverses normalization back to displayable RGB images.
	pub fn unmold(&self, input: Tensor<B, 4>) -> Vec<RgbImage> {
		let [batch_size, _, height, width] = input.dims();

		let pixels: Vec<u8> = (self.denormalize(input) * 255)
			.clamp(0.0, 255.0)
			.round()
			.permute([0, 2, 3, 1]) // [N, H, W, C]
			.into_data()
			.iter::<f32>()
			.map(|x| x as u8)
			.collect();

		pixels
			.chunks_exact(height * width * 3)
			.take(batch_size)
			.filter_map(|chunk| RgbImage::from_raw(width as u32, height as u32, chunk.to_vec()))
			.collect()
	}
}

#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
	pub images: Tensor<B, 4>,
	pub targets: Tensor<B, 3, Int>,
	pub names: Vec<String>,
}

#[derive(Clone)]
pub struct SegmentationBatcher<B: Backend> {
	normalizer: Normalizer<B>,
	device: B::Device,
	side: usize,
}

impl<B: Backend> SegmentationBatcher<B> {
	pub fn new(device: B::Device, side: usize, mean: [f32; 3], std: [f32; 3]) -> Self {
		Self {
			normalizer: Normalizer::new(&device, mean, std),
			device,
			side,
		}
	}

	pub fn normalizer(&self) -> &Normalizer<B> {
		&self.normalizer
	}
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
	fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
		let batch_size = items.len();
		let side = self.side;

		let mut pixels = Vec::with_capacity(batch_size * side * side * 3);
		let mut labels = Vec::with_capacity(batch_size * side * side);
		let mut names = Vec::with_capacity(batch_size);

		for item in items {
			pixels.extend(item.image.into_raw().into_iter().map(|p| p as f32 / 255.0));
			labels.extend(item.labels.into_iter().map(|l| l as i64));
			names.push(item.name);
		}

		let images = Tensor::<B, 4>::from_data(
			TensorData::new(pixels, [batch_size, side, side, 3]).convert::<B::FloatElem>(),
			&self.device,
		)
			// [N, H, W, C] -> [N, C, H, W]
			.permute([0, 3, 1, 2]);
		let images = self.normalizer.normalize(images);

		let targets = Tensor::<B, 3, Int>::from_data(
			TensorData::new(labels, [batch_size, side, side]).convert::<B::IntElem>(),
			&self.device,
		);

		SegmentationBatch {
			images,
			targets,
			names,
		}
	}
}

/// Fixed-capacity buffer that turns a sample stream into batches.
///
/// A batch is released once `batch_size` samples are held, or early when the
/// caller marks the final sample. The final batch only holds what was pushed.
#[derive(Debug)]
pub struct BatchAssembler {
	batch_size: usize,
	buffer: Vec<SegmentationItem>,
}

impl BatchAssembler {
	pub fn new(batch_size: usize) -> Self {
		assert!(batch_size > 0, "batch size must be positive");

		Self {
			batch_size,
			buffer: Vec::with_capacity(batch_size),
		}
	}

	pub fn push(&mut self, item: SegmentationItem, last: bool) -> Option<Vec<SegmentationItem>> {
		self.buffer.push(item);

		if self.buffer.len() < self.batch_size && !last {
			return None;
		}

		Some(std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use burn::backend::NdArray;

	type TestBackend = NdArray;

	fn item(name: &str, side: usize, seed: u8) -> SegmentationItem {
		let image = RgbImage::from_fn(side as u32, side as u32, |x, y| {
			image::Rgb([seed.wrapping_add(x as u8), seed.wrapping_mul(3).wrapping_add(y as u8), 255 - seed])
		});
		let labels = (0..side * side).map(|i| (i % 2) as u8).collect();

		SegmentationItem::new(name.to_string(), image, labels, side).unwrap()
	}

	#[test]
	fn display_name_strips_extension() {
		assert_eq!(display_name("data/images/abc123.jpg"), "abc123");
		assert_eq!(display_name("abc123.jpeg"), "abc123");
		assert_eq!(display_name("abc.db"), "abc");
		assert_eq!(display_name("noext"), "noext");
	}

	#[test]
	fn item_rejects_wrong_size() {
		let image = RgbImage::new(4, 3);
		let result = SegmentationItem::new("a".to_string(), image, vec![0; 12], 4);

		assert!(matches!(result, Err(EvalError::InvalidSampleSize { width: 4, height: 3, .. })));
	}

	#[test]
	fn flushes_ceil_of_n_over_b() {
		for (n, batch_size) in [(3usize, 2usize), (4, 2), (5, 5), (7, 3), (1, 4)] {
			let mut assembler = BatchAssembler::new(batch_size);
			let mut flushes = Vec::new();

			for i in 0..n {
				if let Some(batch) = assembler.push(item(&i.to_string(), 2, i as u8), i == n - 1) {
					flushes.push((i, batch.len()));
				}
			}

			assert_eq!(flushes.len(), n.div_ceil(batch_size), "n={n} b={batch_size}");
			assert_eq!(flushes.last().map(|(i, _)| *i), Some(n - 1));
			assert_eq!(flushes.iter().map(|(_, len)| len).sum::<usize>(), n);
		}
	}

	#[test]
	fn final_partial_batch_holds_no_stale_samples() {
		let mut assembler = BatchAssembler::new(2);

		let first = assembler.push(item("a", 2, 1), false);
		assert!(first.is_none());
		let full = assembler.push(item("b", 2, 2), false).unwrap();
		let last = assembler.push(item("c", 2, 3), true).unwrap();

		assert_eq!(full.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["a", "b"]);
		assert_eq!(last.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["c"]);
	}

	#[test]
	fn batcher_produces_channel_first_tensors() {
		let device = Default::default();
		let batcher = SegmentationBatcher::<TestBackend>::new(device, 4, IMAGENET_MEAN, IMAGENET_STD);

		let batch = batcher.batch(vec![item("a", 4, 10), item("b", 4, 20), item("c", 4, 30)]);

		assert_eq!(batch.images.dims(), [3, 3, 4, 4]);
		assert_eq!(batch.targets.dims(), [3, 4, 4]);
		assert_eq!(batch.names, vec!["a", "b", "c"]);

		let targets: Vec<i64> = batch.targets.into_data().iter::<i64>().collect();
		assert_eq!(&targets[..4], &[0, 1, 0, 1]);
	}

	#[test]
	fn normalization_matches_imagenet_formula() {
		let device = Default::default();
		let batcher = SegmentationBatcher::<TestBackend>::new(device, 1, IMAGENET_MEAN, IMAGENET_STD);
		let image = RgbImage::from_pixel(1, 1, image::Rgb([255, 0, 128]));
		let item = SegmentationItem::new("p".to_string(), image, vec![0], 1).unwrap();

		let values: Vec<f32> = batcher.batch(vec![item]).images.into_data().iter::<f32>().collect();
		let expected = [
			(1.0 - 0.485) / 0.229,
			(0.0 - 0.456) / 0.224,
			(128.0 / 255.0 - 0.406) / 0.225,
		];

		for (value, expected) in values.iter().zip(expected) {
			assert!((value - expected).abs() < 1e-5, "{value} != {expected}");
		}
	}

	#[test]
	fn unmold_inverts_normalization() {
		let device = Default::default();
		let batcher = SegmentationBatcher::<TestBackend>::new(device, 8, IMAGENET_MEAN, IMAGENET_STD);
		let items = vec![item("a", 8, 7), item("b", 8, 200)];
		let originals: Vec<RgbImage> = items.iter().map(|i| i.image.clone()).collect();

		let batch = batcher.batch(items);
		let restored = batcher.normalizer().unmold(batch.images);

		assert_eq!(restored, originals);
	}
}
