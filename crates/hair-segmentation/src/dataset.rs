use std::path::{Path, PathBuf};
use image::{imageops, GrayImage, RgbImage};
use log::{debug, info};
use crate::data::{display_name, SegmentationItem};
use crate::error::EvalError;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const LABEL_THRESHOLD: u8 = 127;

/// Hair flags of a grayscale mask. Both 0/255 masks and masks that already
/// hold class indices (0/1) are accepted.
fn binarize_mask(mask: GrayImage) -> Vec<u8> {
	let max = mask.pixels().map(|p| p.0[0]).max().unwrap_or(0);
	let threshold = if max <= 1 { 0 } else { LABEL_THRESHOLD };

	mask.into_raw().into_iter().map(|v| u8::from(v > threshold)).collect()
}

/// Read side of a test split, addressed by the ids it hands out.
pub trait SegmentationSource {
	/// Ids in the order they should be evaluated.
	fn image_ids(&self) -> Vec<usize>;

	fn image_path(&self, id: usize) -> Result<&Path, EvalError>;

	/// RGB image at the evaluation resolution.
	fn load_image(&self, id: usize) -> Result<RgbImage, EvalError>;

	/// Class index per pixel, row major, at the evaluation resolution.
	fn load_labels(&self, id: usize) -> Result<Vec<u8>, EvalError>;

	fn load_item(&self, id: usize, side: usize) -> Result<SegmentationItem, EvalError> {
		let name = display_name(self.image_path(id)?);
		let image = self.load_image(id)?;
		let labels = self.load_labels(id)?;

		SegmentationItem::new(name, image, labels, side)
	}
}

#[derive(Debug, Clone)]
struct HelenSample {
	image_path: PathBuf,
	label_path: PathBuf,
}

/// Helen style split: `images/<name>.jpg` with a grayscale `labels/<name>.png`
/// mask where bright pixels are hair.
#[derive(Debug, Clone)]
pub struct HelenDataset {
	samples: Vec<HelenSample>,
	side: u32,
}

impl HelenDataset {
	pub fn new<P: AsRef<Path>>(root: P, side: usize) -> Result<Self, EvalError> {
		let root = root.as_ref();
		let label_dir = root.join("labels");

		let mut image_paths: Vec<PathBuf> = root
			.join("images")
			.read_dir()?
			.filter_map(|entry| entry.ok().map(|entry| entry.path()))
			.filter(|path| {
				path.extension()
					.and_then(|ext| ext.to_str())
					.is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
			})
			.collect();
		image_paths.sort();

		let samples = image_paths
			.into_iter()
			.map(|image_path| {
				let label_path = label_dir.join(format!("{}.png", display_name(&image_path)));
				HelenSample { image_path, label_path }
			})
			.collect::<Vec<_>>();

		info!("Found {} test images in {}", samples.len(), root.display());

		Ok(Self {
			samples,
			side: side as u32,
		})
	}

	fn sample(&self, id: usize) -> Result<&HelenSample, EvalError> {
		self.samples.get(id).ok_or(EvalError::UnknownSample(id))
	}
}

impl SegmentationSource for HelenDataset {
	fn image_ids(&self) -> Vec<usize> {
		(0..self.samples.len()).collect()
	}

	fn image_path(&self, id: usize) -> Result<&Path, EvalError> {
		Ok(&self.sample(id)?.image_path)
	}

	fn load_image(&self, id: usize) -> Result<RgbImage, EvalError> {
		let sample = self.sample(id)?;
		let mut image = image::open(&sample.image_path)?.to_rgb8();

		if image.dimensions() != (self.side, self.side) {
			debug!("Resizing {:?} from {:?}", sample.image_path, image.dimensions());
			image = imageops::resize(&image, self.side, self.side, imageops::FilterType::Triangle);
		}

		Ok(image)
	}

	fn load_labels(&self, id: usize) -> Result<Vec<u8>, EvalError> {
		let sample = self.sample(id)?;
		if !sample.label_path.exists() {
			return Err(EvalError::MissingLabels(sample.label_path.clone()));
		}

		let mut mask: GrayImage = image::open(&sample.label_path)?.to_luma8();
		if mask.dimensions() != (self.side, self.side) {
			// nearest keeps class indices intact
			mask = imageops::resize(&mask, self.side, self.side, imageops::FilterType::Nearest);
		}

		Ok(binarize_mask(mask))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{Luma, Rgb};

	fn write_sample(root: &Path, name: &str, side: u32, with_label: bool) {
		std::fs::create_dir_all(root.join("images")).unwrap();
		std::fs::create_dir_all(root.join("labels")).unwrap();

		RgbImage::from_pixel(side, side, Rgb([10, 20, 30]))
			.save(root.join("images").join(format!("{name}.png")))
			.unwrap();

		if with_label {
			GrayImage::from_fn(side, side, |x, _| if x < side / 2 { Luma([255]) } else { Luma([0]) })
				.save(root.join("labels").join(format!("{name}.png")))
				.unwrap();
		}
	}

	#[test]
	fn orders_samples_by_file_name() {
		let dir = tempfile::tempdir().unwrap();
		for name in ["c", "a", "b"] {
			write_sample(dir.path(), name, 4, true);
		}
		std::fs::write(dir.path().join("images").join("notes.txt"), "skip").unwrap();

		let dataset = HelenDataset::new(dir.path(), 4).unwrap();
		let names: Vec<String> = dataset
			.image_ids()
			.into_iter()
			.map(|id| display_name(dataset.image_path(id).unwrap()))
			.collect();

		assert_eq!(dataset.image_ids(), vec![0, 1, 2]);
		assert_eq!(names, ["a", "b", "c"]);
	}

	#[test]
	fn loads_binarized_labels_at_target_size() {
		let dir = tempfile::tempdir().unwrap();
		write_sample(dir.path(), "face", 8, true);

		let dataset = HelenDataset::new(dir.path(), 4).unwrap();
		let item = dataset.load_item(0, 4).unwrap();

		assert_eq!(item.name, "face");
		assert_eq!(item.image.dimensions(), (4, 4));
		assert_eq!(item.labels.len(), 16);
		assert_eq!(&item.labels[..4], &[1, 1, 0, 0]);
		assert!(item.labels.iter().all(|&l| l <= 1));
	}

	#[test]
	fn accepts_class_index_masks() {
		let dir = tempfile::tempdir().unwrap();
		write_sample(dir.path(), "indexed", 4, false);
		GrayImage::from_fn(4, 4, |x, _| Luma([u8::from(x == 0)]))
			.save(dir.path().join("labels").join("indexed.png"))
			.unwrap();

		let dataset = HelenDataset::new(dir.path(), 4).unwrap();
		let labels = dataset.load_labels(0).unwrap();

		assert_eq!(&labels[..4], &[1, 0, 0, 0]);
		assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 4);
	}

	#[test]
	fn gray_levels_below_threshold_are_background() {
		let mask = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 100, 128, 255][x as usize]]));

		assert_eq!(binarize_mask(mask), vec![0, 0, 1, 1]);
	}

	#[test]
	fn missing_label_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		write_sample(dir.path(), "lonely", 4, false);

		let dataset = HelenDataset::new(dir.path(), 4).unwrap();

		assert!(matches!(dataset.load_labels(0), Err(EvalError::MissingLabels(_))));
		assert!(matches!(dataset.load_image(5), Err(EvalError::UnknownSample(5))));
	}
}
