use std::path::{Path, PathBuf};
use image::{imageops, Rgb, RgbImage};
use log::debug;
use crate::error::EvalError;

pub mod font;
#[cfg(feature = "display")]
pub mod window;

#[cfg(feature = "display")]
pub use window::WindowSink;

const PALETTE: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT: Rgb<u8> = Rgb([0, 0, 0]);
const MARGIN: u32 = 16;
const TITLE_SCALE: u32 = 3;

/// Paints every non-background label over `image` with a translucent class colour.
pub fn blend_labels(image: &RgbImage, labels: &[i64], alpha: f32) -> RgbImage {
	let mut blended = image.clone();

	for (pixel, &label) in blended.pixels_mut().zip(labels) {
		if label <= 0 {
			continue;
		}

		let color = PALETTE[(label as usize - 1) % PALETTE.len()];
		for (channel, overlay) in pixel.0.iter_mut().zip(color) {
			*channel = ((1.0 - alpha) * *channel as f32 + alpha * overlay as f32).round() as u8;
		}
	}

	blended
}

/// A rendered prediction / ground truth pair for one sample.
#[derive(Debug, Clone)]
pub struct Figure {
	pub name: String,
	pub f1: f64,
	pub image: RgbImage,
}

impl Figure {
	/// Prediction overlay on the left, ground truth overlay on the right.
	pub fn render(
		name: String,
		f1: f64,
		image: &RgbImage,
		ground_truth: &[i64],
		prediction: &[i64],
		alpha: f32,
	) -> Self {
		let panels = [
			(format!("predict:{f1:.4}"), blend_labels(image, prediction, alpha)),
			("ground-truth".to_string(), blend_labels(image, ground_truth, alpha)),
		];

		let (side_w, side_h) = image.dimensions();
		let title_height = font::GLYPH_HEIGHT * TITLE_SCALE + MARGIN;
		let width = 2 * side_w + 3 * MARGIN;
		let height = title_height + side_h + MARGIN;

		let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
		for (i, (title, panel)) in panels.iter().enumerate() {
			let left = MARGIN + i as u32 * (side_w + MARGIN);
			let title_x = left + side_w.saturating_sub(font::text_width(title, TITLE_SCALE)) / 2;

			font::draw_text(&mut canvas, title_x, MARGIN / 2, title, TEXT, TITLE_SCALE);
			imageops::replace(&mut canvas, panel, left as i64, title_height as i64);
		}

		Self {
			name,
			f1,
			image: canvas,
		}
	}

	pub fn file_name(&self) -> String {
		format!("{:.4}_{}.png", self.f1, self.name)
	}
}

/// Destination of rendered figures.
pub trait VisualizationSink {
	fn present(&mut self, figure: Figure) -> Result<(), EvalError>;
}

/// Writes each figure as `<f1>_<name>.png` into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
	dir: PathBuf,
}

impl FileSink {
	pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, EvalError> {
		std::fs::create_dir_all(dir.as_ref())?;
		Ok(Self {
			dir: dir.as_ref().to_path_buf(),
		})
	}
}

impl VisualizationSink for FileSink {
	fn present(&mut self, figure: Figure) -> Result<(), EvalError> {
		let path = self.dir.join(figure.file_name());
		debug!("Saving {}", path.display());
		figure.image.save(path)?;
		Ok(())
	}
}

/// File sink when saving, otherwise an on-screen window.
pub fn create_sink(save: bool, save_dir: &Path) -> Result<Box<dyn VisualizationSink>, EvalError> {
	if save {
		return Ok(Box::new(FileSink::new(save_dir)?));
	}

	#[cfg(feature = "display")]
	{
		Ok(Box::new(WindowSink::new()))
	}

	#[cfg(not(feature = "display"))]
	{
		Err(EvalError::Display(
			"built without the `display` feature, pass --save to write figures instead".to_string(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blend_only_touches_labelled_pixels() {
		let image = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));

		let blended = blend_labels(&image, &[0, 1], 0.5);

		assert_eq!(blended.get_pixel(0, 0), &Rgb([100, 100, 100]));
		assert_eq!(blended.get_pixel(1, 0), &Rgb([178, 50, 50]));
	}

	#[test]
	fn figure_holds_both_panels() {
		let image = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
		let ground_truth = vec![1; 64];
		let prediction = vec![0; 64];

		let figure = Figure::render("abc".to_string(), 0.25, &image, &ground_truth, &prediction, 1.0);
		let title_height = font::GLYPH_HEIGHT * TITLE_SCALE + MARGIN;

		assert_eq!(figure.image.dimensions(), (8 * 2 + 3 * MARGIN, title_height + 8 + MARGIN));
		// prediction panel is left and empty, ground truth is right and fully hair
		assert_eq!(figure.image.get_pixel(MARGIN, title_height), &Rgb([0, 0, 0]));
		assert_eq!(figure.image.get_pixel(2 * MARGIN + 8, title_height), &Rgb([255, 0, 0]));
	}

	#[test]
	fn file_sink_names_by_score_and_sample() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("evaluate_test");
		let mut sink = FileSink::new(&out).unwrap();
		let image = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));

		sink.present(Figure::render("abc123".to_string(), 0.87654, &image, &[0; 16], &[0; 16], 0.5))
			.unwrap();

		let saved = out.join("0.8765_abc123.png");
		assert!(saved.exists());
		assert_eq!(image::open(saved).unwrap().width(), 4 * 2 + 3 * MARGIN);
	}
}
