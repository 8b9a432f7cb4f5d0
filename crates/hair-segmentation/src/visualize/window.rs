use std::time::Duration;
use minifb::{Key, Window, WindowOptions};
use crate::error::EvalError;
use crate::visualize::{Figure, VisualizationSink};

const CLOSE_KEYS: [Key; 3] = [Key::Escape, Key::Enter, Key::Space];

/// Shows each figure in a window and blocks until it is dismissed.
#[derive(Debug, Default)]
pub struct WindowSink;

impl WindowSink {
	pub fn new() -> Self {
		Self
	}
}

fn to_argb(figure: &Figure) -> Vec<u32> {
	figure
		.image
		.pixels()
		.map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
		.collect()
}

impl VisualizationSink for WindowSink {
	fn present(&mut self, figure: Figure) -> Result<(), EvalError> {
		let (width, height) = (figure.image.width() as usize, figure.image.height() as usize);
		let buffer = to_argb(&figure);

		let mut window = Window::new(&figure.name, width, height, WindowOptions::default())
			.map_err(|e| EvalError::Display(format!("Failed to create window: {e}")))?;
		window.set_target_fps(30);

		while window.is_open() && !CLOSE_KEYS.iter().any(|&key| window.is_key_down(key)) {
			window
				.update_with_buffer(&buffer, width, height)
				.map_err(|e| EvalError::Display(e.to_string()))?;
		}

		// let the key release before the next window opens
		std::thread::sleep(Duration::from_millis(150));

		Ok(())
	}
}
