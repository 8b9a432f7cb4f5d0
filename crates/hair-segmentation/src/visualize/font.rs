//! 5x7 bitmap glyphs, enough for figure titles.

use image::{Rgb, RgbImage};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;

fn glyph(c: char) -> [u8; 7] {
	match c.to_ascii_uppercase() {
		'0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
		'1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
		'2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
		'3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
		'4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
		'5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
		'6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
		'7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
		'8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
		'9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
		'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
		'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
		'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
		'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
		'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
		'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
		'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
		'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
		'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
		'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
		'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
		'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
		'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
		'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
		':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
		'.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
		'-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
		'_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
		' ' => [0x00; 7],
		_ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
	}
}

pub fn text_width(text: &str, scale: u32) -> u32 {
	let count = text.chars().count() as u32;
	if count == 0 {
		return 0;
	}
	(count * (GLYPH_WIDTH + 1) - 1) * scale
}

/// Draws `text` with its top left corner at (x, y). Pixels off the canvas are skipped.
pub fn draw_text(canvas: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>, scale: u32) {
	let (width, height) = canvas.dimensions();

	for (i, c) in text.chars().enumerate() {
		let origin = x + i as u32 * (GLYPH_WIDTH + 1) * scale;

		for (row, bits) in glyph(c).iter().enumerate() {
			for col in 0..GLYPH_WIDTH {
				if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
					continue;
				}

				for dy in 0..scale {
					for dx in 0..scale {
						let px = origin + col * scale + dx;
						let py = y + row as u32 * scale + dy;
						if px < width && py < height {
							canvas.put_pixel(px, py, color);
						}
					}
				}
			}
		}
	}
}
