//! Derived views of a color frame: grayscale for circle voting and 8-bit HSV
//! for color scoring.

use image::{GrayImage, RgbImage};
use ndarray::Array3;

/// HSV planes of a frame, shape `(height, width, 3)`.
///
/// Hue is halved into `[0, 180)` so it fits a byte; saturation and value span
/// `[0, 255]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvFrame {
    data: Array3<u8>,
}

impl HsvFrame {
    pub fn from_rgb(frame: &RgbImage) -> Self {
        let _span = tracing::debug_span!("hsv_convert").entered();

        let (width, height) = frame.dimensions();
        let mut data = Array3::<u8>::zeros((height as usize, width as usize, 3));
        for (x, y, pixel) in frame.enumerate_pixels() {
            let [h, s, v] = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
            let (row, col) = (y as usize, x as usize);
            data[[row, col, 0]] = h;
            data[[row, col, 1]] = s;
            data[[row, col, 2]] = v;
        }
        Self { data }
    }

    pub fn width(&self) -> u32 {
        self.data.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.data.dim().0 as u32
    }

    /// `[h, s, v]` at column `x`, row `y`. Panics when out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
        let (row, col) = (y as usize, x as usize);
        [
            self.data[[row, col, 0]],
            self.data[[row, col, 1]],
            self.data[[row, col, 2]],
        ]
    }
}

/// Grayscale view used by the circle locator.
pub fn to_gray(frame: &RgbImage) -> GrayImage {
    image::imageops::grayscale(frame)
}

/// Convert one 8-bit RGB sample to 8-bit HSV.
///
/// Returns `[h, s, v]` with h in `[0, 180)`, s and v in `[0, 255]`.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let v = max;
    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / max as f32).round() as u8
    };

    if delta == 0.0 {
        return [0, s, v];
    }

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut h = if max as f32 == r {
        60.0 * (g - b) / delta
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u16 % 180;
    [h as u8, s, v]
}
