//! Synthetic frames for unit tests.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::locator::CandidateRegion;

/// Neutral background.
pub(crate) const GRAY: [u8; 3] = [128, 128, 128];
/// Lit red lamp, hue 5.
pub(crate) const RED: [u8; 3] = [255, 43, 0];
/// Lit yellow lamp, hue 27.
pub(crate) const YELLOW: [u8; 3] = [255, 230, 0];
/// Lit green lamp, hue 60.
pub(crate) const GREEN: [u8; 3] = [0, 255, 0];

/// Grayscale frame with filled disks `(cx, cy, r)` of intensity `fg`.
pub(crate) fn draw_disk_gray(w: u32, h: u32, disks: &[(i32, i32, u32)], fg: u8, bg: u8) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg]));
    for &(cx, cy, r) in disks {
        for (x, y) in disk_pixels(CandidateRegion::new(cx, cy, r)) {
            if x < w && y < h {
                img.put_pixel(x, y, Luma([fg]));
            }
        }
    }
    img
}

/// Color frame with filled disks painted in order over `bg`.
pub(crate) fn draw_disks_rgb(
    w: u32,
    h: u32,
    bg: [u8; 3],
    disks: &[((i32, i32, u32), [u8; 3])],
) -> RgbImage {
    let mut img = RgbImage::from_pixel(w, h, Rgb(bg));
    for &((cx, cy, r), color) in disks {
        for (x, y) in disk_pixels(CandidateRegion::new(cx, cy, r)) {
            if x < w && y < h {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }
    img
}

/// Non-negative pixel coordinates of a filled disk, row-major.
pub(crate) fn disk_pixels(region: CandidateRegion) -> Vec<(u32, u32)> {
    let r = region.radius as i32;
    let mut out = Vec::new();
    for y in (region.y - r)..=(region.y + r) {
        for x in (region.x - r)..=(region.x + r) {
            if x >= 0 && y >= 0 && region.contains(x, y) {
                out.push((x as u32, y as u32));
            }
        }
    }
    out
}
