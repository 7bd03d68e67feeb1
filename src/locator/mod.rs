//! Candidate lamp regions: grayscale, denoise, circle voting.

pub mod hough;

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::{BlurKind, LocatorConfig};
use crate::frame;

/// A circle in integer pixel units. Produced fresh for every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRegion {
    pub x: i32,
    pub y: i32,
    pub radius: u32,
}

impl CandidateRegion {
    pub const fn new(x: i32, y: i32, radius: u32) -> Self {
        Self { x, y, radius }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Whether pixel `(px, py)` lies in the filled disk.
    #[inline]
    pub fn contains(&self, px: i32, py: i32) -> bool {
        let dx = (px - self.x) as i64;
        let dy = (py - self.y) as i64;
        let r = self.radius as i64;
        dx * dx + dy * dy <= r * r
    }
}

pub struct RegionLocator {
    config: LocatorConfig,
}

impl RegionLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Find circular candidates in a color frame. An empty result is the
    /// "no traffic light in frame" case, not a failure.
    pub fn locate(&self, frame: &RgbImage) -> Vec<CandidateRegion> {
        let _span = tracing::debug_span!("locate").entered();

        let gray = frame::to_gray(frame);
        let smoothed = smooth(&gray, self.config.blur);
        let regions: Vec<CandidateRegion> = hough::hough_circles(&smoothed, &self.config)
            .into_iter()
            .map(|c| {
                CandidateRegion::new(
                    c.x.round() as i32,
                    c.y.round() as i32,
                    c.radius.round().max(0.0) as u32,
                )
            })
            .collect();

        tracing::debug!("located {} candidate regions", regions.len());
        regions
    }
}

/// Apply the configured denoising filter.
pub fn smooth(gray: &GrayImage, blur: BlurKind) -> GrayImage {
    match blur {
        BlurKind::Median { kernel } if kernel > 1 => {
            let radius = kernel / 2;
            imageproc::filter::median_filter(gray, radius, radius)
        }
        BlurKind::Gaussian { kernel, sigma } if kernel > 1 => {
            let weights = gaussian_kernel(kernel, sigma);
            imageproc::filter::separable_filter_equal(gray, &weights)
        }
        _ => gray.clone(),
    }
}

/// Normalised 1-D Gaussian weights of odd length `size`.
fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_disks_rgb;

    #[test]
    fn disk_membership_is_inclusive_of_rim() {
        let region = CandidateRegion::new(10, 10, 3);
        assert!(region.contains(10, 10));
        assert!(region.contains(13, 10));
        assert!(region.contains(10, 7));
        assert!(!region.contains(13, 11));
    }

    #[test]
    fn gaussian_weights_sum_to_one_and_peak_in_middle() {
        let weights = gaussian_kernel(9, 2.0);
        assert_eq!(weights.len(), 9);
        let sum: f32 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(weights[4] > weights[3] && weights[4] > weights[5]);
        assert!((weights[0] - weights[8]).abs() < 1e-7);
    }

    #[test]
    fn smoothing_removes_isolated_speck() {
        let mut gray = GrayImage::from_pixel(9, 9, image::Luma([20]));
        gray.put_pixel(4, 4, image::Luma([255]));
        let median = smooth(&gray, BlurKind::Median { kernel: 5 });
        assert_eq!(median.get_pixel(4, 4)[0], 20);
        let gauss = smooth(
            &gray,
            BlurKind::Gaussian {
                kernel: 5,
                sigma: 1.0,
            },
        );
        assert!(gauss.get_pixel(4, 4)[0] < 255);
    }

    #[test]
    fn locates_lit_lamp_in_color_frame() {
        let frame = draw_disks_rgb(160, 120, [0, 0, 0], &[((80, 60, 22), [255, 255, 255])]);
        let locator = RegionLocator::new(LocatorConfig {
            dp: 1.0,
            min_dist: 20.0,
            param1: 100.0,
            param2: 20.0,
            min_radius: 8,
            max_radius: 40,
            ..LocatorConfig::default()
        });
        let regions = locator.locate(&frame);
        assert_eq!(regions.len(), 1, "{regions:?}");
        let r = regions[0];
        assert!((r.x - 80).abs() <= 2 && (r.y - 60).abs() <= 2, "{r:?}");
        assert!((r.radius as i32 - 22).abs() <= 2, "{r:?}");
    }

    #[test]
    fn standard_settings_locate_hard_edged_red_lamp() {
        let frame = draw_disks_rgb(160, 160, [0, 0, 0], &[((80, 80, 25), [255, 43, 0])]);
        let regions = RegionLocator::new(LocatorConfig::default()).locate(&frame);
        assert_eq!(regions.len(), 1, "{regions:?}");
        let r = regions[0];
        assert!((r.x - 80).abs() <= 2 && (r.y - 80).abs() <= 2, "{r:?}");
        assert!((r.radius as i32 - 25).abs() <= 2, "{r:?}");
    }

    #[test]
    fn blank_frame_yields_no_regions() {
        let frame = RgbImage::from_pixel(100, 100, image::Rgb([90, 90, 90]));
        let locator = RegionLocator::new(LocatorConfig::default());
        assert!(locator.locate(&frame).is_empty());
    }
}
