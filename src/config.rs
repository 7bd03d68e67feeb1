//! Tunable parameters of the detection pipeline.
//!
//! Every threshold the locator and classifier use lives here so a camera or
//! lighting profile can be swapped without touching the algorithms. The
//! structures deserialize from partial JSON: missing fields fall back to the
//! standard profile.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::LampColor;
use crate::error::{DetectError, Result};

/// Largest hue the 8-bit HSV representation produces (exclusive upper bound
/// is 180, but ranges are allowed to name 180 to close the red wrap-around).
pub const HUE_MAX: u8 = 180;

/// Denoising applied to the grayscale frame before circle voting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlurKind {
    /// Square median filter; `kernel` is the odd side length.
    Median { kernel: u32 },
    /// Separable Gaussian; `kernel` is the odd side length.
    Gaussian { kernel: u32, sigma: f32 },
}

/// Circle detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub blur: BlurKind,
    /// Inverse ratio of accumulator resolution to image resolution.
    pub dp: f32,
    /// Minimum distance between detected centers (pixels).
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub param1: f32,
    /// Accumulator votes a center needs, and edge support a radius needs.
    pub param2: f32,
    pub min_radius: u32,
    /// Zero means "bounded by the image size".
    pub max_radius: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            blur: BlurKind::Median { kernel: 5 },
            dp: 1.2,
            min_dist: 50.0,
            param1: 150.0,
            param2: 40.0,
            min_radius: 10,
            max_radius: 70,
        }
    }
}

/// Inclusive box over (hue, saturation, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// Per-color membership ranges. A pixel belongs to a color if it falls in
/// any of that color's ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorRanges {
    pub red: Vec<HsvRange>,
    pub yellow: Vec<HsvRange>,
    pub green: Vec<HsvRange>,
}

impl ColorRanges {
    pub fn for_color(&self, color: LampColor) -> &[HsvRange] {
        match color {
            LampColor::Red => &self.red,
            LampColor::Yellow => &self.yellow,
            LampColor::Green => &self.green,
        }
    }

    pub fn matches(&self, color: LampColor, hsv: [u8; 3]) -> bool {
        self.for_color(color).iter().any(|r| r.contains(hsv))
    }
}

impl Default for ColorRanges {
    fn default() -> Self {
        Self {
            red: vec![
                HsvRange::new([0, 150, 120], [10, 255, 255]),
                HsvRange::new([170, 150, 120], [180, 255, 255]),
            ],
            yellow: vec![HsvRange::new([20, 150, 120], [35, 255, 255])],
            green: vec![HsvRange::new([40, 100, 100], [90, 255, 255])],
        }
    }
}

/// How a region's winning color is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    /// Highest matching ratio, accepted at or above `color_ratio_threshold`.
    Ratio,
    /// Highest raw matching count, accepted above `min_pixels`. Not
    /// scale-invariant; kept for the legacy web profile.
    PixelCount { min_pixels: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub ranges: ColorRanges,
    /// Pixels below this saturation never vote.
    pub min_saturation: u8,
    /// Pixels below this value (brightness) never vote.
    pub min_value: u8,
    /// Median kernel applied to the saturation/value gate; 1 disables it.
    pub mask_median_kernel: u32,
    pub color_ratio_threshold: f64,
    pub scoring: ScoringMode,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ranges: ColorRanges::default(),
            min_saturation: 100,
            min_value: 80,
            mask_median_kernel: 5,
            color_ratio_threshold: 0.3,
            scoring: ScoringMode::Ratio,
        }
    }
}

/// Complete configuration bundle handed to [`crate::Detector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub locator: LocatorConfig,
    pub classifier: ClassifierConfig,
}

impl DetectorConfig {
    /// Live-video tuning: median blur, stricter Hough thresholds, ratio gating.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Web-service tuning: Gaussian blur, looser Hough thresholds, wider
    /// color ranges and absolute pixel-count scoring without the
    /// saturation/value gate.
    pub fn legacy() -> Self {
        Self {
            locator: LocatorConfig {
                blur: BlurKind::Gaussian {
                    kernel: 9,
                    sigma: 2.0,
                },
                dp: 1.0,
                min_dist: 50.0,
                param1: 50.0,
                param2: 30.0,
                min_radius: 5,
                max_radius: 60,
            },
            classifier: ClassifierConfig {
                ranges: ColorRanges {
                    red: vec![
                        HsvRange::new([0, 120, 70], [10, 255, 255]),
                        HsvRange::new([170, 120, 70], [180, 255, 255]),
                    ],
                    yellow: vec![HsvRange::new([20, 100, 100], [30, 255, 255])],
                    green: vec![HsvRange::new([40, 80, 80], [90, 255, 255])],
                },
                min_saturation: 0,
                min_value: 0,
                mask_median_kernel: 1,
                color_ratio_threshold: 0.0,
                scoring: ScoringMode::PixelCount { min_pixels: 50 },
            },
        }
    }

    /// Load a (possibly partial) JSON config and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run meaningfully.
    pub fn validate(&self) -> Result<()> {
        let loc = &self.locator;
        match loc.blur {
            BlurKind::Median { kernel } => check_odd_kernel("locator.blur.kernel", kernel)?,
            BlurKind::Gaussian { kernel, sigma } => {
                check_odd_kernel("locator.blur.kernel", kernel)?;
                if !(sigma.is_finite() && sigma > 0.0) {
                    return Err(invalid(format!("locator.blur.sigma must be > 0, got {sigma}")));
                }
            }
        }
        if !(loc.dp.is_finite() && loc.dp >= 1.0) {
            return Err(invalid(format!("locator.dp must be >= 1, got {}", loc.dp)));
        }
        if !(loc.min_dist.is_finite() && loc.min_dist > 0.0) {
            return Err(invalid(format!(
                "locator.min_dist must be > 0, got {}",
                loc.min_dist
            )));
        }
        if !(loc.param1.is_finite() && loc.param1 > 0.0) {
            return Err(invalid(format!("locator.param1 must be > 0, got {}", loc.param1)));
        }
        if !(loc.param2.is_finite() && loc.param2 > 0.0) {
            return Err(invalid(format!("locator.param2 must be > 0, got {}", loc.param2)));
        }
        if loc.max_radius != 0 && loc.min_radius > loc.max_radius {
            return Err(invalid(format!(
                "locator.min_radius ({}) exceeds max_radius ({})",
                loc.min_radius, loc.max_radius
            )));
        }

        let cls = &self.classifier;
        check_odd_kernel("classifier.mask_median_kernel", cls.mask_median_kernel)?;
        if !(0.0..=1.0).contains(&cls.color_ratio_threshold) {
            return Err(invalid(format!(
                "classifier.color_ratio_threshold must be within [0, 1], got {}",
                cls.color_ratio_threshold
            )));
        }
        for color in LampColor::ALL {
            let ranges = cls.ranges.for_color(color);
            if ranges.is_empty() {
                return Err(invalid(format!("no HSV ranges for {}", color.name())));
            }
            for range in ranges {
                if (0..3).any(|c| range.lower[c] > range.upper[c]) {
                    return Err(invalid(format!(
                        "inverted HSV range for {}: {:?} > {:?}",
                        color.name(),
                        range.lower,
                        range.upper
                    )));
                }
                if range.upper[0] > HUE_MAX {
                    return Err(invalid(format!(
                        "hue bound {} for {} exceeds {HUE_MAX}",
                        range.upper[0],
                        color.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_odd_kernel(name: &str, kernel: u32) -> Result<()> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(invalid(format!("{name} must be odd and positive, got {kernel}")));
    }
    Ok(())
}

fn invalid(msg: String) -> DetectError {
    DetectError::InvalidConfig(msg)
}
