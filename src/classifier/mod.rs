//! Per-region lamp color scoring.
//!
//! A region votes only with pixels inside its filled disk that are saturated
//! and bright enough; each reference color's share is measured against the
//! full disk pixel count so dark or washed-out regions stay low for every
//! color regardless of lamp size.

pub mod aggregate;

pub use aggregate::{aggregate, detected_colors, FrameState};

use image::{GrayImage, Luma, Rgb};
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierConfig, ScoringMode};
use crate::frame::HsvFrame;
use crate::locator::CandidateRegion;

/// Reference lamp colors, in tie-break priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LampColor {
    Red,
    Yellow,
    Green,
}

impl LampColor {
    pub const ALL: [LampColor; 3] = [LampColor::Red, LampColor::Yellow, LampColor::Green];

    pub fn name(self) -> &'static str {
        match self {
            LampColor::Red => "red",
            LampColor::Yellow => "yellow",
            LampColor::Green => "green",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LampColor::Red => "RED",
            LampColor::Yellow => "YELLOW",
            LampColor::Green => "GREEN",
        }
    }

    /// Display tint for overlays.
    pub fn tint(self) -> Rgb<u8> {
        match self {
            LampColor::Red => Rgb([255, 0, 0]),
            LampColor::Yellow => Rgb([255, 255, 0]),
            LampColor::Green => Rgb([0, 255, 0]),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Matching-pixel ratio of each reference color within one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorScores {
    pub red: f64,
    pub yellow: f64,
    pub green: f64,
}

impl ColorScores {
    pub fn get(&self, color: LampColor) -> f64 {
        match color {
            LampColor::Red => self.red,
            LampColor::Yellow => self.yellow,
            LampColor::Green => self.green,
        }
    }

    fn from_counts(counts: [u32; 3], total: u32) -> Self {
        let ratio = |c: u32| c as f64 / total as f64;
        Self {
            red: ratio(counts[0]),
            yellow: ratio(counts[1]),
            green: ratio(counts[2]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionVerdict {
    pub region: CandidateRegion,
    pub dominant_color: Option<LampColor>,
    /// Ratio of the winning color; 0 when nothing won.
    pub confidence: f64,
    pub scores: ColorScores,
    /// Pixels of the disk that fall inside the frame.
    pub disk_pixels: u32,
}

impl RegionVerdict {
    fn unlit(region: CandidateRegion, scores: ColorScores, disk_pixels: u32) -> Self {
        Self {
            region,
            dominant_color: None,
            confidence: 0.0,
            scores,
            disk_pixels,
        }
    }
}

pub struct ColorClassifier {
    config: ClassifierConfig,
}

impl ColorClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Score one candidate region of an HSV frame.
    pub fn classify(&self, hsv: &HsvFrame, region: CandidateRegion) -> RegionVerdict {
        let Some(roi) = Roi::around(hsv, region, self.config.mask_median_kernel / 2) else {
            return RegionVerdict::unlit(region, ColorScores::default(), 0);
        };

        let gate = self.vote_gate(hsv, region, &roi);

        let mut total = 0u32;
        let mut counts = [0u32; 3];
        for ry in 0..roi.height {
            for rx in 0..roi.width {
                let (px, py) = (roi.x0 + rx, roi.y0 + ry);
                if !region.contains(px as i32, py as i32) {
                    continue;
                }
                total += 1;
                if gate.get_pixel(rx, ry)[0] == 0 {
                    continue;
                }
                let sample = hsv.get(px, py);
                for color in LampColor::ALL {
                    if self.config.ranges.matches(color, sample) {
                        counts[color.index()] += 1;
                    }
                }
            }
        }

        if total == 0 {
            return RegionVerdict::unlit(region, ColorScores::default(), 0);
        }

        let scores = ColorScores::from_counts(counts, total);
        match select_dominant(counts, total, &self.config) {
            Some((color, ratio)) => RegionVerdict {
                region,
                dominant_color: Some(color),
                confidence: ratio,
                scores,
                disk_pixels: total,
            },
            None => RegionVerdict::unlit(region, scores, total),
        }
    }

    /// Saturation/value gate over the ROI, restricted to the disk and
    /// median-cleaned.
    fn vote_gate(&self, hsv: &HsvFrame, region: CandidateRegion, roi: &Roi) -> GrayImage {
        let (min_s, min_v) = (self.config.min_saturation, self.config.min_value);
        let gate = GrayImage::from_fn(roi.width, roi.height, |rx, ry| {
            let (px, py) = (roi.x0 + rx, roi.y0 + ry);
            if !region.contains(px as i32, py as i32) {
                return Luma([0]);
            }
            let [_, s, v] = hsv.get(px, py);
            Luma([if s >= min_s && v >= min_v { 255 } else { 0 }])
        });

        let radius = self.config.mask_median_kernel / 2;
        if radius > 0 {
            imageproc::filter::median_filter(&gate, radius, radius)
        } else {
            gate
        }
    }
}

/// Pick the winning color from per-color match counts over `total` disk
/// pixels. Exact ties keep the earlier color in [`LampColor::ALL`].
pub(crate) fn select_dominant(
    counts: [u32; 3],
    total: u32,
    config: &ClassifierConfig,
) -> Option<(LampColor, f64)> {
    if total == 0 {
        return None;
    }

    let mut best = LampColor::Red;
    for color in LampColor::ALL {
        if counts[color.index()] > counts[best.index()] {
            best = color;
        }
    }
    let count = counts[best.index()];
    let ratio = count as f64 / total as f64;

    let accepted = match config.scoring {
        ScoringMode::Ratio => count > 0 && ratio >= config.color_ratio_threshold,
        ScoringMode::PixelCount { min_pixels } => count > min_pixels,
    };
    accepted.then_some((best, ratio))
}

/// Bounding box of a disk, padded for the median window and clipped to the
/// frame.
struct Roi {
    x0: u32,
    y0: u32,
    width: u32,
    height: u32,
}

impl Roi {
    fn around(hsv: &HsvFrame, region: CandidateRegion, pad: u32) -> Option<Self> {
        let reach = region.radius as i64 + pad as i64;
        let (w, h) = (hsv.width() as i64, hsv.height() as i64);
        let x0 = (region.x as i64 - reach).max(0);
        let y0 = (region.y as i64 - reach).max(0);
        let x1 = (region.x as i64 + reach).min(w - 1);
        let y1 = (region.y as i64 + reach).min(h - 1);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some(Self {
            x0: x0 as u32,
            y0: y0 as u32,
            width: (x1 - x0 + 1) as u32,
            height: (y1 - y0 + 1) as u32,
        })
    }
}
