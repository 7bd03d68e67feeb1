//! One frame in, one detection out.
//!
//! The detector holds only its immutable configuration; every call allocates
//! its own working buffers, so one instance can serve concurrent callers.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::annotate::{annotate_frame, AnnotateOptions};
use crate::classifier::{self, ColorClassifier, FrameState, LampColor, RegionVerdict};
use crate::config::DetectorConfig;
use crate::error::{DetectError, Result};
use crate::frame::HsvFrame;
use crate::locator::{CandidateRegion, RegionLocator};

/// Result of running the pipeline on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub state: FrameState,
    /// Distinct dominant colors, in priority order.
    pub detected_colors: Vec<LampColor>,
    /// One verdict per candidate region, lit or not.
    pub verdicts: Vec<RegionVerdict>,
}

impl Detection {
    pub fn from_verdicts(verdicts: Vec<RegionVerdict>) -> Self {
        Self {
            state: classifier::aggregate(&verdicts),
            detected_colors: classifier::detected_colors(&verdicts),
            verdicts,
        }
    }

    /// Verdicts that found a lit lamp.
    pub fn lit(&self) -> impl Iterator<Item = &RegionVerdict> {
        self.verdicts.iter().filter(|v| v.dominant_color.is_some())
    }
}

pub struct Detector {
    config: DetectorConfig,
    locator: RegionLocator,
    classifier: ColorClassifier,
}

impl Detector {
    /// Validates `config`; a malformed bundle is an error, never a silent
    /// "nothing detected".
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            locator: RegionLocator::new(config.locator.clone()),
            classifier: ColorClassifier::new(config.classifier.clone()),
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Locate candidate lamps and classify them.
    pub fn detect(&self, frame: &RgbImage) -> Result<Detection> {
        check_frame(frame)?;
        let regions = self.locator.locate(frame);
        self.classify_regions(frame, &regions)
    }

    /// Classify caller-supplied regions, skipping the circle locator.
    pub fn classify_regions(&self, frame: &RgbImage, regions: &[CandidateRegion]) -> Result<Detection> {
        check_frame(frame)?;
        let _span = tracing::debug_span!("classify", regions = regions.len()).entered();

        let hsv = HsvFrame::from_rgb(frame);
        let verdicts: Vec<RegionVerdict> = regions
            .iter()
            .map(|&region| self.classifier.classify(&hsv, region))
            .collect();

        let detection = Detection::from_verdicts(verdicts);
        tracing::debug!(
            state = %detection.state,
            regions = detection.verdicts.len(),
            lit = detection.lit().count(),
            "frame classified"
        );
        Ok(detection)
    }

    /// Detect and draw the overlay on a copy of the frame.
    pub fn process(&self, frame: &RgbImage, options: &AnnotateOptions) -> Result<(RgbImage, Detection)> {
        let detection = self.detect(frame)?;
        let annotated = annotate_frame(frame, &detection, options);
        Ok((annotated, detection))
    }
}

fn check_frame(frame: &RgbImage) -> Result<()> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::EmptyFrame { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HsvRange, LocatorConfig};
    use crate::test_utils::{draw_disks_rgb, GRAY, GREEN, RED, YELLOW};

    fn bench_config() -> DetectorConfig {
        DetectorConfig {
            locator: LocatorConfig {
                dp: 1.0,
                min_dist: 30.0,
                param1: 100.0,
                param2: 20.0,
                min_radius: 8,
                max_radius: 40,
                ..LocatorConfig::default()
            },
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn blank_frame_is_none_and_unannotated() {
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let frame = RgbImage::from_pixel(160, 120, image::Rgb(GRAY));
        let (annotated, detection) = detector.process(&frame, &AnnotateOptions::default()).unwrap();
        assert_eq!(detection.state, FrameState::None);
        assert!(detection.verdicts.is_empty());
        assert!(detection.detected_colors.is_empty());
        assert_eq!(annotated, frame);
    }

    #[test]
    fn red_disk_on_gray_is_stop() {
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let frame = draw_disks_rgb(120, 120, GRAY, &[((60, 60, 25), RED)]);
        let detection = detector
            .classify_regions(&frame, &[CandidateRegion::new(60, 60, 25)])
            .unwrap();
        assert_eq!(detection.state, FrameState::Stop);
        assert_eq!(detection.verdicts[0].dominant_color, Some(LampColor::Red));
        assert!(detection.verdicts[0].confidence > 0.95);
    }

    #[test]
    fn red_and_green_lamps_report_stop() {
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let frame = draw_disks_rgb(200, 80, GRAY, &[((40, 40, 20), GREEN), ((140, 40, 20), RED)]);
        let regions = [CandidateRegion::new(40, 40, 20), CandidateRegion::new(140, 40, 20)];
        let detection = detector.classify_regions(&frame, &regions).unwrap();
        assert_eq!(detection.state, FrameState::Stop);
        assert_eq!(detection.detected_colors, vec![LampColor::Red, LampColor::Green]);
    }

    #[test]
    fn all_three_lamps_report_test() {
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let frame = draw_disks_rgb(
            80,
            240,
            GRAY,
            &[((40, 40, 20), RED), ((40, 120, 20), YELLOW), ((40, 200, 20), GREEN)],
        );
        let regions = [
            CandidateRegion::new(40, 40, 20),
            CandidateRegion::new(40, 120, 20),
            CandidateRegion::new(40, 200, 20),
        ];
        let detection = detector.classify_regions(&frame, &regions).unwrap();
        assert_eq!(detection.state, FrameState::Test);
    }

    #[test]
    fn signal_head_end_to_end() {
        // Dark housing, red lit, yellow and green dimmed.
        let frame = draw_disks_rgb(
            100,
            170,
            [0, 0, 0],
            &[
                ((50, 35, 15), RED),
                ((50, 85, 15), [60, 50, 0]),
                ((50, 135, 15), [0, 50, 0]),
            ],
        );
        let detector = Detector::new(bench_config()).unwrap();
        let (annotated, detection) = detector.process(&frame, &AnnotateOptions::default()).unwrap();
        assert_eq!(detection.state, FrameState::Stop, "{detection:?}");
        let lit: Vec<_> = detection.lit().collect();
        assert_eq!(lit.len(), 1);
        let region = lit[0].region;
        assert!((region.x - 50).abs() <= 2 && (region.y - 35).abs() <= 2, "{region:?}");
        assert_ne!(annotated, frame);
    }

    #[test]
    fn standard_profile_reads_hard_edged_signal_head() {
        let frame = draw_disks_rgb(
            120,
            260,
            [0, 0, 0],
            &[
                ((60, 50, 25), RED),
                ((60, 130, 25), [60, 50, 0]),
                ((60, 210, 25), [0, 50, 0]),
            ],
        );
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let detection = detector.detect(&frame).unwrap();
        assert_eq!(detection.state, FrameState::Stop, "{detection:?}");
        let lit: Vec<_> = detection.lit().collect();
        assert_eq!(lit.len(), 1, "{detection:?}");
        let region = lit[0].region;
        assert!((region.x - 60).abs() <= 2 && (region.y - 50).abs() <= 2, "{region:?}");
        assert!((region.radius as i32 - 25).abs() <= 2, "{region:?}");
    }

    #[test]
    fn standard_profile_reads_two_hard_edged_lamps() {
        let frame = draw_disks_rgb(
            230,
            120,
            [0, 0, 0],
            &[((60, 60, 30), YELLOW), ((170, 60, 30), GREEN)],
        );
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let detection = detector.detect(&frame).unwrap();
        assert_eq!(detection.state, FrameState::Wait, "{detection:?}");
        assert_eq!(detection.detected_colors, vec![LampColor::Yellow, LampColor::Green]);
    }

    #[test]
    fn standard_profile_reads_soft_edged_lamps() {
        let sharp = draw_disks_rgb(
            230,
            120,
            [0, 0, 0],
            &[((60, 60, 25), GREEN), ((170, 60, 25), YELLOW)],
        );
        let frame = imageproc::filter::gaussian_blur_f32(&sharp, 1.5);
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let detection = detector.detect(&frame).unwrap();
        assert_eq!(detection.state, FrameState::Wait, "{detection:?}");
        assert_eq!(detection.lit().count(), 2, "{detection:?}");
    }

    #[test]
    fn detection_is_repeatable() {
        let detector = Detector::new(bench_config()).unwrap();
        let frame = draw_disks_rgb(
            160,
            100,
            [10, 10, 10],
            &[((40, 50, 18), GREEN), ((110, 50, 18), YELLOW)],
        );
        let first = detector.detect(&frame).unwrap();
        let second = detector.detect(&frame).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_config_is_an_error_not_none() {
        let mut config = DetectorConfig::standard();
        config.classifier.ranges.red = vec![HsvRange::new([10, 0, 0], [0, 255, 255])];
        assert!(matches!(Detector::new(config), Err(DetectError::InvalidConfig(_))));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let detector = Detector::new(DetectorConfig::standard()).unwrap();
        let err = detector.detect(&RgbImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, DetectError::EmptyFrame { .. }));
    }
}
