use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LampColor, RegionVerdict};

/// Frame-level signal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameState {
    Stop,
    Wait,
    Go,
    /// Every lamp lit at once (bench fixture or lamp test).
    Test,
    /// No lit lamp found.
    None,
}

impl FrameState {
    /// Red outranks yellow outranks green so an ambiguous frame reports the
    /// conservative state.
    pub fn from_colors(colors: &BTreeSet<LampColor>) -> Self {
        if LampColor::ALL.iter().all(|c| colors.contains(c)) {
            FrameState::Test
        } else if colors.contains(&LampColor::Red) {
            FrameState::Stop
        } else if colors.contains(&LampColor::Yellow) {
            FrameState::Wait
        } else if colors.contains(&LampColor::Green) {
            FrameState::Go
        } else {
            FrameState::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameState::Stop => "STOP",
            FrameState::Wait => "WAIT",
            FrameState::Go => "GO",
            FrameState::Test => "TEST",
            FrameState::None => "NONE",
        }
    }

    /// Human-facing status line.
    pub fn status_message(self) -> &'static str {
        match self {
            FrameState::None => "NO LIGHT DETECTED",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distinct dominant colors across verdicts, in priority order.
pub fn detected_colors(verdicts: &[RegionVerdict]) -> Vec<LampColor> {
    color_set(verdicts).into_iter().collect()
}

/// Collapse per-region verdicts into the frame state.
pub fn aggregate(verdicts: &[RegionVerdict]) -> FrameState {
    FrameState::from_colors(&color_set(verdicts))
}

fn color_set(verdicts: &[RegionVerdict]) -> BTreeSet<LampColor> {
    verdicts.iter().filter_map(|v| v.dominant_color).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ColorScores;
    use crate::locator::CandidateRegion;

    fn verdict(color: Option<LampColor>) -> RegionVerdict {
        RegionVerdict {
            region: CandidateRegion::new(0, 0, 10),
            dominant_color: color,
            confidence: if color.is_some() { 0.8 } else { 0.0 },
            scores: ColorScores::default(),
            disk_pixels: 317,
        }
    }

    #[test]
    fn empty_and_unlit_frames_are_none() {
        assert_eq!(aggregate(&[]), FrameState::None);
        assert_eq!(aggregate(&[verdict(None), verdict(None)]), FrameState::None);
    }

    #[test]
    fn single_colors_map_to_states() {
        assert_eq!(aggregate(&[verdict(Some(LampColor::Red))]), FrameState::Stop);
        assert_eq!(aggregate(&[verdict(Some(LampColor::Yellow))]), FrameState::Wait);
        assert_eq!(aggregate(&[verdict(Some(LampColor::Green))]), FrameState::Go);
    }

    #[test]
    fn red_beats_green_regardless_of_order_or_count() {
        let frame = [
            verdict(Some(LampColor::Green)),
            verdict(Some(LampColor::Green)),
            verdict(Some(LampColor::Red)),
            verdict(None),
        ];
        assert_eq!(aggregate(&frame), FrameState::Stop);
    }

    #[test]
    fn yellow_beats_green() {
        let frame = [verdict(Some(LampColor::Green)), verdict(Some(LampColor::Yellow))];
        assert_eq!(aggregate(&frame), FrameState::Wait);
    }

    #[test]
    fn all_three_is_test() {
        let frame = [
            verdict(Some(LampColor::Yellow)),
            verdict(Some(LampColor::Green)),
            verdict(Some(LampColor::Red)),
        ];
        assert_eq!(aggregate(&frame), FrameState::Test);
        assert_eq!(
            detected_colors(&frame),
            vec![LampColor::Red, LampColor::Yellow, LampColor::Green]
        );
    }

    #[test]
    fn status_text() {
        assert_eq!(FrameState::None.status_message(), "NO LIGHT DETECTED");
        assert_eq!(FrameState::Stop.status_message(), "STOP");
        assert_eq!(FrameState::Go.to_string(), "GO");
        assert_eq!(serde_json::to_string(&FrameState::Wait).unwrap(), "\"WAIT\"");
    }
}
