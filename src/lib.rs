//! Traffic-light state detection from still frames.
//!
//! Circle candidates come from a Hough gradient vote on the blurred gray
//! frame, each candidate disk is scored against configured HSV ranges, and
//! the lit colors fold into one frame state (STOP, WAIT, GO, TEST or NONE).

pub mod annotate;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod frame;
pub mod locator;
pub mod output;
pub mod pipeline;
pub mod server;

#[cfg(test)]
mod test_utils;

pub use classifier::{FrameState, LampColor, RegionVerdict};
pub use config::DetectorConfig;
pub use error::{DetectError, Result};
pub use locator::CandidateRegion;
pub use pipeline::{Detection, Detector};
