mod snapshot;

pub use snapshot::DirectorySink;

use anyhow::Result;
use image::RgbImage;

use crate::pipeline::Detection;

/// Trait for presentation destinations of annotated frames
pub trait OutputSink {
    /// Deliver one annotated frame together with its detection
    fn write_frame(&mut self, frame: &RgbImage, detection: &Detection) -> Result<()>;
}
