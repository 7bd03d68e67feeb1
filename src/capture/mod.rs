mod image_sequence;
#[cfg(feature = "camera")]
mod v4l_capture;

pub use image_sequence::ImageSequence;
#[cfg(feature = "camera")]
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::{imageops, RgbImage};

/// Outcome of asking a source for its next frame. Hard failures are `Err`.
#[derive(Debug)]
pub enum FrameRead {
    Frame(RgbImage),
    /// Nothing usable this time; asking again may succeed.
    Retry,
    EndOfStream,
}

/// Trait for frame sources
pub trait CaptureSource {
    /// Fetch the next frame
    fn capture_frame(&mut self) -> Result<FrameRead>;

    /// Resolution of the most recent frame, `(0, 0)` before the first one
    fn resolution(&self) -> (u32, u32);
}

/// Scale `frame` to `width` pixels wide, keeping its aspect ratio.
/// A width of 0 or the frame's own width returns it unchanged.
pub fn fit_width(frame: RgbImage, width: u32) -> RgbImage {
    let (w, h) = frame.dimensions();
    if width == 0 || w == 0 || w == width {
        return frame;
    }
    let height = ((width as u64 * h as u64) / w as u64).max(1) as u32;
    imageops::resize(&frame, width, height, imageops::FilterType::Triangle)
}
