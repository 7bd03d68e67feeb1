use super::{CaptureSource, FrameRead};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Live camera stream. Stream failures are errors; a frame that fails to
/// decode is a retry.
pub struct WebcamCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    pub fn new(device_index: u32) -> Result<Self> {
        tracing::info!("Initializing camera {}", device_index);

        let index = CameraIndex::Index(device_index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = Camera::new(index, requested)
            .context("Failed to open camera")?;

        camera.open_stream()
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        let (width, height) = (resolution.width(), resolution.height());
        tracing::info!("Camera streaming at {}x{}", width, height);

        Ok(Self {
            camera,
            width,
            height,
        })
    }
}

impl CaptureSource for WebcamCapture {
    fn capture_frame(&mut self) -> Result<FrameRead> {
        let buffer = self
            .camera
            .frame()
            .context("Camera stream failed")?;

        match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => Ok(FrameRead::Frame(decoded)),
            Err(e) => {
                tracing::warn!("Dropping undecodable camera frame: {}", e);
                Ok(FrameRead::Retry)
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
