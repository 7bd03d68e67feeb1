use super::{CaptureSource, FrameRead};
use anyhow::{bail, Context, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// Still images read in file-name order from a directory (or a single file),
/// optionally looping back to the first one at the end.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
    width: u32,
    height: u32,
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(path: P, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening image source {}", path.display());

        let paths = if path.is_dir() {
            let mut paths: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to list {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && ImageFormat::from_path(p).is_ok())
                .collect();
            paths.sort();
            paths
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            bail!("Image source {} does not exist", path.display());
        };

        if paths.is_empty() {
            bail!("No image files found in {}", path.display());
        }
        tracing::info!("Image source has {} frames (loop={})", paths.len(), looping);

        Ok(Self {
            paths,
            next: 0,
            looping,
            width: 0,
            height: 0,
        })
    }
}

impl CaptureSource for ImageSequence {
    fn capture_frame(&mut self) -> Result<FrameRead> {
        if self.next >= self.paths.len() {
            if !self.looping {
                return Ok(FrameRead::EndOfStream);
            }
            tracing::debug!("Image source rewinding");
            self.next = 0;
        }

        let path = &self.paths[self.next];
        self.next += 1;

        match image::open(path) {
            Ok(decoded) => {
                let frame = decoded.to_rgb8();
                (self.width, self.height) = frame.dimensions();
                Ok(FrameRead::Frame(frame))
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable frame {}: {}", path.display(), e);
                Ok(FrameRead::Retry)
            }
        }
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
