use super::OutputSink;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::pipeline::Detection;

/// Writes every `every`-th annotated frame as a numbered JPEG, with the
/// detection beside it as JSON.
pub struct DirectorySink {
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P, every: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        tracing::info!("Saving annotated frames to {} (every {})", dir.display(), every.max(1));

        Ok(Self {
            dir,
            every: every.max(1),
            seen: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for DirectorySink {
    fn write_frame(&mut self, frame: &RgbImage, detection: &Detection) -> Result<()> {
        self.seen += 1;
        if (self.seen - 1) % self.every != 0 {
            return Ok(());
        }

        let stem = format!("frame_{:06}", self.seen);
        let image_path = self.dir.join(format!("{stem}.jpg"));
        frame
            .save(&image_path)
            .with_context(|| format!("Failed to write {}", image_path.display()))?;

        let json_path = self.dir.join(format!("{stem}.json"));
        let file = File::create(&json_path)
            .with_context(|| format!("Failed to create {}", json_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, detection)
            .with_context(|| format!("Failed to write {}", json_path.display()))?;
        writer.flush()?;

        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FrameState;

    #[test]
    fn writes_every_nth_frame_with_sidecar() {
        let dir = std::env::temp_dir().join(format!("lampwatch-sink-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut sink = DirectorySink::new(&dir, 2).unwrap();
        let frame = RgbImage::new(16, 16);
        let detection = Detection::from_verdicts(Vec::new());
        for _ in 0..3 {
            sink.write_frame(&frame, &detection).unwrap();
        }

        assert_eq!(sink.written(), 2);
        assert!(dir.join("frame_000001.jpg").is_file());
        assert!(!dir.join("frame_000002.jpg").exists());
        assert!(dir.join("frame_000003.jpg").is_file());

        let text = std::fs::read_to_string(dir.join("frame_000003.json")).unwrap();
        let restored: Detection = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.state, FrameState::None);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
