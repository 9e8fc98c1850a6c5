use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PaletteError, PaletteResult};
use crate::media::frame::Frame;
use crate::storage::workdir::remove_path;
use crate::storage::{artifact, checksum};

/// What a frame sequence was sampled from and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub source: String,
    pub duration: f64,
    pub start: f64,
    pub step: f64,
    pub end: f64,
}

/// On-disk index of a sampled frame sequence. Frame images live as PNG files
/// in a directory named after the manifest's stem, next to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub params: SamplingParams,
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub timestamp: f64,
    /// Path relative to the manifest's directory.
    pub file: PathBuf,
    pub sha256: String,
}

impl FrameManifest {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Writes frames to disk one at a time as they are decoded.
///
/// The manifest only appears once [`FrameWriter::finish`] succeeds. A writer
/// dropped before that removes every file it wrote.
pub struct FrameWriter {
    manifest_path: PathBuf,
    dir_name: PathBuf,
    params: SamplingParams,
    entries: Vec<FrameEntry>,
    finished: bool,
}

impl FrameWriter {
    pub fn create(manifest_path: &Path, params: SamplingParams) -> PaletteResult<Self> {
        let stem = manifest_path
            .file_stem()
            .ok_or_else(|| PaletteError::serialization(manifest_path, "manifest path has no file name"))?;
        let writer = Self {
            manifest_path: manifest_path.to_path_buf(),
            dir_name: PathBuf::from(stem),
            params,
            entries: Vec::new(),
            finished: false,
        };

        // Frames of an earlier run must not mix with this one.
        writer.remove_output()?;
        fs::create_dir_all(writer.base().join(&writer.dir_name))?;
        Ok(writer)
    }

    fn base(&self) -> &Path {
        self.manifest_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn write(&mut self, frame: &Frame) -> PaletteResult<()> {
        let file = self
            .dir_name
            .join(format!("frame_{:05}.png", self.entries.len()));
        let full = self.base().join(&file);
        frame
            .image
            .save_with_format(&full, ImageFormat::Png)
            .map_err(|e| PaletteError::serialization(&full, format!("failed to encode frame: {e}")))?;
        self.entries.push(FrameEntry {
            timestamp: frame.timestamp,
            sha256: checksum::calculate_hash(&full)?,
            file,
        });
        Ok(())
    }

    /// Write the manifest that makes the sequence loadable.
    pub fn finish(mut self) -> PaletteResult<FrameManifest> {
        let manifest = FrameManifest {
            params: self.params.clone(),
            frames: std::mem::take(&mut self.entries),
        };
        artifact::save(&manifest, &self.manifest_path)?;
        self.finished = true;
        debug!(
            "Saved {} frames under {:?}",
            manifest.len(),
            self.base().join(&self.dir_name)
        );
        Ok(manifest)
    }

    fn remove_output(&self) -> std::io::Result<()> {
        remove_path(&self.base().join(&self.dir_name))?;
        remove_path(&checksum::sidecar_path(&self.manifest_path))?;
        remove_path(&self.manifest_path)
    }
}

impl Drop for FrameWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.remove_output() {
            Ok(()) => debug!("Discarded partial frames of {:?}", self.manifest_path),
            Err(e) => warn!("Failed to discard partial frames of {:?}: {}", self.manifest_path, e),
        }
    }
}

pub fn load_manifest(manifest_path: &Path) -> PaletteResult<FrameManifest> {
    artifact::load(manifest_path)
}

/// Decode one manifest entry, verifying its checksum first.
pub fn load_frame(manifest_path: &Path, entry: &FrameEntry) -> PaletteResult<Frame> {
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let full = base.join(&entry.file);
    checksum::verify_digest(&full, &entry.sha256)?;

    let image = image::open(&full)
        .map_err(|e| PaletteError::serialization(&full, format!("failed to decode frame: {e}")))?
        .to_rgb8();
    Ok(Frame::new(entry.timestamp, image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn params() -> SamplingParams {
        SamplingParams {
            source: "clip.mp4".to_string(),
            duration: 6.5,
            start: 0.0,
            step: 2.0,
            end: 6.0,
        }
    }

    fn frames() -> Vec<Frame> {
        (0..3)
            .map(|i| {
                let image = RgbImage::from_fn(5, 4, |x, y| Rgb([x as u8 * 40, y as u8 * 60, i as u8 * 100]));
                Frame::new(i as f64 * 2.0, image)
            })
            .collect()
    }

    fn write_all(frames: &[Frame], manifest_path: &Path) -> PaletteResult<FrameManifest> {
        let mut writer = FrameWriter::create(manifest_path, params())?;
        for frame in frames {
            writer.write(frame)?;
        }
        writer.finish()
    }

    fn load_all(manifest_path: &Path) -> PaletteResult<Vec<Frame>> {
        let manifest = load_manifest(manifest_path)?;
        manifest
            .frames
            .iter()
            .map(|entry| load_frame(manifest_path, entry))
            .collect()
    }

    #[test]
    fn test_frames_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("clip_frames.json");
        let original = frames();

        let manifest = write_all(&original, &manifest_path).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.params, params());
        assert!(dir.path().join("clip_frames").join("frame_00002.png").is_file());

        assert_eq!(load_manifest(&manifest_path).unwrap(), manifest);
        assert_eq!(load_all(&manifest_path).unwrap(), original);
    }

    #[test]
    fn test_tampered_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("clip_frames.json");
        let manifest = write_all(&frames(), &manifest_path).unwrap();

        let victim = dir.path().join(&manifest.frames[1].file);
        RgbImage::new(5, 4).save(&victim).unwrap();

        let err = load_all(&manifest_path).unwrap_err();
        assert!(matches!(err, PaletteError::Serialization { .. }));
    }

    #[test]
    fn test_empty_sequence_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("empty_frames.json");
        write_all(&[], &manifest_path).unwrap();
        assert!(load_all(&manifest_path).unwrap().is_empty());
    }

    #[test]
    fn test_unfinished_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("clip_frames.json");
        {
            let mut writer = FrameWriter::create(&manifest_path, params()).unwrap();
            for frame in &frames()[..2] {
                writer.write(frame).unwrap();
            }
            assert!(dir.path().join("clip_frames").join("frame_00001.png").is_file());
        }
        assert!(!dir.path().join("clip_frames").exists());
        assert!(!manifest_path.exists());
    }

    #[test]
    fn test_new_writer_replaces_earlier_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("clip_frames.json");
        write_all(&frames(), &manifest_path).unwrap();

        let writer = FrameWriter::create(&manifest_path, params()).unwrap();
        assert!(!manifest_path.exists());
        assert!(!checksum::sidecar_path(&manifest_path).exists());
        assert!(!dir.path().join("clip_frames").join("frame_00000.png").exists());
        drop(writer);
    }
}
