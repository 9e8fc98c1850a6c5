use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::RgbImage;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PaletteError, PaletteResult};
use crate::media::frame::{Frame, FrameSource};
use crate::media::mimetype;
use crate::utils::config::ToolPaths;

/// Frame source backed by the `ffprobe` and `ffmpeg` executables.
///
/// The video is probed once on open; every `frame_at` call spawns one ffmpeg
/// process that seeks to the timestamp and emits a single raw RGB24 frame.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    tools: ToolPaths,
    width: u32,
    height: u32,
    duration: f64,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

impl FfmpegSource {
    pub fn open(path: &Path, tools: ToolPaths) -> PaletteResult<Self> {
        if !path.is_file() {
            return Err(PaletteError::source_read(path, "file does not exist"));
        }

        let media_type = mimetype::detect_mimetype(path)?;
        if !mimetype::could_be_video(&media_type) {
            return Err(PaletteError::source_read(
                path,
                format!("expected a video file, detected '{media_type}'"),
            ));
        }

        let out = Command::new(&tools.ffprobe)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| PaletteError::source_read(path, format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(PaletteError::source_read(
                path,
                format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            ));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| PaletteError::source_read(path, format!("ffprobe json parse failed: {e}")))?;
        let (width, height, duration) = read_probe(&parsed).map_err(|reason| PaletteError::source_read(path, reason))?;

        debug!(
            "Probed {:?}: {}x{}, {:.3}s ({})",
            path, width, height, duration, media_type
        );

        Ok(Self {
            path: path.to_path_buf(),
            tools,
            width,
            height,
            duration,
        })
    }
}

fn read_probe(probe: &ProbeOut) -> Result<(u32, u32, f64), String> {
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or("no video stream found")?;
    let width = video.width.ok_or("missing video width from ffprobe")?;
    let height = video.height.ok_or("missing video height from ffprobe")?;
    if width == 0 || height == 0 {
        return Err(format!("video stream has empty dimensions {width}x{height}"));
    }

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .ok_or("missing container duration from ffprobe")?
        .parse::<f64>()
        .map_err(|e| format!("unparsable duration: {e}"))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(format!("invalid duration {duration}"));
    }

    Ok((width, height, duration))
}

impl FrameSource for FfmpegSource {
    fn duration(&self) -> PaletteResult<f64> {
        Ok(self.duration)
    }

    fn frame_at(&self, timestamp: f64) -> PaletteResult<Frame> {
        // Scale to the probed size so rotation metadata cannot change the byte count.
        let mut child = Command::new(&self.tools.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{timestamp:.6}")])
            .arg("-i")
            .arg(&self.path)
            .args([
                "-frames:v",
                "1",
                "-vf",
                &format!("scale={}:{}", self.width, self.height),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PaletteError::source_read(&self.path, format!("failed to spawn ffmpeg: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PaletteError::source_read(&self.path, "failed to open ffmpeg stdout"))?;
        let mut buffer = Vec::new();
        stdout
            .read_to_end(&mut buffer)
            .map_err(|e| PaletteError::source_read(&self.path, format!("failed to read ffmpeg output: {e}")))?;

        let status = child
            .wait()
            .map_err(|e| PaletteError::source_read(&self.path, format!("failed to wait on ffmpeg: {e}")))?;
        if !status.success() {
            return Err(PaletteError::source_read(
                &self.path,
                format!("ffmpeg exited with {status} at {timestamp}s"),
            ));
        }

        let expected = self.width as usize * self.height as usize * 3;
        if buffer.len() != expected {
            return Err(PaletteError::source_read(
                &self.path,
                format!(
                    "ffmpeg returned {} bytes at {timestamp}s, expected {expected}",
                    buffer.len()
                ),
            ));
        }

        let image = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            PaletteError::source_read(&self.path, "failed to build frame buffer from ffmpeg output")
        })?;
        Ok(Frame::new(timestamp, image))
    }

    fn id(&self) -> String {
        format!("{} ({}x{})", self.path.display(), self.width, self.height)
    }
}
