use image::RgbImage;

use crate::error::PaletteResult;

/// A decoded video frame: an RGB pixel grid and the timestamp it was taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: f64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(timestamp: f64, image: RgbImage) -> Self {
        Self { timestamp, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Anything that can hand out frames of a video by timestamp.
pub trait FrameSource {
    /// Length of the video in seconds.
    fn duration(&self) -> PaletteResult<f64>;

    /// Decode the frame shown at `timestamp` seconds.
    fn frame_at(&self, timestamp: f64) -> PaletteResult<Frame>;

    /// Describes the video being decoded. Recorded with sampled frames so
    /// they are never reused for a different input.
    fn id(&self) -> String;
}
