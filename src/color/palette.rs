use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A dominant color and the fraction of the frame's pixels it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedColor {
    pub color: String,
    pub weight: f64,
}

impl WeightedColor {
    pub fn new(color: impl Into<String>, weight: f64) -> Self {
        Self {
            color: color.into(),
            weight,
        }
    }
}

/// Heaviest first; equal weights fall back to the hex string so the order is stable.
pub fn by_weight_desc(a: &WeightedColor, b: &WeightedColor) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.color.cmp(&b.color))
}

/// Weighted dominant colors of the frame sampled at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameColorSet {
    pub timestamp: f64,
    colors: Vec<WeightedColor>,
}

impl FrameColorSet {
    /// Builds a set, sorting `colors` into canonical order.
    pub fn new(timestamp: f64, mut colors: Vec<WeightedColor>) -> Self {
        colors.sort_by(by_weight_desc);
        Self { timestamp, colors }
    }

    pub fn colors(&self) -> &[WeightedColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn dominant(&self) -> Option<&WeightedColor> {
        self.colors.first()
    }

    pub fn total_weight(&self) -> f64 {
        self.colors.iter().map(|c| c.weight).sum()
    }
}

/// Per-frame color sets of a whole video, in ascending time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    frames: Vec<FrameColorSet>,
}

impl Palette {
    pub fn new(frames: Vec<FrameColorSet>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[FrameColorSet] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
