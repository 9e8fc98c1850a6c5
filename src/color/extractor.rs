//! Dominant-color extraction for a single frame.
//!
//! A frame is shrunk to `resize_dim x resize_dim` with a bilinear filter, its
//! pixels are clustered with k-means in RGB space, and every non-empty cluster
//! becomes a [`WeightedColor`] whose weight is the share of pixels it holds.

use std::collections::{BTreeMap, HashMap};

use image::imageops::{self, FilterType};
use kmeans_colors::get_kmeans;
use palette::Srgb;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::color::hex;
use crate::color::palette::{FrameColorSet, WeightedColor};
use crate::error::{PaletteError, PaletteResult};
use crate::media::frame::Frame;

/// What to return when clustering finds fewer distinct colors than requested
/// (but more than one; a uniform frame always yields a single color).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Return the colors that were found, unmodified.
    #[default]
    Keep,
    /// Collapse to the dominant color with weight 1.0.
    Collapse,
}

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub clusters: usize,
    pub resize_dim: u32,
    pub max_iterations: usize,
    /// k-means stops once the score improves by less than this.
    pub convergence: f32,
    pub shortfall: ShortfallPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            clusters: 5,
            resize_dim: 300,
            max_iterations: 20,
            convergence: 1e-4,
            shortfall: ShortfallPolicy::Keep,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorExtractor {
    config: ExtractorConfig,
}

impl ColorExtractor {
    pub fn new(config: ExtractorConfig) -> PaletteResult<Self> {
        if config.clusters == 0 {
            return Err(PaletteError::invalid_parameter("clusters", "must be at least 1"));
        }
        // Cluster labels from kmeans_colors are u8.
        if config.clusters > u8::MAX as usize {
            return Err(PaletteError::invalid_parameter(
                "clusters",
                format!("must be at most {}, got {}", u8::MAX, config.clusters),
            ));
        }
        if config.resize_dim == 0 {
            return Err(PaletteError::invalid_parameter("resize_dim", "must be at least 1"));
        }
        let pixels = config.resize_dim as usize * config.resize_dim as usize;
        if config.clusters > pixels {
            return Err(PaletteError::invalid_parameter(
                "clusters",
                format!(
                    "{} clusters requested but a {}x{} frame only has {} pixels",
                    config.clusters, config.resize_dim, config.resize_dim, pixels
                ),
            ));
        }
        if config.max_iterations == 0 {
            return Err(PaletteError::invalid_parameter("max_iterations", "must be at least 1"));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Cluster `frame` into at most `clusters` weighted colors. `seed` drives
    /// the k-means++ initialization.
    pub fn extract(&self, frame: &Frame, seed: u64) -> PaletteResult<FrameColorSet> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PaletteError::invalid_parameter(
                "frame",
                format!("frame at {}s has no pixels", frame.timestamp),
            ));
        }

        let pixels = self.preprocess(frame);
        let counts = self.cluster(&pixels, seed);
        let total = pixels.len() as f64;

        let mut colors: Vec<WeightedColor> = counts
            .into_iter()
            .map(|(color, count)| WeightedColor::new(color, count as f64 / total))
            .collect();

        let collapse = colors.len() == 1
            || (colors.len() < self.config.clusters
                && self.config.shortfall == ShortfallPolicy::Collapse);
        if collapse {
            let set = FrameColorSet::new(frame.timestamp, colors);
            let dominant = set
                .dominant()
                .map(|c| c.color.clone())
                .unwrap_or_default();
            colors = vec![WeightedColor::new(dominant, 1.0)];
        }

        let set = FrameColorSet::new(frame.timestamp, colors);
        trace!(
            "Frame at {:.3}s -> {} colors, dominant {:?}",
            frame.timestamp,
            set.len(),
            set.dominant().map(|c| c.color.as_str())
        );
        Ok(set)
    }

    /// Resize and flatten into RGB triples.
    fn preprocess(&self, frame: &Frame) -> Vec<[u8; 3]> {
        let dim = self.config.resize_dim;
        let resized = imageops::resize(&frame.image, dim, dim, FilterType::Triangle);
        resized.pixels().map(|p| p.0).collect()
    }

    /// Pixel count per encoded centroid color.
    fn cluster(&self, pixels: &[[u8; 3]], seed: u64) -> BTreeMap<String, usize> {
        let mut histogram: HashMap<[u8; 3], usize> = HashMap::new();
        for pixel in pixels {
            *histogram.entry(*pixel).or_insert(0) += 1;
        }

        // Each distinct color as its own cluster is already the optimum.
        if histogram.len() <= self.config.clusters {
            return histogram
                .into_iter()
                .map(|(rgb, count)| (hex::encode(rgb), count))
                .collect();
        }

        let samples: Vec<Srgb<f32>> = pixels
            .iter()
            .map(|p| Srgb::new(p[0], p[1], p[2]).into_format::<f32>())
            .collect();
        let result = get_kmeans(
            self.config.clusters,
            self.config.max_iterations,
            self.config.convergence,
            false,
            &samples,
            seed,
        );

        let mut members = vec![0usize; result.centroids.len()];
        for &index in &result.indices {
            members[index as usize] += 1;
        }

        // Centroids that round to the same hex color are one color.
        let mut counts = BTreeMap::new();
        for (centroid, count) in result.centroids.iter().zip(members) {
            if count == 0 {
                continue;
            }
            let color = hex::encode_channels([
                centroid.red * 255.0,
                centroid.green * 255.0,
                centroid.blue * 255.0,
            ]);
            *counts.entry(color).or_insert(0) += count;
        }
        counts
    }
}

/// One-shot extraction with default iteration settings.
#[cfg(test)]
pub fn extract(frame: &Frame, k: usize, resize_dim: u32, seed: u64) -> PaletteResult<FrameColorSet> {
    let extractor = ColorExtractor::new(ExtractorConfig {
        clusters: k,
        resize_dim,
        ..ExtractorConfig::default()
    })?;
    extractor.extract(frame, seed)
}
