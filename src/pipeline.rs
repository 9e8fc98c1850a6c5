//! Stage orchestration: sample -> extract -> select -> compose.
//!
//! Every stage reads the artifact the previous one left in the working
//! directory, so any stage can be re-run on its own without touching the video
//! again.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::color::extractor::{ColorExtractor, ExtractorConfig, ShortfallPolicy};
use crate::color::frame_seed;
use crate::color::palette::{FrameColorSet, Palette};
use crate::color::selector::{self, SelectionMode};
use crate::compose::canvas::{Canvas, RasterCanvas};
use crate::compose::composer;
use crate::error::{PaletteError, PaletteResult};
use crate::media::frame::FrameSource;
use crate::sampling::sampler;
use crate::storage::frames::{self, FrameManifest, FrameWriter, SamplingParams};
use crate::storage::workdir::WorkDir;
use crate::storage::{artifact, checksum};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where intermediate artifacts are written.
    pub work_dir: PathBuf,
    /// Remove this run's artifacts once the pipeline is dropped.
    pub delete_after: bool,
    /// Skip stages whose artifact already exists, verifies and was produced
    /// with the same settings.
    pub reuse_artifacts: bool,
    pub start: f64,
    pub step: f64,
    pub extractor: ExtractorConfig,
    pub mode: SelectionMode,
    pub seed: u64,
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub pixels_per_unit: u32,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            delete_after: false,
            reuse_artifacts: false,
            start: 0.0,
            step: 1.0,
            extractor: ExtractorConfig::default(),
            mode: SelectionMode::Sample,
            seed: 0,
            canvas_width: 1000.0,
            canvas_height: 250.0,
            pixels_per_unit: 1,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Init,
    Sampled { frames: PathBuf },
    Extracted { palette: PathBuf },
    Selected { colors: Vec<String> },
    Composed { output: PathBuf },
}

/// Everything a palette depends on. `frames_sha256` is the digest of the frame
/// manifest, which in turn records the source and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub frames_sha256: String,
    pub clusters: usize,
    pub resize_dim: u32,
    pub max_iterations: usize,
    pub convergence: f64,
    pub shortfall: ShortfallPolicy,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ColorsArtifact {
    params: ExtractionParams,
    palette: Palette,
}

/// Read the palette written by [`Pipeline::extract_colors`].
pub fn load_palette(path: &Path) -> PaletteResult<Palette> {
    let stored: ColorsArtifact = artifact::load(path)?;
    Ok(stored.palette)
}

pub struct Pipeline<S: FrameSource> {
    source: S,
    name: String,
    config: PipelineConfig,
    extractor: ColorExtractor,
    duration: f64,
    end_time: f64,
    stage: Stage,
    frames_path: PathBuf,
    palette_path: PathBuf,
    work: WorkDir,
}

impl<S: FrameSource> Pipeline<S> {
    /// Validates every numeric argument up front, so bad input fails before
    /// any frame is decoded. `name` prefixes the artifact file names.
    pub fn new(source: S, name: impl Into<String>, config: PipelineConfig) -> Result<Self> {
        let name = name.into();
        let extractor = ColorExtractor::new(config.extractor.clone())?;

        let duration = source
            .duration()
            .with_context(|| format!("failed to read duration of '{name}'"))?;
        let end_time = sampler::end_time(&source)?;
        sampler::timestamps(config.start, config.step, end_time)?;

        RasterCanvas::new(config.canvas_width, config.canvas_height)?;
        if config.pixels_per_unit == 0 {
            return Err(PaletteError::invalid_parameter("scale", "must be at least 1").into());
        }

        let mut work = WorkDir::create(&config.work_dir, config.delete_after)
            .with_context(|| format!("failed to create working directory {:?}", config.work_dir))?;
        let frames_path = work.claim_artifact(format!("{name}_frames.json"));
        // Frame images go in a directory named after the manifest stem.
        work.claim(format!("{name}_frames"));
        let palette_path = work.claim_artifact(format!("{name}_colors.json"));

        Ok(Self {
            source,
            name,
            config,
            extractor,
            duration,
            end_time,
            stage: Stage::Init,
            frames_path,
            palette_path,
            work,
        })
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn frames_path(&self) -> &Path {
        &self.frames_path
    }

    pub fn palette_path(&self) -> &Path {
        &self.palette_path
    }

    fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            source: self.source.id(),
            duration: self.duration,
            start: self.config.start,
            step: self.config.step,
            end: self.end_time,
        }
    }

    fn extraction_params(&self, frames_path: &Path) -> PaletteResult<ExtractionParams> {
        let cfg = self.extractor.config();
        Ok(ExtractionParams {
            frames_sha256: checksum::calculate_hash(frames_path)?,
            clusters: cfg.clusters,
            resize_dim: cfg.resize_dim,
            max_iterations: cfg.max_iterations,
            convergence: cfg.convergence as f64,
            shortfall: cfg.shortfall,
            seed: self.config.seed,
        })
    }

    /// Decode frames and persist them as they arrive. Returns the frame
    /// manifest path. On failure nothing of this stage is left on disk.
    pub fn sample_frames(&mut self) -> Result<PathBuf> {
        info!("Start converting '{}' to frames...", self.name);
        let progress = self.progress_bar("frames");
        let path = self.frames_path.clone();

        let mut writer = FrameWriter::create(&path, self.sampling_params())
            .with_context(|| format!("sampling stage failed to prepare {path:?}"))?;
        sampler::sample(
            &self.source,
            self.config.start,
            self.config.step,
            self.end_time,
            &progress,
            |frame| writer.write(&frame),
        )
        .with_context(|| format!("sampling stage failed for '{}'", self.name))?;
        let manifest = writer
            .finish()
            .with_context(|| format!("sampling stage failed to persist frames to {path:?}"))?;
        info!("Saved {} frames into {:?}", manifest.len(), path);

        self.stage = Stage::Sampled {
            frames: path.clone(),
        };
        Ok(path)
    }

    /// Cluster every persisted frame. Returns the palette artifact path.
    pub fn extract_colors(&mut self, frames_path: &Path) -> Result<PathBuf> {
        let cfg = self.extractor.config();
        info!(
            "Start extracting colors from {:?} (clusters: {}, resize to: {})",
            frames_path, cfg.clusters, cfg.resize_dim
        );
        let params = self
            .extraction_params(frames_path)
            .with_context(|| format!("extraction stage failed to read {frames_path:?}"))?;
        let palette = self
            .extract_palette(frames_path)
            .with_context(|| format!("extraction stage failed for {frames_path:?}"))?;
        let frame_count = palette.len();

        let path = self.palette_path.clone();
        artifact::save(&ColorsArtifact { params, palette }, &path)
            .with_context(|| format!("extraction stage failed to persist palette to {path:?}"))?;
        info!("Colors for {} frames saved into {:?}", frame_count, path);

        self.stage = Stage::Extracted {
            palette: path.clone(),
        };
        Ok(path)
    }

    fn extract_palette(&self, frames_path: &Path) -> PaletteResult<Palette> {
        let manifest = frames::load_manifest(frames_path)?;
        if manifest.is_empty() {
            return Err(PaletteError::EmptyPalette);
        }

        let progress = self.progress_bar("frames");
        progress.set_length(manifest.len() as u64);

        let extractor = &self.extractor;
        let seed = self.config.seed;
        // Collecting an indexed parallel iterator keeps time order.
        let sets = manifest
            .frames
            .par_iter()
            .enumerate()
            .map(|(i, entry)| -> PaletteResult<FrameColorSet> {
                let frame = frames::load_frame(frames_path, entry)?;
                let set = extractor.extract(&frame, frame_seed(seed, i))?;
                progress.inc(1);
                Ok(set)
            })
            .collect::<PaletteResult<Vec<FrameColorSet>>>()?;
        progress.finish();

        for set in &sets {
            debug!(
                "Frame at {:.3}s: {} colors, total weight {:.6}",
                set.timestamp,
                set.len(),
                set.total_weight()
            );
        }
        Ok(Palette::new(sets))
    }

    /// Reduce each frame of a persisted palette to one color.
    pub fn select_colors(&mut self, palette_path: &Path) -> Result<Vec<String>> {
        info!("Choosing colors from {:?}, mode: {:?}", palette_path, self.config.mode);
        let palette = load_palette(palette_path)
            .with_context(|| format!("selection stage failed to read {palette_path:?}"))?;
        if palette.is_empty() {
            return Err(PaletteError::EmptyPalette)
                .with_context(|| format!("selection stage found no frames in {palette_path:?}"));
        }

        let colors = selector::select_all(&palette, self.config.mode, self.config.seed)
            .with_context(|| format!("selection stage failed for {palette_path:?}"))?;
        info!("Colors were successfully chosen for {} frames", colors.len());

        self.stage = Stage::Selected {
            colors: colors.clone(),
        };
        Ok(colors)
    }

    /// Render `colors` as a strip image at `output`.
    pub fn compose_image(&mut self, colors: &[String], output: &Path) -> Result<()> {
        info!("Start composing the result image...");
        let mut canvas = RasterCanvas::new(self.config.canvas_width, self.config.canvas_height)?;
        composer::compose(colors, &mut canvas).context("composition stage failed")?;
        canvas
            .export(output, self.config.pixels_per_unit)
            .with_context(|| format!("composition stage failed to write {output:?}"))?;
        info!("The result image was saved to {:?}", output);

        self.stage = Stage::Composed {
            output: output.to_path_buf(),
        };
        Ok(())
    }

    /// Run every stage, reusing matching artifacts when configured to.
    pub fn run(&mut self, output: &Path) -> Result<()> {
        let frames_path = self.frames_path.clone();
        let sampling = self.sampling_params();
        if self.reusable(&frames_path, &sampling, |m: &FrameManifest| &m.params) {
            info!("Reusing frames from {:?}", frames_path);
            self.stage = Stage::Sampled {
                frames: frames_path.clone(),
            };
        } else {
            self.sample_frames()?;
        }

        let palette_path = self.palette_path.clone();
        let extraction = self
            .extraction_params(&frames_path)
            .with_context(|| format!("extraction stage failed to read {frames_path:?}"))?;
        if self.reusable(&palette_path, &extraction, |a: &ColorsArtifact| &a.params) {
            info!("Reusing colors from {:?}", palette_path);
            self.stage = Stage::Extracted {
                palette: palette_path.clone(),
            };
        } else {
            self.extract_colors(&frames_path)?;
        }

        let colors = self.select_colors(&palette_path)?;
        self.compose_image(&colors, output)
    }

    /// Whether the artifact at `path` loads cleanly and was produced with
    /// `expected` settings.
    fn reusable<T, P>(&self, path: &Path, expected: &P, params: impl Fn(&T) -> &P) -> bool
    where
        T: DeserializeOwned,
        P: PartialEq + Debug,
    {
        if !self.config.reuse_artifacts || !path.exists() {
            return false;
        }
        match artifact::load::<T>(path) {
            Ok(stored) if params(&stored) == expected => true,
            Ok(stored) => {
                warn!(
                    "Not reusing {:?}: it was produced with {:?}, this run needs {:?}",
                    path,
                    params(&stored),
                    expected
                );
                false
            }
            Err(e) => {
                warn!("Ignoring stale or corrupt artifact {:?}: {}", path, e);
                false
            }
        }
    }

    fn progress_bar(&self, unit: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0);
        let template = format!("{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{eta}})");
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}
