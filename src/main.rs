mod color;
mod compose;
mod error;
mod media;
mod pipeline;
mod sampling;
mod storage;
mod utils;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, Level};

use crate::color::extractor::{ExtractorConfig, ShortfallPolicy};
use crate::color::selector::SelectionMode;
use crate::media::ffmpeg::FfmpegSource;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::utils::config::get_tool_paths;

/// Turn a video into a strip of its dominant colors, one band per sampled frame.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file to process
    video: PathBuf,

    /// Result image path (format taken from the extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Result width in canvas units
    #[arg(long, default_value_t = 1000.0)]
    width: f64,

    /// Result height in canvas units
    #[arg(long, default_value_t = 250.0)]
    height: f64,

    /// Pixels per canvas unit in the exported image
    #[arg(long, default_value_t = 1)]
    scale: u32,

    /// `popular` picks each frame's heaviest color; anything else samples by weight
    #[arg(short, long, default_value = "sample", value_parser = parse_mode)]
    mode: SelectionMode,

    /// Seconds into the video where sampling starts
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Seconds between sampled frames
    #[arg(long, default_value_t = 1.0)]
    step: f64,

    /// Dominant colors to extract per frame
    #[arg(short = 'k', long, default_value_t = 5)]
    clusters: usize,

    /// Frames are resized to NxN before clustering
    #[arg(long, default_value_t = 300)]
    resize: u32,

    /// What to return when a frame has fewer colors than requested
    #[arg(long, value_enum, default_value_t = Shortfall::Keep)]
    shortfall: Shortfall,

    /// Seed for clustering and sampling; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for intermediate files
    #[arg(long, default_value = "tmp")]
    work_dir: PathBuf,

    /// Reuse intermediate files from a previous run when they are intact
    #[arg(long)]
    reuse: bool,

    /// Delete the intermediate files this run wrote when done
    #[arg(long)]
    delete_after: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Shortfall {
    /// Keep the colors that were found
    Keep,
    /// Collapse to the dominant color
    Collapse,
}

impl From<Shortfall> for ShortfallPolicy {
    fn from(value: Shortfall) -> Self {
        match value {
            Shortfall::Keep => ShortfallPolicy::Keep,
            Shortfall::Collapse => ShortfallPolicy::Collapse,
        }
    }
}

fn parse_mode(name: &str) -> Result<SelectionMode, String> {
    Ok(SelectionMode::from_name(name))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Video palette starting...");
    info!("Input: {:?}", args.video);

    let tools = get_tool_paths()?;
    let source = FfmpegSource::open(&args.video, tools)
        .with_context(|| format!("failed to open video {:?}", args.video))?;

    let name = args
        .video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{name}_palette.png")));

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Seed: {} (pass --seed {} to reproduce this run)", seed, seed);

    let config = PipelineConfig {
        work_dir: args.work_dir,
        delete_after: args.delete_after,
        reuse_artifacts: args.reuse,
        start: args.start,
        step: args.step,
        extractor: ExtractorConfig {
            clusters: args.clusters,
            resize_dim: args.resize,
            shortfall: args.shortfall.into(),
            ..ExtractorConfig::default()
        },
        mode: args.mode,
        seed,
        canvas_width: args.width,
        canvas_height: args.height,
        pixels_per_unit: args.scale,
        show_progress: true,
    };

    let mut pipeline = Pipeline::new(source, name, config)?;
    pipeline.run(&output)?;
    debug!("Final stage: {:?}", pipeline.stage());

    info!("Pipeline completed. Result: {:?}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["video-palette", "clip.mp4"]).unwrap();
        assert_eq!(args.mode, SelectionMode::Sample);
        assert_eq!(args.clusters, 5);
        assert_eq!(args.resize, 300);
        assert_eq!(args.step, 1.0);
        assert_eq!(ShortfallPolicy::from(args.shortfall), ShortfallPolicy::Keep);
        assert_eq!(args.work_dir, PathBuf::from("tmp"));
        assert!(!args.delete_after);
    }

    #[test]
    fn test_mode_and_flags() {
        let args = Args::try_parse_from([
            "video-palette",
            "clip.mp4",
            "--mode",
            "popular",
            "-k",
            "8",
            "--shortfall",
            "collapse",
            "--delete-after",
            "--seed",
            "42",
        ])
        .unwrap();
        assert_eq!(args.mode, SelectionMode::Popular);
        assert_eq!(args.clusters, 8);
        assert_eq!(ShortfallPolicy::from(args.shortfall), ShortfallPolicy::Collapse);
        assert!(args.delete_after);
        assert_eq!(args.seed, Some(42));

        let args = Args::try_parse_from(["video-palette", "clip.mp4", "-m", "random"]).unwrap();
        assert_eq!(args.mode, SelectionMode::Sample);
    }
}
