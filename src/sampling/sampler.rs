use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::error::{PaletteError, PaletteResult};
use crate::media::frame::{Frame, FrameSource};

/// Timestamps `start, start + step, ...` strictly below `end`.
///
/// Each value is computed as `start + i * step` rather than by repeated
/// addition, so long videos with fractional steps do not drift.
pub fn timestamps(start: f64, step: f64, end: f64) -> PaletteResult<Vec<f64>> {
    if !start.is_finite() || !step.is_finite() || !end.is_finite() {
        return Err(PaletteError::invalid_range(format!(
            "start={start}, step={step}, end={end} must all be finite"
        )));
    }
    if start < 0.0 {
        return Err(PaletteError::invalid_range(format!(
            "start time {start}s is negative"
        )));
    }
    if step <= 0.0 {
        return Err(PaletteError::invalid_range(format!(
            "step {step}s must be positive"
        )));
    }
    if start >= end {
        return Err(PaletteError::invalid_range(format!(
            "start time {start}s is not before the end of the video ({end}s)"
        )));
    }

    let count = ((end - start) / step).ceil() as usize;
    Ok((0..count)
        .map(|i| start + i as f64 * step)
        .filter(|&t| t < end)
        .collect())
}

/// Video length rounded down to a whole second, the exclusive sampling bound.
pub fn end_time(source: &dyn FrameSource) -> PaletteResult<f64> {
    Ok(source.duration()?.trunc())
}

/// Decode one frame per timestamp and hand each to `sink` in time order, so
/// only one decoded frame is held at a time. Any decode or sink failure aborts
/// the whole call. Returns the number of frames delivered.
pub fn sample<F>(
    source: &dyn FrameSource,
    start: f64,
    step: f64,
    end: f64,
    progress: &ProgressBar,
    mut sink: F,
) -> PaletteResult<usize>
where
    F: FnMut(Frame) -> PaletteResult<()>,
{
    let times = timestamps(start, step, end)?;
    info!(
        "Sampling {} frames between {}s and {}s every {}s",
        times.len(),
        start,
        end,
        step
    );

    progress.set_length(times.len() as u64);
    for &t in &times {
        let frame = source.frame_at(t)?;
        debug!("Decoded frame at {:.3}s ({}x{})", t, frame.width(), frame.height());
        sink(frame)?;
        progress.inc(1);
    }
    progress.finish();

    Ok(times.len())
}
