use tracing::info;

use crate::color::hex;
use crate::compose::canvas::Canvas;
use crate::error::{PaletteError, PaletteResult};

/// One vertical strip of the result image.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub x: f64,
    pub width: f64,
    pub height: f64,
    pub color: [u8; 3],
}

/// Split a `width x height` canvas into one equal-width, full-height band per
/// color, left to right in frame order.
pub fn layout(colors: &[String], width: f64, height: f64) -> PaletteResult<Vec<Band>> {
    if colors.is_empty() {
        return Err(PaletteError::EmptyPalette);
    }
    for (name, value) in [("width", width), ("height", height)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(PaletteError::invalid_parameter(
                name,
                format!("must be positive, got {value}"),
            ));
        }
    }

    let band_width = width / colors.len() as f64;
    colors
        .iter()
        .enumerate()
        .map(|(i, color)| -> PaletteResult<Band> {
            Ok(Band {
                x: i as f64 * band_width,
                width: band_width,
                height,
                color: hex::decode(color)?,
            })
        })
        .collect()
}

/// Paint `colors` as bands across the whole canvas.
pub fn compose<C: Canvas + ?Sized>(colors: &[String], canvas: &mut C) -> PaletteResult<Vec<Band>> {
    let bands = layout(colors, canvas.width(), canvas.height())?;
    for band in &bands {
        canvas.fill_rect(band.x, 0.0, band.width, band.height, band.color);
    }
    info!(
        "Composed {} bands of width {:.3} on a {}x{} canvas",
        bands.len(),
        bands[0].width,
        canvas.width(),
        canvas.height()
    );
    Ok(bands)
}
