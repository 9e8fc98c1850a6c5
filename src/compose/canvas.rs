use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::error::{PaletteError, PaletteResult};

/// Drawing surface the composer paints bands onto.
///
/// Coordinates are in canvas units with the origin at the top-left corner;
/// `export` decides how many pixels one unit becomes.
pub trait Canvas {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: [u8; 3]);
    fn export(&self, path: &Path, pixels_per_unit: u32) -> PaletteResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilledRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: [u8; 3],
}

/// Canvas that records rectangles and rasterizes them when exported.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    width: f64,
    height: f64,
    background: [u8; 3],
    rects: Vec<FilledRect>,
}

impl RasterCanvas {
    pub fn new(width: f64, height: f64) -> PaletteResult<Self> {
        for (name, value) in [("width", width), ("height", height)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PaletteError::invalid_parameter(
                    name,
                    format!("canvas {name} must be positive, got {value}"),
                ));
            }
        }
        Ok(Self {
            width,
            height,
            background: [255, 255, 255],
            rects: Vec::new(),
        })
    }

    #[cfg(test)]
    pub fn rects(&self) -> &[FilledRect] {
        &self.rects
    }

    /// Rasterize at `pixels_per_unit`. Edges are rounded to whole pixels, so
    /// rectangles sharing an edge tile without gaps or overlap.
    pub fn render(&self, pixels_per_unit: u32) -> PaletteResult<RgbImage> {
        if pixels_per_unit == 0 {
            return Err(PaletteError::invalid_parameter("pixels_per_unit", "must be at least 1"));
        }
        let scale = pixels_per_unit as f64;
        let px_w = (self.width * scale).round().max(1.0) as u32;
        let px_h = (self.height * scale).round().max(1.0) as u32;

        let mut image = RgbImage::from_pixel(px_w, px_h, Rgb(self.background));
        for rect in &self.rects {
            let to_px = |v: f64, limit: u32| (v * scale).round().clamp(0.0, limit as f64) as u32;
            let (x0, x1) = (to_px(rect.x, px_w), to_px(rect.x + rect.width, px_w));
            let (y0, y1) = (to_px(rect.y, px_h), to_px(rect.y + rect.height, px_h));
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, Rgb(rect.color));
                }
            }
        }
        Ok(image)
    }
}

impl Canvas for RasterCanvas {
    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: [u8; 3]) {
        self.rects.push(FilledRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    /// Written to a sibling temporary file first and renamed into place, so a
    /// failed export never leaves a truncated image at `path`.
    fn export(&self, path: &Path, pixels_per_unit: u32) -> PaletteResult<()> {
        let image = self.render(pixels_per_unit)?;
        let format = image::ImageFormat::from_path(path).map_err(|e| {
            PaletteError::invalid_parameter("output", format!("{}: {e}", path.display()))
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(path);
        let written = image
            .save_with_format(&partial, format)
            .map_err(|e| PaletteError::invalid_parameter("output", format!("{}: {e}", path.display())))
            .and_then(|()| fs::rename(&partial, path).map_err(PaletteError::from));
        if written.is_err() {
            let _ = fs::remove_file(&partial);
        }
        written?;

        debug!("Exported {}x{} image to {:?}", image.width(), image.height(), path);
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(RasterCanvas::new(0.0, 10.0).is_err());
        assert!(RasterCanvas::new(10.0, -1.0).is_err());
        assert!(RasterCanvas::new(f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_fractional_bands_tile_without_gaps() {
        let mut canvas = RasterCanvas::new(10.0, 2.0).unwrap();
        let w = 10.0 / 3.0;
        canvas.fill_rect(0.0, 0.0, w, 2.0, [255, 0, 0]);
        canvas.fill_rect(w, 0.0, w, 2.0, [0, 255, 0]);
        canvas.fill_rect(2.0 * w, 0.0, w, 2.0, [0, 0, 255]);

        let image = canvas.render(3).unwrap();
        assert_eq!(image.dimensions(), (30, 6));
        for x in 0..30 {
            let expected = match x {
                0..=9 => [255, 0, 0],
                10..=19 => [0, 255, 0],
                _ => [0, 0, 255],
            };
            for y in 0..6 {
                assert_eq!(image.get_pixel(x, y).0, expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_export_writes_png_and_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("strip.png");
        let mut canvas = RasterCanvas::new(4.0, 2.0).unwrap();
        canvas.fill_rect(0.0, 0.0, 4.0, 2.0, [10, 20, 30]);

        canvas.export(&out, 2).unwrap();

        let image = image::open(&out).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (8, 4));
        assert_eq!(image.get_pixel(7, 3).0, [10, 20, 30]);
        assert!(!partial_path(&out).exists());
    }

    #[test]
    fn test_unknown_extension_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("strip.notanimage");
        let canvas = RasterCanvas::new(4.0, 2.0).unwrap();

        assert!(canvas.export(&out, 1).is_err());
        assert!(!out.exists());
        assert!(!partial_path(&out).exists());
    }
}
