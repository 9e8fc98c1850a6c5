use std::path::Path;

use crate::error::{PaletteError, PaletteResult};

pub fn detect_mimetype(path: &Path) -> PaletteResult<String> {
    let kind = infer::get_from_path(path).map_err(|e| {
        PaletteError::source_read(path, format!("failed to read file for mimetype detection: {e}"))
    })?;

    match kind {
        Some(k) => Ok(k.mime_type().to_string()),
        None => Ok("application/octet-stream".to_string()),
    }
}

/// Whether a sniffed mimetype may hold a video stream.
///
/// Only types known not to carry video are ruled out. Containers the sniffer
/// has no signature for (MPEG-TS, y4m, ...) come back as octet-stream and are
/// left for ffprobe to judge.
pub fn could_be_video(media_type: &str) -> bool {
    !["image/", "audio/", "text/"]
        .iter()
        .any(|prefix| media_type.starts_with(prefix))
}
