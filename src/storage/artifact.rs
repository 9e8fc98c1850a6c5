//! JSON artifacts passed between pipeline stages.
//!
//! Every artifact is written next to a `.sha256` sidecar and verified before it
//! is parsed again, so a truncated or hand-edited file is reported instead of
//! silently feeding garbage into the next stage.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{PaletteError, PaletteResult};
use crate::storage::checksum;

pub fn save<T: Serialize>(value: &T, path: &Path) -> PaletteResult<()> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| PaletteError::serialization(path, format!("failed to encode: {e}")))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    checksum::write_sidecar(path, &checksum::hash_bytes(&bytes))?;

    debug!("Wrote artifact {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

pub fn load<T: DeserializeOwned>(path: &Path) -> PaletteResult<T> {
    if !path.is_file() {
        return Err(PaletteError::serialization(path, "artifact does not exist"));
    }
    checksum::verify(path)?;

    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PaletteError::serialization(path, format!("failed to decode: {e}")))
}
