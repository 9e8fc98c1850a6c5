use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{PaletteError, PaletteResult};

pub fn calculate_hash(path: &Path) -> PaletteResult<String> {
    let file = File::open(path)
        .map_err(|e| PaletteError::serialization(path, format!("failed to open file: {e}")))?;

    let mut hasher = Sha256::new();
    let mut reader = BufReader::new(file);
    let mut buffer = [0; 8192];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `colors.json` -> `colors.json.sha256`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".sha256");
    path.with_file_name(name)
}

pub fn write_sidecar(path: &Path, digest: &str) -> PaletteResult<()> {
    fs::write(sidecar_path(path), format!("{digest}\n"))?;
    Ok(())
}

/// Check `path` against its sidecar digest.
pub fn verify(path: &Path) -> PaletteResult<()> {
    let sidecar = sidecar_path(path);
    let expected = fs::read_to_string(&sidecar)
        .map_err(|e| PaletteError::serialization(path, format!("missing checksum sidecar: {e}")))?;
    verify_digest(path, expected.trim())
}

pub fn verify_digest(path: &Path, expected: &str) -> PaletteResult<()> {
    let actual = calculate_hash(path)?;
    if actual != expected {
        return Err(PaletteError::serialization(
            path,
            format!("checksum mismatch: expected {expected}, found {actual}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_matches_in_memory_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let bytes: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &bytes).unwrap();

        assert_eq!(calculate_hash(&path).unwrap(), hash_bytes(&bytes));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("tmp/clip_colors.json")),
            PathBuf::from("tmp/clip_colors.json.sha256")
        );
    }

    #[test]
    fn test_verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "[1,2,3]").unwrap();
        write_sidecar(&path, &calculate_hash(&path).unwrap()).unwrap();
        verify(&path).unwrap();

        fs::write(&path, "[1,2,4]").unwrap();
        let err = verify(&path).unwrap_err();
        assert!(matches!(err, PaletteError::Serialization { .. }));
    }

    #[test]
    fn test_verify_requires_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            verify(&path).unwrap_err(),
            PaletteError::Serialization { .. }
        ));
    }
}
