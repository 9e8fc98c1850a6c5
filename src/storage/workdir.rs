use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::PaletteResult;
use crate::storage::checksum;

/// Directory holding one run's intermediate artifacts.
///
/// Only the paths handed out by [`WorkDir::claim`] belong to the run. When
/// `delete_after` is set those are removed on drop, on early returns and
/// errors as well as at the normal end of a run, and the directory itself goes
/// too if this run created it and nothing else was put in it.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    delete_after: bool,
    created: bool,
    owned: Vec<PathBuf>,
}

impl WorkDir {
    pub fn create(path: impl Into<PathBuf>, delete_after: bool) -> PaletteResult<Self> {
        let path = path.into();
        let created = !path.exists();
        fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            delete_after,
            created,
            owned: Vec::new(),
        })
    }

    /// Path of `name` inside the directory, owned by this run.
    pub fn claim(&mut self, name: impl AsRef<Path>) -> PathBuf {
        let path = self.path.join(name);
        if !self.owned.contains(&path) {
            self.owned.push(path.clone());
        }
        path
    }

    /// Like [`WorkDir::claim`], also owning the artifact's checksum sidecar.
    pub fn claim_artifact(&mut self, name: impl AsRef<Path>) -> PathBuf {
        let path = self.claim(name);
        let sidecar = checksum::sidecar_path(&path);
        if !self.owned.contains(&sidecar) {
            self.owned.push(sidecar);
        }
        path
    }
}

/// Remove a file or a whole directory tree. A missing path is not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.delete_after {
            info!("Keeping intermediate files in {:?}", self.path);
            return;
        }
        for path in &self.owned {
            if let Err(e) = remove_path(path) {
                warn!("Failed to delete {:?}: {}", path, e);
            }
        }
        if !self.created {
            info!("Deleted intermediate files in {:?}", self.path);
            return;
        }
        match fs::remove_dir(&self.path) {
            Ok(()) => info!("Deleted intermediate files and {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Leaving {:?} in place: {}", self.path, e),
        }
    }
}
