use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;
use walkdir::WalkDir;

const FFMPEG_KEY: &str = "FFMPEG_PATH";
const FFPROBE_KEY: &str = "FFPROBE_PATH";

/// Locations of the external executables used to decode video.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Main entry point to get tool paths.
/// Checks the environment and `.env` first, then searches the filesystem.
pub fn get_tool_paths() -> Result<ToolPaths> {
    if let (Ok(ffmpeg), Ok(ffprobe)) = (env::var(FFMPEG_KEY), env::var(FFPROBE_KEY)) {
        info!("Using ffmpeg/ffprobe from environment");
        return Ok(ToolPaths {
            ffmpeg: PathBuf::from(ffmpeg),
            ffprobe: PathBuf::from(ffprobe),
        });
    }

    let env_path = Path::new(".env");
    if env_path.exists() {
        if let Ok(paths) = load_from_env(env_path) {
            if paths.ffmpeg.is_file() && paths.ffprobe.is_file() {
                info!("Loaded tool paths from .env");
                return Ok(paths);
            }
        }
    }

    info!("Tools not configured in .env. Searching PATH and nearby directories...");
    let ffmpeg = find_executable(&executable_name("ffmpeg"), 3)?;
    let ffprobe = find_executable(&executable_name("ffprobe"), 3)?;

    info!("Found ffmpeg: {:?}", ffmpeg);
    info!("Found ffprobe: {:?}", ffprobe);

    // A read-only working directory should not stop the run.
    match save_to_env(env_path, &ffmpeg, &ffprobe) {
        Ok(()) => info!("Saved tool paths to .env"),
        Err(e) => info!("Could not save tool paths to .env: {e:#}"),
    }

    Ok(ToolPaths { ffmpeg, ffprobe })
}

fn executable_name(tool: &str) -> String {
    format!("{tool}{}", env::consts::EXE_SUFFIX)
}

fn find_executable(filename: &str, max_depth: usize) -> Result<PathBuf> {
    if let Some(path_var) = env::var_os("PATH") {
        if let Some(found) = search_dirs(env::split_paths(&path_var), filename) {
            return Ok(found);
        }
    }

    // Fall back to a local install, e.g. ./bin/ffmpeg or ../tools/ffmpeg
    let root = env::current_dir()?;
    let roots = std::iter::once(root.as_path()).chain(root.parent());
    for dir in roots {
        if let Some(found) = walk_for(dir, filename, max_depth) {
            return Ok(found);
        }
    }

    Err(anyhow!(
        "Could not find '{}' on PATH or in nearby directories. Set {} / {} to point at it.",
        filename,
        FFMPEG_KEY,
        FFPROBE_KEY
    ))
}

fn search_dirs(dirs: impl IntoIterator<Item = PathBuf>, filename: &str) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

fn walk_for(root: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == filename)
        .map(|e| e.path().to_path_buf())
}

fn load_from_env(path: &Path) -> Result<ToolPaths> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut ffmpeg = None;
    let mut ffprobe = None;

    for line in reader.lines() {
        let line = line?;
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                FFMPEG_KEY => ffmpeg = Some(PathBuf::from(value.trim())),
                FFPROBE_KEY => ffprobe = Some(PathBuf::from(value.trim())),
                _ => {}
            }
        }
    }

    if let (Some(ffmpeg), Some(ffprobe)) = (ffmpeg, ffprobe) {
        Ok(ToolPaths { ffmpeg, ffprobe })
    } else {
        Err(anyhow!("Incomplete .env file"))
    }
}

/// Rewrites our two keys and keeps any other lines already in the file.
fn save_to_env(path: &Path, ffmpeg: &Path, ffprobe: &Path) -> Result<()> {
    let mut kept = Vec::new();
    if path.exists() {
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let key = line.split_once('=').map(|(k, _)| k.trim());
            if key != Some(FFMPEG_KEY) && key != Some(FFPROBE_KEY) {
                kept.push(line);
            }
        }
    }

    let mut file = File::create(path).context("Failed to create .env file")?;
    for line in kept {
        writeln!(file, "{line}")?;
    }
    writeln!(file, "{}={}", FFMPEG_KEY, ffmpeg.display())?;
    writeln!(file, "{}={}", FFPROBE_KEY, ffprobe.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_save_and_load_env() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        let ffmpeg = PathBuf::from("/opt/ffmpeg/bin/ffmpeg");
        let ffprobe = PathBuf::from("/opt/ffmpeg/bin/ffprobe");

        save_to_env(&path, &ffmpeg, &ffprobe)?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("FFMPEG_PATH=/opt/ffmpeg/bin/ffmpeg"));
        assert!(content.contains("FFPROBE_PATH=/opt/ffmpeg/bin/ffprobe"));

        let loaded = load_from_env(&path)?;
        assert_eq!(loaded, ToolPaths { ffmpeg, ffprobe });
        Ok(())
    }

    #[test]
    fn test_save_keeps_unrelated_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        fs::write(&path, "RUST_LOG=debug\nFFMPEG_PATH=/old/ffmpeg\n")?;

        save_to_env(&path, Path::new("/new/ffmpeg"), Path::new("/new/ffprobe"))?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("RUST_LOG=debug"));
        assert!(!content.contains("/old/ffmpeg"));
        assert_eq!(load_from_env(&path)?.ffmpeg, PathBuf::from("/new/ffmpeg"));
        Ok(())
    }

    #[test]
    fn test_incomplete_env_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".env");
        fs::write(&path, "FFMPEG_PATH=/usr/bin/ffmpeg\n")?;
        assert!(load_from_env(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_search_helpers_find_nested_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bin = dir.path().join("tools").join("bin");
        fs::create_dir_all(&bin)?;
        fs::write(bin.join("ffprobe"), "")?;

        assert_eq!(walk_for(dir.path(), "ffprobe", 3), Some(bin.join("ffprobe")));
        assert_eq!(walk_for(dir.path(), "ffprobe", 1), None);
        assert_eq!(
            search_dirs(vec![dir.path().to_path_buf(), bin.clone()], "ffprobe"),
            Some(bin.join("ffprobe"))
        );
        Ok(())
    }
}
