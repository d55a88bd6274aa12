//! Input scanning for batch prediction

use crate::error::{GenreError, Result};
use crate::types::AudioFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Audio file found under a prediction input
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

/// Scan a path (file or directory) for supported audio files
///
/// A single file is returned as-is when its extension is supported. Results
/// from a directory walk are sorted by path so batch output is stable.
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(GenreError::FileNotFound(input.to_path_buf()));
    }

    if input.is_file() {
        return match try_discover_file(input) {
            Some(file) => Ok(vec![file]),
            None => Err(GenreError::UnsupportedFormat {
                path: input.to_path_buf(),
                format: input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            }),
        };
    }

    let walker = if recursive {
        WalkDir::new(input)
    } else {
        WalkDir::new(input).max_depth(1)
    };

    let mut files: Vec<DiscoveredFile> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| try_discover_file(entry.path()))
        .inspect(|file| debug!("Discovered: {}", file.path.display()))
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    info!("Discovered {} audio files", files.len());
    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

fn try_discover_file(path: &Path) -> Option<DiscoveredFile> {
    let format = AudioFormat::from_path(path)?;
    let size_bytes = std::fs::metadata(path).ok()?.len();

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        format,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_missing_path() {
        let err = scan(Path::new("/no/such/dir"), true).unwrap_err();
        assert!(matches!(err, GenreError::FileNotFound(_)));
    }

    #[test]
    fn test_scan_single_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let err = scan(&path, false).unwrap_err();
        assert!(matches!(err, GenreError::UnsupportedFormat { ref format, .. } if format == "txt"));
    }

    #[test]
    fn test_scan_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.wav"), b"x").unwrap();
        fs::write(dir.path().join("a.MP3"), b"x").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"x").unwrap();
        fs::write(nested.join("c.flac"), b"x").unwrap();

        let flat = scan(dir.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.MP3", "b.wav"]);

        let deep = scan(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.iter().any(|f| f.format == AudioFormat::Flac));
    }
}
