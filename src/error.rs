//! Unified error types for genrekit
//!
//! Error strategy:
//! - Per-track errors (missing file, decode): Recoverable, skip and continue
//! - Codec misuse, training and persistence errors: Fatal, abort the run
//! - At the inference boundary every error is converted into a typed
//!   [`ErrorKind`] instead of propagating to the caller
//!
//! All errors include actionable suggestions where possible.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Supported audio formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, AIFF, OGG";

/// Top-level error type for genrekit operations
#[derive(Debug, Error)]
pub enum GenreError {
    // =========================================================================
    // Recoverable errors - skip track, continue dataset build
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}\n  Tip: If the file plays in other apps, it may be corrupted or use an unsupported codec")]
    DecodeError { path: PathBuf, reason: String },

    #[error("Unsupported audio format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("File not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Codec misuse - fatal during training, typed at the inference boundary
    // =========================================================================
    #[error("Unknown genre label '{0}': it was not present when the label codec was fitted")]
    UnknownLabel(String),

    #[error("Class index {index} is out of range for a codec with {len} classes")]
    IndexOutOfRange { index: usize, len: usize },

    // =========================================================================
    // Artifact errors
    // =========================================================================
    #[error("Cannot load model artifact from '{path}': {reason}\n  Tip: Train a model first with `genrekit train`, or point --model / GENREKIT_MODEL_DIR at an artifact directory")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("Model and label codec do not belong to the same training run: {reason}\n  Tip: Model and codec must always be replaced together; retrain or restore the complete artifact directory")]
    ArtifactMismatch { reason: String },

    #[error("Inference failed: {0}")]
    InferenceError(String),

    // =========================================================================
    // Fatal errors - abort the run
    // =========================================================================
    #[error("Cannot read catalog '{path}': {reason}\n  Tip: Expected a CSV with track_id, set/subset and track/genre_top columns")]
    CatalogError { path: PathBuf, reason: String },

    #[error("Training failed: {0}")]
    TrainingError(String),

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for genrekit operations
pub type Result<T, E = GenreError> = std::result::Result<T, E>;

/// Serializable error category reported at the inference boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    UnsupportedFormat,
    FileNotFound,
    UnknownLabel,
    IndexOutOfRange,
    ArtifactLoad,
    ArtifactMismatch,
    Inference,
    Internal,
}

impl GenreError {
    /// Returns true if this error is recoverable (skip the track, continue the run)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GenreError::DecodeError { .. }
                | GenreError::UnsupportedFormat { .. }
                | GenreError::FileNotFound(_)
        )
    }

    /// Category of this error as reported by the inference service
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenreError::DecodeError { .. } => ErrorKind::Decode,
            GenreError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            GenreError::FileNotFound(_) => ErrorKind::FileNotFound,
            GenreError::UnknownLabel(_) => ErrorKind::UnknownLabel,
            GenreError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            GenreError::ArtifactLoad { .. } => ErrorKind::ArtifactLoad,
            GenreError::ArtifactMismatch { .. } => ErrorKind::ArtifactMismatch,
            GenreError::InferenceError(_) => ErrorKind::Inference,
            _ => ErrorKind::Internal,
        }
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GenreError::DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an artifact load error for a file inside the artifact directory
    pub fn artifact_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        GenreError::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        GenreError::OutputError { path, reason }
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context about which audio file was being processed
    fn with_file_context(self, path: &std::path::Path) -> Result<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for std::result::Result<T, E> {
    fn with_file_context(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| GenreError::DecodeError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
