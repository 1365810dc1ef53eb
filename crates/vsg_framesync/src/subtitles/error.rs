//! Subtitle error types.
//!
//! Expected degradations during video-verified sync (no frame tools,
//! unopenable video, no matching frames) are not errors; they are reported
//! through `SyncReason` on the decision.

use std::path::PathBuf;

/// Errors that can occur during subtitle operations.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    /// Failed to write a file (e.g. the audit report).
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Sync error.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),

    /// Frame utilities error.
    #[error("Frame error: {0}")]
    FrameError(#[from] FrameError),
}

/// Errors that can occur during sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing required video file.
    #[error("Missing video file: {0}")]
    MissingVideo(String),

    /// No events to sync.
    #[error("No subtitle events to sync")]
    NoEvents,

    /// Invalid sync configuration.
    #[error("Invalid sync config: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur during frame operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Failed to open video file.
    #[error("Failed to open video '{path}': {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// Failed to extract frame.
    #[error("Failed to extract frame at {time_ms}ms: {message}")]
    ExtractionFailed { time_ms: f64, message: String },

    /// FFmpeg not available.
    #[error("FFmpeg not found or not executable")]
    FfmpegNotFound,

    /// FFprobe not available.
    #[error("FFprobe not found or not executable")]
    FfprobeNotFound,

    /// Invalid frame data.
    #[error("Invalid frame data: {0}")]
    InvalidData(String),

    /// Video properties detection failed.
    #[error("Failed to detect video properties: {0}")]
    PropertiesFailed(String),

    /// Content-type analysis failed.
    #[error("Content analysis failed: {0}")]
    AnalysisFailed(String),
}

impl SubtitleError {
    /// Create a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }
}

impl FrameError {
    /// Create an open error.
    pub fn open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an extraction error.
    pub fn extraction(time_ms: f64, message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            time_ms,
            message: message.into(),
        }
    }
}
