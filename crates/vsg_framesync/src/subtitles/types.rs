//! Core subtitle types.
//!
//! All timing values are stored as `f64` milliseconds for sub-millisecond precision.
//! Rounding to centiseconds happens only when output is produced.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Subtitle events of one track.
#[derive(Debug, Clone, Default)]
pub struct SubtitleData {
    /// Subtitle events (dialogue lines and comments).
    pub events: Vec<SubtitleEvent>,
    /// Source file path (if loaded from file).
    pub source_path: Option<PathBuf>,
}

impl SubtitleData {
    /// Create empty subtitle data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a list of events.
    pub fn from_events(events: Vec<SubtitleEvent>) -> Self {
        Self {
            events,
            source_path: None,
        }
    }

    /// Number of dialogue events (excluding comments).
    pub fn dialogue_count(&self) -> usize {
        self.events.iter().filter(|e| !e.is_comment).count()
    }

    /// Total duration in milliseconds (end of last event).
    pub fn duration_ms(&self) -> f64 {
        self.events.iter().map(|e| e.end_ms).fold(0.0, f64::max)
    }
}

/// A single subtitle event (dialogue line or comment).
#[derive(Debug, Clone, Default)]
pub struct SubtitleEvent {
    /// Start time in milliseconds (f64 for precision).
    pub start_ms: f64,
    /// End time in milliseconds (f64 for precision).
    pub end_ms: f64,
    /// Text content (may contain formatting tags).
    pub text: String,
    /// Style name (ASS only).
    pub style: Option<String>,
    /// Whether this is a comment line.
    pub is_comment: bool,
    /// Per-event sync tracking data.
    pub sync_data: Option<SyncEventData>,
}

impl SubtitleEvent {
    /// Create a new dialogue event.
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a comment event.
    pub fn comment(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            is_comment: true,
            ..Self::new(start_ms, end_ms, text)
        }
    }

    /// Duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Per-event sync tracking data.
///
/// Records what adjustments were made during sync for debugging/auditing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncEventData {
    /// Original start time before sync.
    pub original_start_ms: f64,
    /// Original end time before sync.
    pub original_end_ms: f64,
    /// Start time adjustment applied.
    pub start_adjustment_ms: f64,
    /// End time adjustment applied.
    pub end_adjustment_ms: f64,
    /// Frame offset the adjustment was verified with, if any.
    pub verified_frame_offset: Option<i32>,
}

/// Rounding mode for centisecond output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Round down (floor), the ASS convention.
    #[default]
    Floor,
    /// Round to nearest.
    Round,
    /// Round up (ceil).
    Ceil,
}

impl RoundingMode {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Round => "round",
            Self::Ceil => "ceil",
        }
    }

    /// Round a millisecond value to centiseconds (10ms precision).
    pub fn apply_ass(&self, ms: f64) -> f64 {
        let cs = ms / 10.0;
        let rounded = match self {
            Self::Floor => cs.floor(),
            Self::Round => cs.round(),
            Self::Ceil => cs.ceil(),
        };
        rounded * 10.0
    }
}
