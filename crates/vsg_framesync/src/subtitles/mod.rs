//! Subtitle timing against video frames.
//!
//! # Components
//!
//! - **types**: Core data structures (SubtitleData, SubtitleEvent, RoundingMode)
//! - **frame_utils**: Video frame utilities (matching, rounding, audit)
//! - **sync**: Offset detection and application (video-verified)
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vsg_framesync::subtitles::{SyncConfig, SyncMode, VideoAnalysisCache, VideoVerified};
//!
//! let cache = Arc::new(VideoAnalysisCache::new());
//! let mode = VideoVerified::new(Arc::clone(&cache));
//!
//! let config = SyncConfig::video_verified(-46.0, 0.0, "source.mkv", "target.mkv");
//! let result = mode.apply(&mut data, &config)?;
//! println!("{} ({})", result.final_offset_ms, result.decision.reason);
//! ```

mod error;
pub mod frame_utils;
pub mod sync;
mod types;

// Re-export core types
pub use types::{RoundingMode, SubtitleData, SubtitleEvent, SyncEventData};

// Re-export errors
pub use error::{FrameError, SubtitleError, SyncError};

pub use frame_utils::{
    run_frame_audit, surgical_round, surgical_round_event, write_audit_report, FrameAuditResult,
    VideoAnalysisCache,
};

// Re-export sync
pub use sync::{
    apply_delay, calculate_video_verified_offset, calculate_video_verified_offset_with,
    MatchParams, SyncConfig, SyncDecision, SyncMode, SyncReason, SyncResult, VideoVerified,
    VideoVerifiedConfig,
};
