//! Subtitle sync.
//!
//! # Architecture
//!
//! Sync modes implement the `SyncMode` trait. Offset detection itself never
//! touches events: it produces a [`SyncDecision`], and [`apply_delay`] then
//! shifts every dialogue event by the decided offset.
//!
//! # Available Modes
//!
//! - **VideoVerified**: verifies the audio correlation against video frames
//!   and applies the frame-exact offset.

pub mod video_verified;

pub use video_verified::{
    calculate_video_verified_offset, calculate_video_verified_offset_with, VideoVerified,
};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{InterlacedSettings, Settings};
use crate::subtitles::error::SyncError;
use crate::subtitles::frame_utils::audit::FrameAuditResult;
use crate::subtitles::frame_utils::compare::FrameComparator;
use crate::subtitles::frame_utils::surgical::{SurgicalBatchStats, SurgicalEventResult};
use crate::subtitles::frame_utils::types::{
    CandidateScore, ComparisonMethod, ContentType, HashAlgorithm,
};
use crate::subtitles::types::{RoundingMode, SubtitleData, SubtitleEvent, SyncEventData};

/// Configuration for one sync operation.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Total delay to apply (including global shift).
    pub total_delay_ms: f64,
    /// Global shift component of the delay.
    pub global_shift_ms: f64,
    /// Video the subtitles were authored against.
    pub source_video: Option<PathBuf>,
    /// Video the subtitles are being synced to.
    pub target_video: Option<PathBuf>,
    /// Target video FPS, used by the frame audit when set.
    pub target_fps: Option<f64>,
    /// Video-verified specific settings.
    pub video_verified: VideoVerifiedConfig,
    /// Rounding mode the output layer will use, audited against.
    pub rounding: RoundingMode,
    /// Produce frame-preserving centisecond times for every dialogue event.
    pub surgical_rounding: bool,
    /// Folder for frame audit reports. No report file when unset.
    pub audit_folder: Option<PathBuf>,
    /// Job name used in audit report names.
    pub job_name: String,
}

impl SyncConfig {
    /// Create config for video-verified sync.
    pub fn video_verified(
        total_delay_ms: f64,
        global_shift_ms: f64,
        source_video: impl AsRef<Path>,
        target_video: impl AsRef<Path>,
    ) -> Self {
        Self {
            total_delay_ms,
            global_shift_ms,
            source_video: Some(source_video.as_ref().to_path_buf()),
            target_video: Some(target_video.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Build from loaded settings, leaving delays and paths to the caller.
    pub fn from_settings(settings: &Settings) -> Self {
        let audit_folder = &settings.output.audit_folder;
        Self {
            video_verified: VideoVerifiedConfig::from_settings(settings),
            rounding: settings.output.rounding,
            surgical_rounding: settings.output.surgical_rounding,
            audit_folder: (!audit_folder.is_empty()).then(|| PathBuf::from(audit_folder)),
            ..Default::default()
        }
    }

    /// Pure correlation component (total - global shift).
    pub fn pure_correlation_ms(&self) -> f64 {
        self.total_delay_ms - self.global_shift_ms
    }
}

/// Video-verified mode settings.
#[derive(Debug, Clone)]
pub struct VideoVerifiedConfig {
    /// Number of checkpoints to test across the video (1-5).
    pub num_checkpoints: usize,
    /// Search range in frames around the correlation value.
    pub search_range_frames: i32,
    pub comparison_method: ComparisonMethod,
    pub hash_algorithm: HashAlgorithm,
    /// Hash size (8 or 16).
    pub hash_size: u8,
    pub hash_threshold: u32,
    /// Threshold for SSIM and MSE distances.
    pub ssim_mse_threshold: f64,
    /// Window radius for legacy windowed quality only.
    pub window_radius: i32,
    /// Number of consecutive frames to verify.
    pub sequence_length: usize,
    /// Correlations larger than this many frames skip frame verification.
    /// Zero disables the check.
    pub zero_check_frames: u32,
    /// Score margin within which a verified zero offset wins.
    pub min_quality_advantage: f64,
    /// Refine with real presentation timestamps.
    pub use_pts_precision: bool,
    /// Per-step slack when either side is field matched.
    pub ivtc_tolerance_frames: u32,
    /// Run the frame audit after applying the offset.
    pub frame_audit_enabled: bool,
    /// Interlaced profile.
    pub interlaced: InterlacedSettings,
}

impl Default for VideoVerifiedConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Parameter profile in effect for one offset detection call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub num_checkpoints: usize,
    pub search_range_frames: i32,
    pub sequence_length: usize,
    pub comparator: FrameComparator,
}

impl VideoVerifiedConfig {
    /// Runtime config from the `[video_verified]` and `[interlaced]` sections.
    pub fn from_settings(settings: &Settings) -> Self {
        let vv = &settings.video_verified;
        Self {
            num_checkpoints: vv.num_checkpoints,
            search_range_frames: vv.search_range_frames,
            comparison_method: vv.comparison_method,
            hash_algorithm: vv.hash_algorithm,
            hash_size: vv.hash_size,
            hash_threshold: vv.hash_threshold,
            ssim_mse_threshold: vv.ssim_mse_threshold,
            window_radius: vv.window_radius,
            sequence_length: vv.sequence_length,
            zero_check_frames: vv.zero_check_frames,
            min_quality_advantage: vv.min_quality_advantage,
            use_pts_precision: vv.use_pts_precision,
            ivtc_tolerance_frames: vv.ivtc_tolerance_frames,
            frame_audit_enabled: vv.frame_audit_enabled,
            interlaced: settings.interlaced.clone(),
        }
    }

    /// Pick the parameter profile.
    pub fn params(&self, use_interlaced: bool) -> MatchParams {
        if use_interlaced {
            let il = &self.interlaced;
            MatchParams {
                num_checkpoints: il.num_checkpoints.clamp(1, 5),
                search_range_frames: il.search_range_frames.max(0),
                sequence_length: il.sequence_length,
                comparator: FrameComparator::new(
                    il.comparison_method,
                    il.hash_algorithm,
                    il.hash_size,
                    il.hash_threshold,
                    il.ssim_mse_threshold,
                ),
            }
        } else {
            MatchParams {
                num_checkpoints: self.num_checkpoints.clamp(1, 5),
                search_range_frames: self.search_range_frames.max(0),
                sequence_length: self.sequence_length,
                comparator: FrameComparator::new(
                    self.comparison_method,
                    self.hash_algorithm,
                    self.hash_size,
                    self.hash_threshold,
                    self.ssim_mse_threshold,
                ),
            }
        }
    }

    /// Check ranges that would make detection meaningless.
    ///
    /// Both profiles are checked; the interlaced one is chosen per call.
    pub fn validate(&self) -> Result<(), SyncError> {
        check_profile(
            "",
            self.num_checkpoints,
            self.search_range_frames,
            self.sequence_length,
        )?;
        let il = &self.interlaced;
        check_profile(
            "interlaced.",
            il.num_checkpoints,
            il.search_range_frames,
            il.sequence_length,
        )
    }
}

fn check_profile(
    prefix: &str,
    num_checkpoints: usize,
    search_range_frames: i32,
    sequence_length: usize,
) -> Result<(), SyncError> {
    if !(1..=5).contains(&num_checkpoints) {
        return Err(SyncError::InvalidConfig(format!(
            "{}num_checkpoints must be 1-5, got {}",
            prefix, num_checkpoints
        )));
    }
    if search_range_frames < 0 {
        return Err(SyncError::InvalidConfig(format!(
            "{}search_range_frames must be >= 0, got {}",
            prefix, search_range_frames
        )));
    }
    if sequence_length == 0 {
        return Err(SyncError::InvalidConfig(format!(
            "{}sequence_length must be at least 1",
            prefix
        )));
    }
    Ok(())
}

/// Why an offset was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncReason {
    /// Correlation too large to be spurious; accepted as-is.
    CorrelationLarge,
    /// A sequence-verified frame offset was found.
    FrameMatched,
    /// A verified zero offset scored close enough to the winner.
    ZeroPreferred,
    /// Frame tools are not available.
    FallbackNoFrameUtils,
    /// A video could not be probed or opened.
    FallbackVideoOpenFailed,
    /// No candidate passed sequence verification.
    FallbackNoFrameMatches,
    /// A video path is missing or does not exist.
    MissingVideos,
}

impl SyncReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CorrelationLarge => "correlation-large",
            Self::FrameMatched => "frame-matched",
            Self::ZeroPreferred => "zero-preferred",
            Self::FallbackNoFrameUtils => "fallback-no-frame-utils",
            Self::FallbackVideoOpenFailed => "fallback-video-open-failed",
            Self::FallbackNoFrameMatches => "fallback-no-frame-matches",
            Self::MissingVideos => "missing-videos",
        }
    }

    /// Whether frame verification was abandoned.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Self::FallbackNoFrameUtils
                | Self::FallbackVideoOpenFailed
                | Self::FallbackNoFrameMatches
                | Self::MissingVideos
        )
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of offset detection.
#[derive(Debug, Clone)]
pub struct SyncDecision {
    /// Offset to apply. None only when both videos are unusable.
    pub final_offset_ms: Option<f64>,
    pub reason: SyncReason,
    /// Winning frame offset, when frame matching decided.
    pub selected_frame_offset: Option<i32>,
    pub candidate_scores: Vec<CandidateScore>,
    /// Whether presentation timestamps refined the offset.
    pub sub_frame_precision_used: bool,
    /// Pure audio correlation (total minus global shift).
    pub audio_correlation_ms: f64,
    pub global_shift_ms: f64,
    /// Caller's total delay, the fallback value.
    pub total_delay_ms: f64,
    /// Video-derived offset before the global shift.
    pub video_offset_ms: Option<f64>,
    pub checkpoints: Vec<f64>,
    pub source_content_type: Option<ContentType>,
    pub target_content_type: Option<ContentType>,
    pub source_fps: Option<f64>,
    pub target_fps: Option<f64>,
    /// Threshold worth trying when nothing verified.
    pub suggested_threshold: Option<u32>,
    /// Average distance of the top-ranked candidate, when frames were compared.
    pub best_avg_distance: Option<f64>,
}

impl SyncDecision {
    /// Decision that keeps the caller's delay.
    pub(crate) fn fallback(
        reason: SyncReason,
        total_delay_ms: f64,
        global_shift_ms: f64,
        final_offset_ms: Option<f64>,
    ) -> Self {
        Self {
            final_offset_ms,
            reason,
            selected_frame_offset: None,
            candidate_scores: Vec::new(),
            sub_frame_precision_used: false,
            audio_correlation_ms: total_delay_ms - global_shift_ms,
            global_shift_ms,
            total_delay_ms,
            video_offset_ms: None,
            checkpoints: Vec::new(),
            source_content_type: None,
            target_content_type: None,
            source_fps: None,
            target_fps: None,
            suggested_threshold: None,
            best_avg_distance: None,
        }
    }

    /// Offset to apply, with None resolved to the caller's total delay.
    pub fn effective_offset_ms(&self) -> f64 {
        self.final_offset_ms.unwrap_or(self.total_delay_ms)
    }
}

/// Result of a sync operation.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Number of events affected.
    pub events_affected: usize,
    /// Offset applied to every dialogue event.
    pub final_offset_ms: f64,
    /// Summary message.
    pub summary: String,
    pub decision: SyncDecision,
    /// Output times per event index, when surgical rounding ran.
    pub surgical_results: BTreeMap<usize, SurgicalEventResult>,
    pub surgical_stats: Option<SurgicalBatchStats>,
    /// Frame audit of the shifted events, when enabled.
    pub audit: Option<FrameAuditResult>,
}

/// Trait for sync mode implementations.
///
/// The sync mode may modify the subtitle data in place.
pub trait SyncMode {
    /// Get the name of this sync mode.
    fn name(&self) -> &str;

    /// Get a description of this sync mode.
    fn description(&self) -> &str;

    /// Apply sync to subtitle data.
    fn apply(&self, data: &mut SubtitleData, config: &SyncConfig) -> Result<SyncResult, SyncError>;
}

/// Shift every dialogue event by `delay_ms`.
///
/// Comments are left alone. Each shifted event records what was applied.
/// Returns the number of events modified.
pub fn apply_delay(
    events: &mut [SubtitleEvent],
    delay_ms: f64,
    verified_frame_offset: Option<i32>,
) -> usize {
    let mut affected = 0;

    for event in events.iter_mut().filter(|e| !e.is_comment) {
        event.sync_data = Some(SyncEventData {
            original_start_ms: event.start_ms,
            original_end_ms: event.end_ms,
            start_adjustment_ms: delay_ms,
            end_adjustment_ms: delay_ms,
            verified_frame_offset,
        });
        event.start_ms += delay_ms;
        event.end_ms += delay_ms;
        affected += 1;
    }

    affected
}
