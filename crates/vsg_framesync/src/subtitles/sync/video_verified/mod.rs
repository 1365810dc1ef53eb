//! Video-verified sync mode.
//!
//! Uses frame matching to verify the audio correlation offset against actual video frames.
//!
//! # Algorithm
//!
//! 1. Start with the audio correlation delay as a baseline
//! 2. Generate candidate frame offsets around the correlation value
//! 3. Test each candidate at multiple checkpoints across the video
//! 4. Select the best matching frame offset using sequence verification
//! 5. Apply the verified offset (which may differ from audio correlation)
//!
//! # Use Cases
//!
//! Use this mode when:
//! - Subtitles are timed to VIDEO, not audio
//! - Audio may have a slight offset from video in the source
//! - You need frame-accurate subtitle timing
//! - The audio correlation seems slightly off (e.g., 1 frame / ~42ms)

mod offset;
pub mod quality;
mod refine;
pub mod selector;

pub use offset::{calculate_video_verified_offset, calculate_video_verified_offset_with};
pub use quality::{measure_candidate_quality, measure_windowed_quality, QualityContext};
pub use refine::{refine_offset, Refinement};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::subtitles::error::SyncError;
use crate::subtitles::frame_utils::audit::{run_frame_audit, write_audit_report};
use crate::subtitles::frame_utils::cache::VideoAnalysisCache;
use crate::subtitles::frame_utils::reader::{FfmpegBackend, VideoBackend};
use crate::subtitles::frame_utils::surgical::surgical_round_batch;
use crate::subtitles::frame_utils::timing::frame_duration_ms;
use crate::subtitles::types::SubtitleData;

use super::{apply_delay, SyncConfig, SyncMode, SyncResult};

/// Slack added past the last event when deriving a duration hint.
const DURATION_HINT_PADDING_MS: f64 = 60_000.0;

/// Video-verified sync mode.
///
/// The analysis cache is shared with the caller so several tracks against
/// the same videos analyze each video once.
pub struct VideoVerified<B = FfmpegBackend> {
    backend: B,
    cache: Arc<VideoAnalysisCache>,
}

impl VideoVerified {
    /// Sync mode backed by FFmpeg.
    pub fn new(cache: Arc<VideoAnalysisCache>) -> Self {
        Self::with_backend(FfmpegBackend::new(), cache)
    }
}

impl<B: VideoBackend> VideoVerified<B> {
    pub fn with_backend(backend: B, cache: Arc<VideoAnalysisCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &VideoAnalysisCache {
        &self.cache
    }
}

impl<B: VideoBackend> SyncMode for VideoVerified<B> {
    fn name(&self) -> &str {
        "video-verified"
    }

    fn description(&self) -> &str {
        "Verify delay against video frame matching"
    }

    fn apply(&self, data: &mut SubtitleData, config: &SyncConfig) -> Result<SyncResult, SyncError> {
        if data.events.is_empty() {
            return Err(SyncError::NoEvents);
        }
        if config.source_video.is_none() {
            return Err(SyncError::MissingVideo(
                "source_video required for video-verified mode".to_string(),
            ));
        }
        if config.target_video.is_none() {
            return Err(SyncError::MissingVideo(
                "target_video required for video-verified mode".to_string(),
            ));
        }
        config.video_verified.validate()?;

        let duration_hint_ms = data.duration_ms() + DURATION_HINT_PADDING_MS;
        let decision = calculate_video_verified_offset_with(
            &self.backend,
            config,
            Some(duration_hint_ms),
            &self.cache,
        );
        let final_offset_ms = decision.effective_offset_ms();

        let events_affected =
            apply_delay(&mut data.events, final_offset_ms, decision.selected_frame_offset);

        let fps = config.target_fps.or(decision.target_fps).filter(|f| *f > 0.0);

        let (surgical_results, surgical_stats) = match fps {
            Some(fps) if config.surgical_rounding => {
                let (results, stats) = surgical_round_batch(&data.events, frame_duration_ms(fps));
                (results, Some(stats))
            }
            _ => (BTreeMap::new(), None),
        };

        let audit = match fps {
            Some(fps) if config.video_verified.frame_audit_enabled => {
                let result = run_frame_audit(
                    data,
                    fps,
                    config.rounding,
                    final_offset_ms,
                    &config.job_name,
                );
                if let Some(folder) = &config.audit_folder {
                    if let Err(e) = write_audit_report(&result, folder) {
                        tracing::warn!("[FrameAudit] Could not write report: {}", e);
                    }
                }
                Some(result)
            }
            None if config.video_verified.frame_audit_enabled => {
                tracing::warn!("[FrameAudit] Skipped: target FPS unknown");
                None
            }
            _ => None,
        };

        let summary = format!(
            "VideoVerified: {} events, {:+.3}ms ({})",
            events_affected, final_offset_ms, decision.reason
        );
        tracing::info!("[VideoVerified] {}", summary);

        Ok(SyncResult {
            events_affected,
            final_offset_ms,
            summary,
            decision,
            surgical_results,
            surgical_stats,
            audit,
        })
    }
}
