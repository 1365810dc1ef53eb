//! Video-verified offset detection.
//!
//! One linear decision per call: every exit produces a [`SyncDecision`]
//! with a reason code. Expected degradations never surface as errors.

use std::path::Path;
use std::sync::Arc;

use super::quality::{measure_candidate_quality, QualityContext};
use super::refine::refine_offset;
use super::selector::{best_avg_distance, select_best, suggested_threshold, zero_preferred};
use crate::subtitles::frame_utils::cache::{FrameTimestamps, VideoAnalysisCache};
use crate::subtitles::frame_utils::content::{plan_processing, use_interlaced_settings};
use crate::subtitles::frame_utils::properties::compare_video_properties;
use crate::subtitles::frame_utils::reader::{FfmpegBackend, HandleGuard, OpenRequest, VideoBackend};
use crate::subtitles::frame_utils::timing::{
    frame_duration_ms, generate_frame_candidates, select_checkpoint_times,
};
use crate::subtitles::frame_utils::types::{ComparisonMethod, VideoProperties};
use crate::subtitles::sync::{SyncConfig, SyncDecision, SyncReason, VideoVerifiedConfig};

/// Duration assumed when neither a hint nor the probe provides one (20 min).
const DEFAULT_DURATION_MS: f64 = 1_200_000.0;

/// Detect the frame-exact offset with the FFmpeg backend.
pub fn calculate_video_verified_offset(
    config: &SyncConfig,
    duration_hint_ms: Option<f64>,
    cache: &VideoAnalysisCache,
) -> SyncDecision {
    calculate_video_verified_offset_with(&FfmpegBackend::new(), config, duration_hint_ms, cache)
}

/// Resolve a configured path, None when unset or missing.
fn usable_path<'a>(path: Option<&'a Path>, backend: &dyn VideoBackend, label: &str) -> Option<&'a Path> {
    let path = path?;
    if backend.has_video(path) {
        Some(path)
    } else {
        tracing::warn!("[VideoVerified] {} video not found: {}", label, path.display());
        None
    }
}

fn load_timestamps(
    backend: &dyn VideoBackend,
    cache: &VideoAnalysisCache,
    path: &Path,
    props: &VideoProperties,
    use_pts_precision: bool,
) -> Option<Arc<FrameTimestamps>> {
    if !props.is_vfr && !use_pts_precision {
        return None;
    }
    match cache.timestamps_or_load(path, || backend.load_timestamps(path)) {
        Ok(timestamps) => Some(timestamps),
        Err(e) => {
            tracing::warn!("[VideoVerified] No frame timestamps for {}: {}", path.display(), e);
            None
        }
    }
}

/// Detect the frame-exact offset with an explicit backend.
///
/// Video handles are closed before this returns, on every path.
pub fn calculate_video_verified_offset_with(
    backend: &dyn VideoBackend,
    config: &SyncConfig,
    duration_hint_ms: Option<f64>,
    cache: &VideoAnalysisCache,
) -> SyncDecision {
    let vv = &config.video_verified;
    let total_delay_ms = config.total_delay_ms;
    let global_shift_ms = config.global_shift_ms;
    let pure_correlation_ms = config.pure_correlation_ms();
    let fallback = |reason| {
        SyncDecision::fallback(reason, total_delay_ms, global_shift_ms, Some(total_delay_ms))
    };

    tracing::info!("[VideoVerified] === Frame Matching for Delay Verification ===");
    tracing::info!(
        "[VideoVerified] Audio correlation: {:+.3}ms, global shift: {:+.3}ms",
        pure_correlation_ms,
        global_shift_ms
    );

    let source_path = usable_path(config.source_video.as_deref(), backend, "Source");
    let target_path = usable_path(config.target_video.as_deref(), backend, "Target");
    let (source_path, target_path) = match (source_path, target_path) {
        (Some(s), Some(t)) => (s, t),
        (None, None) => {
            tracing::warn!("[VideoVerified] Both videos unusable, no offset decided");
            return SyncDecision::fallback(
                SyncReason::MissingVideos,
                total_delay_ms,
                global_shift_ms,
                None,
            );
        }
        _ => {
            tracing::warn!("[VideoVerified] Missing video, using audio correlation");
            return fallback(SyncReason::MissingVideos);
        }
    };

    if !backend.is_available() {
        tracing::warn!(
            "[VideoVerified] Frame backend '{}' unavailable, using audio correlation",
            backend.name()
        );
        return fallback(SyncReason::FallbackNoFrameUtils);
    }

    let probed = backend
        .probe(source_path)
        .and_then(|s| backend.probe(target_path).map(|t| (s, t)));
    let (source_props, target_props) = match probed {
        Ok(props) => props,
        Err(e) => {
            tracing::warn!("[VideoVerified] Could not read video properties: {}", e);
            return fallback(SyncReason::FallbackVideoOpenFailed);
        }
    };
    compare_video_properties(&source_props, &target_props);

    // 0 disables the check
    if vv.zero_check_frames > 0 {
        let zero_check_ms = f64::from(vv.zero_check_frames) * frame_duration_ms(source_props.fps);
        if pure_correlation_ms.abs() > zero_check_ms {
            tracing::info!(
                "[VideoVerified] |{:.1}ms| exceeds {} frames ({:.1}ms), accepting correlation",
                pure_correlation_ms,
                vv.zero_check_frames,
                zero_check_ms
            );
            let mut decision = fallback(SyncReason::CorrelationLarge);
            decision.source_fps = Some(source_props.fps);
            decision.target_fps = Some(target_props.fps);
            return decision;
        }
    }

    detect_with_frames(
        backend,
        cache,
        vv,
        (source_path, &source_props),
        (target_path, &target_props),
        pure_correlation_ms,
        duration_hint_ms,
        fallback(SyncReason::FallbackNoFrameMatches),
    )
}

/// Frame matching proper. `decision` carries the caller's delays and is
/// filled in with whatever the matching produced.
#[allow(clippy::too_many_arguments)]
fn detect_with_frames(
    backend: &dyn VideoBackend,
    cache: &VideoAnalysisCache,
    vv: &VideoVerifiedConfig,
    (source_path, source_props): (&Path, &VideoProperties),
    (target_path, target_props): (&Path, &VideoProperties),
    pure_correlation_ms: f64,
    duration_hint_ms: Option<f64>,
    mut decision: SyncDecision,
) -> SyncDecision {
    let source_analysis =
        cache.content_or_analyze(source_path, || backend.analyze(source_path, source_props));
    let target_analysis =
        cache.content_or_analyze(target_path, || backend.analyze(target_path, target_props));
    decision.source_content_type = Some(source_analysis.content_type);
    decision.target_content_type = Some(target_analysis.content_type);
    decision.source_fps = Some(source_props.fps);
    decision.target_fps = Some(target_props.fps);

    let use_interlaced = use_interlaced_settings(
        vv.interlaced.force_mode,
        vv.interlaced.enabled,
        source_analysis.content_type,
        target_analysis.content_type,
    );
    let params = vv.params(use_interlaced);
    let source_plan = plan_processing(
        &source_analysis,
        use_interlaced,
        vv.interlaced.deinterlace_method,
        vv.interlaced.use_ivtc,
    );
    let target_plan = plan_processing(
        &target_analysis,
        use_interlaced,
        vv.interlaced.deinterlace_method,
        vv.interlaced.use_ivtc,
    );
    tracing::info!(
        "[VideoVerified] Content: source={} ({}), target={} ({}), profile={}",
        source_analysis.content_type.name(),
        source_plan.strategy.name(),
        target_analysis.content_type.name(),
        target_plan.strategy.name(),
        if use_interlaced { "interlaced" } else { "progressive" }
    );

    let source_request = OpenRequest {
        path: source_path,
        props: source_props,
        content_type: source_analysis.content_type,
        plan: source_plan,
        timestamps: load_timestamps(backend, cache, source_path, source_props, vv.use_pts_precision),
    };
    let target_request = OpenRequest {
        path: target_path,
        props: target_props,
        content_type: target_analysis.content_type,
        plan: target_plan,
        timestamps: load_timestamps(backend, cache, target_path, target_props, vv.use_pts_precision),
    };

    let opened = backend
        .open(&source_request)
        .map(HandleGuard::new)
        .and_then(|s| backend.open(&target_request).map(|t| (s, HandleGuard::new(t))));
    let (source, target) = match opened {
        Ok(handles) => handles,
        Err(e) => {
            tracing::warn!("[VideoVerified] Failed to open videos: {}", e);
            decision.reason = SyncReason::FallbackVideoOpenFailed;
            return decision;
        }
    };

    let duration_ms = duration_hint_ms
        .filter(|d| *d > 0.0)
        .or_else(|| Some(source_props.duration_ms).filter(|d| *d > 0.0))
        .unwrap_or(DEFAULT_DURATION_MS);
    let checkpoints = select_checkpoint_times(duration_ms, params.num_checkpoints);

    let source_frame_ms = frame_duration_ms(source.fps());
    let correlation_frames = pure_correlation_ms / source_frame_ms;
    let candidates = generate_frame_candidates(correlation_frames, params.search_range_frames);
    let tolerance = if source_plan.uses_field_matching() || target_plan.uses_field_matching() {
        vv.ivtc_tolerance_frames
    } else {
        0
    };

    tracing::info!(
        "[VideoVerified] Correlation {:.2} frames, testing candidates {:?} at {} checkpoints",
        correlation_frames,
        candidates,
        checkpoints.len()
    );

    let ctx = QualityContext {
        source: &*source,
        target: &*target,
        comparator: &params.comparator,
        sequence_length: params.sequence_length,
        tolerance,
    };
    let scores: Vec<_> = candidates
        .iter()
        .map(|&offset| {
            let score = measure_candidate_quality(&ctx, offset, &checkpoints);
            tracing::info!(
                "[VideoVerified] Offset {:+} ({:+.1}ms): score={:.2}, verified={}/{}, avg_dist={:.1}",
                score.frame_offset,
                score.approx_ms,
                score.score,
                score.sequence_verified,
                checkpoints.len(),
                score.avg_distance
            );
            score
        })
        .collect();

    decision.checkpoints = checkpoints;
    decision.best_avg_distance = best_avg_distance(&scores);

    let verified_winner = select_best(&scores).filter(|w| w.sequence_verified > 0).cloned();
    let Some(winner) = verified_winner else {
        decision.reason = SyncReason::FallbackNoFrameMatches;
        decision.suggested_threshold = decision.best_avg_distance.and_then(suggested_threshold);
        tracing::warn!(
            "[VideoVerified] No candidate passed sequence verification, using audio correlation"
        );
        if let Some(avg) = decision.best_avg_distance {
            tracing::warn!("[VideoVerified] Best average distance: {:.1}", avg);
        }
        if let Some(suggested) = decision.suggested_threshold {
            let key = match params.comparator.method() {
                ComparisonMethod::Hash => "hash_threshold",
                ComparisonMethod::Ssim | ComparisonMethod::Mse => "ssim_mse_threshold",
            };
            tracing::warn!("[VideoVerified] TIP: try {} = {}", key, suggested);
        }
        decision.candidate_scores = scores;
        return decision;
    };

    if let Some(zero) = zero_preferred(&winner, &scores, vv.min_quality_advantage) {
        tracing::info!(
            "[VideoVerified] Offset {:+} (score {:.2}) not clearly better than 0 (score {:.2}), keeping 0",
            winner.frame_offset,
            winner.score,
            zero.score
        );
        decision.reason = SyncReason::ZeroPreferred;
        decision.selected_frame_offset = Some(0);
        decision.video_offset_ms = Some(0.0);
        decision.final_offset_ms = Some(decision.global_shift_ms);
        decision.candidate_scores = scores;
        return decision;
    }

    let refined = refine_offset(&winner, &*source, &*target, vv.use_pts_precision);
    tracing::info!(
        "[VideoVerified] Selected offset {:+} frames = {:+.3}ms (audio {:+.3}ms)",
        winner.frame_offset,
        refined.offset_ms,
        pure_correlation_ms
    );

    decision.reason = SyncReason::FrameMatched;
    decision.selected_frame_offset = Some(winner.frame_offset);
    decision.sub_frame_precision_used = refined.sub_frame_precision_used;
    decision.video_offset_ms = Some(refined.offset_ms);
    decision.final_offset_ms = Some(refined.offset_ms + decision.global_shift_ms);
    decision.candidate_scores = scores;
    decision
}
