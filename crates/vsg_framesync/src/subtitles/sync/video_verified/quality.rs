//! Candidate quality measurement.
//!
//! Each candidate frame offset is tested at every checkpoint. The strict
//! measure runs sequence verification from the checkpoint; the legacy
//! windowed measure only looks for the best single frame nearby.

use crate::subtitles::frame_utils::compare::FrameComparator;
use crate::subtitles::frame_utils::reader::VideoHandle;
use crate::subtitles::frame_utils::timing::{frame_at, frame_duration_ms};
use crate::subtitles::frame_utils::types::{CandidateScore, MatchObservation};
use crate::subtitles::frame_utils::verify::verify_sequence;

/// Score for a verified checkpoint, scaled by the matched fraction.
const VERIFIED_WEIGHT: f64 = 2.0;
/// Score for an initial match whose sequence did not verify.
const SINGLE_MATCH_SCORE: f64 = 0.3;
/// Ceiling of the partial credit for a near miss.
const NEAR_MISS_SCORE: f64 = 0.1;

/// Frames and comparison settings shared by every candidate.
pub struct QualityContext<'a> {
    pub source: &'a dyn VideoHandle,
    pub target: &'a dyn VideoHandle,
    pub comparator: &'a FrameComparator,
    pub sequence_length: usize,
    /// Per-step tolerance for sequence verification.
    pub tolerance: u32,
}

/// Frame index for a time, from real timestamps when the handle has them.
fn index_for_time(handle: &dyn VideoHandle, time_ms: f64) -> i64 {
    handle
        .frame_index_for_time(time_ms)
        .unwrap_or_else(|| frame_at(time_ms, frame_duration_ms(handle.fps())))
}

/// Source and target frame indices for one checkpoint under an offset.
///
/// The target index goes through the target's own time lookup. None when
/// either side lands before the first frame.
fn frame_pair(ctx: &QualityContext<'_>, frame_offset: i32, checkpoint_ms: f64) -> Option<(i64, i64)> {
    let source_frame_ms = frame_duration_ms(ctx.source.fps());
    let source_index = index_for_time(ctx.source, checkpoint_ms);
    let target_time = checkpoint_ms + f64::from(frame_offset) * source_frame_ms;
    let target_index = index_for_time(ctx.target, target_time);

    (source_index >= 0 && target_index >= 0).then_some((source_index, target_index))
}

fn average(distances: &[f64]) -> f64 {
    if distances.is_empty() {
        f64::INFINITY
    } else {
        distances.iter().sum::<f64>() / distances.len() as f64
    }
}

/// Measure a candidate with sequence verification at every checkpoint.
///
/// Checkpoints whose frames cannot be read produce no observation.
pub fn measure_candidate_quality(
    ctx: &QualityContext<'_>,
    frame_offset: i32,
    checkpoints: &[f64],
) -> CandidateScore {
    let threshold = ctx.comparator.threshold();
    let mut score = 0.0;
    let mut matched_checkpoints = 0;
    let mut sequence_verified = 0;
    let mut distances = Vec::with_capacity(checkpoints.len());
    let mut observations = Vec::with_capacity(checkpoints.len());

    for &checkpoint_ms in checkpoints {
        let Some((source_index, target_index)) = frame_pair(ctx, frame_offset, checkpoint_ms) else {
            tracing::debug!(
                "[VideoVerified] Offset {:+}: checkpoint {:.0}ms before first frame",
                frame_offset,
                checkpoint_ms
            );
            continue;
        };

        let frames = ctx
            .source
            .frame_at_index(source_index)
            .and_then(|s| ctx.target.frame_at_index(target_index).map(|t| (s, t)));
        let (source_frame, target_frame) = match frames {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(
                    "[VideoVerified] Offset {:+}: no frames at {:.0}ms: {}",
                    frame_offset,
                    checkpoint_ms,
                    e
                );
                continue;
            }
        };

        let initial = ctx.comparator.compare(&source_frame, &target_frame);
        let sequence = verify_sequence(
            ctx.source,
            ctx.target,
            source_index,
            target_index,
            ctx.sequence_length,
            ctx.comparator,
            ctx.tolerance,
        );

        if sequence.verified {
            sequence_verified += 1;
            score += VERIFIED_WEIGHT * sequence.matched_count as f64 / sequence.total_count as f64;
        } else if initial.is_match {
            score += SINGLE_MATCH_SCORE;
        } else if threshold > 0.0 {
            score += (NEAR_MISS_SCORE - initial.distance / (4.0 * threshold)).max(0.0);
        }
        if sequence.verified || initial.is_match {
            matched_checkpoints += 1;
        }

        tracing::trace!(
            "[VideoVerified] Offset {:+} @ {:.0}ms: src={} tgt={} dist={:.1} seq={}/{}",
            frame_offset,
            checkpoint_ms,
            source_index,
            target_index,
            initial.distance,
            sequence.matched_count,
            sequence.total_count
        );

        distances.push(initial.distance);
        observations.push(MatchObservation {
            checkpoint_ms,
            source_frame: source_index,
            target_frame: target_index,
            distance: initial.distance,
            is_match: initial.is_match,
            sequence_matched: sequence.matched_count,
            sequence_length: sequence.total_count,
            sequence_verified: sequence.verified,
            sequence_avg_distance: sequence.avg_distance,
        });
    }

    CandidateScore {
        frame_offset,
        approx_ms: f64::from(frame_offset) * frame_duration_ms(ctx.source.fps()),
        score,
        matched_checkpoints,
        sequence_verified,
        avg_distance: average(&distances),
        observations,
    }
}

/// Measure a candidate by the best single-frame distance within
/// `±window_radius` target frames of each checkpoint.
///
/// Tolerant of small misalignments, so it is never used to verify an
/// offset. Observations carry no sequence data.
pub fn measure_windowed_quality(
    ctx: &QualityContext<'_>,
    frame_offset: i32,
    checkpoints: &[f64],
    window_radius: i32,
) -> CandidateScore {
    let threshold = ctx.comparator.threshold();
    let radius = i64::from(window_radius.max(0));
    let mut score = 0.0;
    let mut matched_checkpoints = 0;
    let mut distances = Vec::new();
    let mut observations = Vec::new();

    for &checkpoint_ms in checkpoints {
        let Some((source_index, target_index)) = frame_pair(ctx, frame_offset, checkpoint_ms) else {
            continue;
        };
        let Ok(source_frame) = ctx.source.frame_at_index(source_index) else {
            continue;
        };

        let best = (target_index - radius..=target_index + radius)
            .filter(|&index| index >= 0)
            .filter_map(|index| {
                let frame = ctx.target.frame_at_index(index).ok()?;
                Some((index, ctx.comparator.compare(&source_frame, &frame)))
            })
            .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance));
        let Some((best_index, best)) = best else {
            continue;
        };

        if threshold > 0.0 {
            if best.is_match {
                score += 1.0 - best.distance / (2.0 * threshold);
            } else {
                score += (0.5 - best.distance / (4.0 * threshold)).max(0.0);
            }
        } else if best.is_match {
            score += 1.0;
        }
        if best.is_match {
            matched_checkpoints += 1;
        }

        distances.push(best.distance);
        observations.push(MatchObservation {
            checkpoint_ms,
            source_frame: source_index,
            target_frame: best_index,
            distance: best.distance,
            is_match: best.is_match,
            sequence_matched: 0,
            sequence_length: 0,
            sequence_verified: false,
            sequence_avg_distance: f64::INFINITY,
        });
    }

    CandidateScore {
        frame_offset,
        approx_ms: f64::from(frame_offset) * frame_duration_ms(ctx.source.fps()),
        score,
        matched_checkpoints,
        sequence_verified: 0,
        avg_distance: average(&distances),
        observations,
    }
}
