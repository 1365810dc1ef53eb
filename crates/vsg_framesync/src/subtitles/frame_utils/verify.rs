//! Sequence verification.
//!
//! A candidate offset is confirmed by comparing a run of consecutive frame
//! pairs at exactly the positions the offset predicts. There is no search
//! window: searching here would quietly absorb a wrong offset. The only
//! slack is a per-step tolerance used when field matching may pick a
//! neighbouring frame on one side.

use super::compare::FrameComparator;
use super::reader::VideoHandle;
use super::types::SequenceVerifyResult;

/// Fraction of steps that must match for a sequence to count as verified.
pub const SEQUENCE_MATCH_RATIO: f64 = 0.7;

/// Matches needed out of `len` steps: 70% rounded up, at least one.
pub fn required_matches(len: usize) -> usize {
    (len * 7).div_ceil(10).max(1)
}

/// Target index offsets tried at each step: 0, -1, +1, -2, +2, ...
fn tolerance_deltas(tolerance: u32) -> impl Iterator<Item = i64> {
    std::iter::once(0).chain((1..=i64::from(tolerance)).flat_map(|d| [-d, d]))
}

/// Compare `length` consecutive pairs starting at the given indices.
///
/// `target_start` must come from a time lookup on the target (source time
/// plus the candidate offset), not from index arithmetic. Steps whose source
/// frame cannot be read, or where no target frame is readable, count as
/// non-matches.
pub fn verify_sequence(
    source: &dyn VideoHandle,
    target: &dyn VideoHandle,
    source_start: i64,
    target_start: i64,
    length: usize,
    comparator: &FrameComparator,
    tolerance: u32,
) -> SequenceVerifyResult {
    let mut distances = Vec::with_capacity(length);
    let mut matched_count = 0;

    for step in 0..length as i64 {
        let source_frame = match source.frame_at_index(source_start + step) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::trace!("[VideoVerified] Sequence step {}: {}", step, e);
                continue;
            }
        };

        let best = tolerance_deltas(tolerance)
            .map(|delta| target_start + step + delta)
            .filter(|&index| index >= 0)
            .filter_map(|index| target.frame_at_index(index).ok())
            .map(|frame| comparator.compare(&source_frame, &frame))
            .min_by(|a, b| a.distance.total_cmp(&b.distance));

        if let Some(result) = best {
            distances.push(result.distance);
            if result.is_match {
                matched_count += 1;
            }
        }
    }

    let avg_distance = if distances.is_empty() {
        f64::INFINITY
    } else {
        distances.iter().sum::<f64>() / distances.len() as f64
    };

    SequenceVerifyResult {
        matched_count,
        total_count: length,
        avg_distance,
        distances,
        verified: length > 0 && matched_count >= required_matches(length),
    }
}
