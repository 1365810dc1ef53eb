//! Sub-frame offset refinement.

use crate::subtitles::frame_utils::reader::VideoHandle;
use crate::subtitles::frame_utils::timing::frame_duration_ms;
use crate::subtitles::frame_utils::types::{CandidateScore, MatchObservation};

/// Millisecond offset for a selected frame offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Refinement {
    pub offset_ms: f64,
    /// Whether presentation timestamps produced the value.
    pub sub_frame_precision_used: bool,
    /// Frame pairs that contributed a timestamp difference.
    pub pairs_used: usize,
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Pairs to measure: sequence-verified ones, else single-frame matches.
fn matched_pairs(winner: &CandidateScore) -> Vec<&MatchObservation> {
    let verified: Vec<_> = winner
        .observations
        .iter()
        .filter(|o| o.sequence_verified)
        .collect();
    if !verified.is_empty() {
        return verified;
    }
    winner.observations.iter().filter(|o| o.is_match).collect()
}

/// Turn the winning frame offset into milliseconds.
///
/// The default is `frame_offset × source frame duration`. With
/// `use_pts_precision` and timestamps on both sides, the median of
/// `target_pts - source_pts` over matched pairs is used instead. Missing
/// timestamps fall back to the frame-based value.
pub fn refine_offset(
    winner: &CandidateScore,
    source: &dyn VideoHandle,
    target: &dyn VideoHandle,
    use_pts_precision: bool,
) -> Refinement {
    let frame_based = Refinement {
        offset_ms: f64::from(winner.frame_offset) * frame_duration_ms(source.fps()),
        sub_frame_precision_used: false,
        pairs_used: 0,
    };

    if !use_pts_precision {
        return frame_based;
    }
    if !source.has_pts() || !target.has_pts() {
        tracing::debug!("[VideoVerified] PTS precision requested but timestamps unavailable");
        return frame_based;
    }

    let mut diffs: Vec<f64> = matched_pairs(winner)
        .into_iter()
        .filter_map(|o| Some(target.frame_pts(o.target_frame)? - source.frame_pts(o.source_frame)?))
        .collect();
    let pairs_used = diffs.len();

    match median(&mut diffs) {
        Some(offset_ms) => {
            tracing::info!(
                "[VideoVerified] PTS refinement: {:+.3}ms from {} pairs (frame-based {:+.3}ms)",
                offset_ms,
                pairs_used,
                frame_based.offset_ms
            );
            Refinement {
                offset_ms,
                sub_frame_precision_used: true,
                pairs_used,
            }
        }
        None => frame_based,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::frame_utils::reader::synthetic::SyntheticVideo;

    fn observation(source_frame: i64, target_frame: i64, verified: bool, is_match: bool) -> MatchObservation {
        MatchObservation {
            checkpoint_ms: 0.0,
            source_frame,
            target_frame,
            distance: 0.0,
            is_match,
            sequence_matched: 0,
            sequence_length: 10,
            sequence_verified: verified,
            sequence_avg_distance: 0.0,
        }
    }

    fn winner(frame_offset: i32, observations: Vec<MatchObservation>) -> CandidateScore {
        CandidateScore {
            frame_offset,
            approx_ms: 0.0,
            score: 0.0,
            matched_checkpoints: 0,
            sequence_verified: 0,
            avg_distance: 0.0,
            observations,
        }
    }

    #[test]
    fn test_frame_based_default() {
        let source = SyntheticVideo::new(24.0, 0, 1).with_pts();
        let target = SyntheticVideo::new(24.0, 0, 1).with_pts();
        let w = winner(-2, vec![observation(100, 98, true, true)]);

        let r = refine_offset(&w, &source, &target, false);

        assert!(!r.sub_frame_precision_used);
        assert!((r.offset_ms + 2000.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_pts_median_prefers_verified_pairs() {
        let source = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let target = SyntheticVideo::new(25.0, 0, 1).with_pts();
        // Verified pairs differ by 2, 2 and 3 frames; the unverified match by 10.
        let w = winner(
            2,
            vec![
                observation(100, 102, true, true),
                observation(200, 202, true, true),
                observation(300, 303, true, true),
                observation(400, 410, false, true),
            ],
        );

        let r = refine_offset(&w, &source, &target, true);

        assert!(r.sub_frame_precision_used);
        assert_eq!(r.pairs_used, 3);
        assert!((r.offset_ms - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_pts_even_count_averages_middle() {
        let source = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let target = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let w = winner(
            1,
            vec![
                observation(100, 101, false, true),
                observation(200, 202, false, true),
            ],
        );

        let r = refine_offset(&w, &source, &target, true);

        assert_eq!(r.pairs_used, 2);
        assert!((r.offset_ms - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_pts_unavailable_falls_back() {
        let source = SyntheticVideo::new(25.0, 0, 1);
        let target = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let w = winner(3, vec![observation(100, 103, true, true)]);

        let r = refine_offset(&w, &source, &target, true);

        assert!(!r.sub_frame_precision_used);
        assert!((r.offset_ms - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_pts_without_matches_falls_back() {
        let source = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let target = SyntheticVideo::new(25.0, 0, 1).with_pts();
        let w = winner(1, vec![observation(100, 101, false, false)]);

        let r = refine_offset(&w, &source, &target, true);

        assert!(!r.sub_frame_precision_used);
        assert_eq!(r.pairs_used, 0);
    }
}
