//! Candidate ranking and the zero-preference rule.

use std::cmp::Ordering;

use crate::subtitles::frame_utils::types::CandidateScore;

/// Average distance below which a threshold suggestion is worth making.
const SUGGESTION_CEILING: f64 = 40.0;

/// Order two candidates by (verified checkpoints, score, -avg distance).
pub fn rank(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    a.sequence_verified
        .cmp(&b.sequence_verified)
        .then_with(|| a.score.total_cmp(&b.score))
        .then_with(|| b.avg_distance.total_cmp(&a.avg_distance))
}

/// Highest-ranked candidate. Ties keep the earliest candidate.
pub fn select_best(scores: &[CandidateScore]) -> Option<&CandidateScore> {
    scores.iter().fold(None, |best, candidate| match best {
        Some(current) if rank(candidate, current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}

/// The zero-offset candidate when it should replace `winner`.
///
/// Zero must itself be sequence verified and score within
/// `min_quality_advantage` of the winner.
pub fn zero_preferred<'a>(
    winner: &CandidateScore,
    scores: &'a [CandidateScore],
    min_quality_advantage: f64,
) -> Option<&'a CandidateScore> {
    if winner.frame_offset == 0 {
        return None;
    }
    scores
        .iter()
        .find(|c| c.frame_offset == 0)
        .filter(|zero| zero.sequence_verified > 0)
        .filter(|zero| winner.score - zero.score <= min_quality_advantage)
}

/// Average distance of the highest-ranked candidate, when it compared any
/// frames.
pub fn best_avg_distance(scores: &[CandidateScore]) -> Option<f64> {
    select_best(scores)
        .map(|best| best.avg_distance)
        .filter(|d| d.is_finite())
}

/// Threshold to suggest when nothing verified: just above the best
/// average distance, when that distance is close enough to be plausible.
pub fn suggested_threshold(best_avg_distance: f64) -> Option<u32> {
    (best_avg_distance.is_finite() && best_avg_distance >= 0.0 && best_avg_distance < SUGGESTION_CEILING)
        .then(|| best_avg_distance.floor() as u32 + 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(frame_offset: i32, verified: usize, score: f64, avg: f64) -> CandidateScore {
        CandidateScore {
            frame_offset,
            approx_ms: 0.0,
            score,
            matched_checkpoints: verified,
            sequence_verified: verified,
            avg_distance: avg,
            observations: Vec::new(),
        }
    }

    #[test]
    fn test_verified_count_dominates_score() {
        let scores = vec![candidate(0, 1, 9.0, 1.0), candidate(1, 2, 0.5, 30.0)];
        assert_eq!(select_best(&scores).unwrap().frame_offset, 1);
    }

    #[test]
    fn test_distance_breaks_score_ties() {
        let scores = vec![candidate(-1, 2, 4.0, 3.0), candidate(2, 2, 4.0, 1.0)];
        assert_eq!(select_best(&scores).unwrap().frame_offset, 2);
    }

    #[test]
    fn test_full_tie_keeps_first() {
        let scores = vec![candidate(-2, 3, 6.0, 0.0), candidate(-1, 3, 6.0, 0.0)];
        assert_eq!(select_best(&scores).unwrap().frame_offset, -2);
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_zero_preferred_within_margin() {
        let scores = vec![candidate(-1, 5, 10.0, 0.0), candidate(0, 5, 9.95, 0.0)];
        let winner = select_best(&scores).unwrap();

        let zero = zero_preferred(winner, &scores, 0.1).unwrap();
        assert_eq!(zero.frame_offset, 0);
        assert!(zero_preferred(winner, &scores, 0.01).is_none());
    }

    #[test]
    fn test_zero_must_be_verified() {
        let scores = vec![candidate(-1, 5, 10.0, 0.0), candidate(0, 0, 10.0, 0.0)];
        assert!(zero_preferred(&scores[0], &scores, 1.0).is_none());
    }

    #[test]
    fn test_suggested_threshold() {
        assert_eq!(suggested_threshold(17.6), Some(22));
        assert_eq!(suggested_threshold(40.0), None);
        assert_eq!(suggested_threshold(f64::INFINITY), None);

        let scores = vec![candidate(0, 0, 0.0, f64::INFINITY), candidate(1, 0, 0.0, 25.0)];
        assert_eq!(best_avg_distance(&scores), Some(25.0));
    }

    #[test]
    fn test_best_avg_distance_follows_ranking() {
        // Offset 1 ranks first on score even though offset 0 is closer.
        let scores = vec![candidate(0, 0, 0.05, 12.0), candidate(1, 0, 0.3, 31.0)];
        assert_eq!(best_avg_distance(&scores), Some(31.0));
        assert_eq!(best_avg_distance(&scores).and_then(suggested_threshold), Some(36));

        let unread = vec![candidate(0, 0, 0.0, f64::INFINITY)];
        assert_eq!(best_avg_distance(&unread), None);
        assert_eq!(best_avg_distance(&[]), None);
    }
}
