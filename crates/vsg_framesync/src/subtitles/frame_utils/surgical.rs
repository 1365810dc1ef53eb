//! Frame-preserving centisecond rounding.
//!
//! ASS stores times in centiseconds. Plain floor rounding (the ASS and
//! Aegisub convention) is kept for every timestamp whose floor still lands
//! on the frame the exact time belongs to. Only the timestamps where floor
//! would move the event to the previous frame are pushed up.
//!
//! Order of attempts for one timestamp:
//! 1. `floor(t/10)*10`
//! 2. `ceil(t/10)*10`
//! 3. `ceil(frame_start/10)*10` (always inside the frame for frame durations >= 10ms)

use std::collections::BTreeMap;

use serde::Serialize;

use super::timing::frame_at;
use crate::subtitles::types::SubtitleEvent;

/// How a timestamp was rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundMethod {
    /// Plain floor, identical to unadjusted output.
    Floor,
    /// Ceil of the exact time.
    Ceil,
    /// Ceil of the target frame's start time.
    FallbackCeil,
}

/// Result of rounding one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurgicalRoundResult {
    /// Output time in ms, always a multiple of 10.
    pub output_ms: i64,
    /// Whether anything other than floor was used.
    pub was_adjusted: bool,
    pub method: RoundMethod,
    /// Frame the exact time belongs to.
    pub target_frame: i64,
    /// Frame plain floor rounding would land on.
    pub floor_frame: i64,
}

/// Result of rounding one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurgicalEventResult {
    pub start: SurgicalRoundResult,
    pub end: SurgicalRoundResult,
    /// Output duration equals the floor/floor duration.
    pub duration_preserved: bool,
    /// End was moved to ceil to follow an adjusted start.
    pub coordination_applied: bool,
}

/// Counters over a batch of events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurgicalBatchStats {
    pub total_events: usize,
    /// Two per event.
    pub total_timing_points: usize,
    pub starts_adjusted: usize,
    pub ends_adjusted: usize,
    /// Subset of `ends_adjusted` that came from coordination.
    pub ends_coordinated: usize,
    pub durations_preserved: usize,
    pub durations_changed: usize,
    pub points_identical_to_floor: usize,
    pub points_different_from_floor: usize,
    pub events_with_adjustments: usize,
}

#[inline]
fn floor_cs(ms: f64) -> i64 {
    (ms / 10.0).floor() as i64 * 10
}

#[inline]
fn ceil_cs(ms: f64) -> i64 {
    (ms / 10.0).ceil() as i64 * 10
}

/// Round a single timestamp to centiseconds without leaving its frame.
pub fn surgical_round(exact_ms: f64, frame_duration_ms: f64) -> SurgicalRoundResult {
    let target_frame = frame_at(exact_ms, frame_duration_ms);

    let floor_value = floor_cs(exact_ms);
    let floor_frame = frame_at(floor_value as f64, frame_duration_ms);

    let (output_ms, method) = if floor_frame == target_frame {
        (floor_value, RoundMethod::Floor)
    } else {
        let ceil_value = ceil_cs(exact_ms);
        if frame_at(ceil_value as f64, frame_duration_ms) == target_frame {
            (ceil_value, RoundMethod::Ceil)
        } else {
            let frame_start = target_frame as f64 * frame_duration_ms;
            (ceil_cs(frame_start), RoundMethod::FallbackCeil)
        }
    };

    SurgicalRoundResult {
        output_ms,
        was_adjusted: method != RoundMethod::Floor,
        method,
        target_frame,
        floor_frame,
    }
}

/// Round an event's start and end, coordinating the end with an adjusted start.
///
/// Coordination only covers the case where start was adjusted and end was
/// not. End then moves to its ceil if that stays on end's frame and gives
/// back the floor/floor duration. An adjusted end with a floor start is left
/// as is, so its duration grows by 10ms.
pub fn surgical_round_event(
    start_ms: f64,
    end_ms: f64,
    frame_duration_ms: f64,
) -> SurgicalEventResult {
    let start = surgical_round(start_ms, frame_duration_ms);
    let mut end = surgical_round(end_ms, frame_duration_ms);

    let floor_duration = floor_cs(end_ms) - floor_cs(start_ms);

    let mut coordination_applied = false;
    if start.was_adjusted && !end.was_adjusted {
        let ceil_end = ceil_cs(end_ms);
        if frame_at(ceil_end as f64, frame_duration_ms) == end.target_frame
            && ceil_end - start.output_ms == floor_duration
        {
            end = SurgicalRoundResult {
                output_ms: ceil_end,
                was_adjusted: true,
                method: RoundMethod::Ceil,
                ..end
            };
            coordination_applied = true;
        }
    }

    SurgicalEventResult {
        start,
        end,
        duration_preserved: end.output_ms - start.output_ms == floor_duration,
        coordination_applied,
    }
}

/// Round every non-comment event.
///
/// Results are keyed by the event's index in `events`.
pub fn surgical_round_batch(
    events: &[SubtitleEvent],
    frame_duration_ms: f64,
) -> (BTreeMap<usize, SurgicalEventResult>, SurgicalBatchStats) {
    let mut results = BTreeMap::new();
    let mut stats = SurgicalBatchStats::default();

    for (idx, event) in events.iter().enumerate() {
        if event.is_comment {
            continue;
        }

        let result = surgical_round_event(event.start_ms, event.end_ms, frame_duration_ms);

        stats.total_events += 1;
        stats.total_timing_points += 2;
        for adjusted in [result.start.was_adjusted, result.end.was_adjusted] {
            if adjusted {
                stats.points_different_from_floor += 1;
            } else {
                stats.points_identical_to_floor += 1;
            }
        }
        if result.start.was_adjusted {
            stats.starts_adjusted += 1;
        }
        if result.end.was_adjusted {
            stats.ends_adjusted += 1;
        }
        if result.coordination_applied {
            stats.ends_coordinated += 1;
        }
        if result.duration_preserved {
            stats.durations_preserved += 1;
        } else {
            stats.durations_changed += 1;
        }
        if result.start.was_adjusted || result.end.was_adjusted {
            stats.events_with_adjustments += 1;
        }

        results.insert(idx, result);
    }

    if stats.events_with_adjustments > 0 {
        tracing::debug!(
            "[SurgicalRound] {}/{} events adjusted ({} starts, {} ends, {} coordinated), {} durations changed",
            stats.events_with_adjustments,
            stats.total_events,
            stats.starts_adjusted,
            stats.ends_adjusted,
            stats.ends_coordinated,
            stats.durations_changed
        );
    }

    (results, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NTSC_FILM: f64 = 1000.0 / 23.976;

    #[test]
    fn test_floor_kept_when_correct() {
        let result = surgical_round(1000.0, NTSC_FILM);

        assert_eq!(result.output_ms, 1000);
        assert_eq!(result.method, RoundMethod::Floor);
        assert!(!result.was_adjusted);
        assert_eq!(result.target_frame, result.floor_frame);
    }

    #[test]
    fn test_ceil_when_floor_lands_early() {
        let result = surgical_round(4171.0, NTSC_FILM);

        assert_eq!(result.target_frame, 100);
        assert_eq!(result.floor_frame, 99);
        assert_eq!(result.output_ms, 4180);
        assert_eq!(result.method, RoundMethod::Ceil);
        assert!(result.was_adjusted);
    }

    #[test]
    fn test_fallback_ceil() {
        // Frames shorter than a centisecond: frame 3 spans 12..16, so
        // floor 10 (frame 2) and ceil 20 (frame 5) both miss it.
        let result = surgical_round(13.0, 4.0);

        assert_eq!(result.target_frame, 3);
        assert_eq!(result.floor_frame, 2);
        assert_eq!(result.method, RoundMethod::FallbackCeil);
        assert_eq!(result.output_ms, 20);
        assert!(result.was_adjusted);
    }

    #[test]
    fn test_coordination_preserves_duration() {
        let result = surgical_round_event(4171.0, 5105.0, NTSC_FILM);

        assert_eq!(result.start.output_ms, 4180);
        assert_eq!(result.end.output_ms, 5110);
        assert_eq!(result.end.method, RoundMethod::Ceil);
        assert!(result.end.was_adjusted);
        assert!(result.coordination_applied);
        assert!(result.duration_preserved);
    }

    #[test]
    fn test_end_only_adjustment_is_not_coordinated() {
        // Known limitation: only an adjusted start pulls the end along.
        let result = surgical_round_event(1000.0, 4171.0, NTSC_FILM);

        assert!(!result.start.was_adjusted);
        assert!(result.end.was_adjusted);
        assert!(!result.coordination_applied);
        assert!(!result.duration_preserved);
        assert_eq!(result.end.output_ms - result.start.output_ms, 3180);
    }

    #[test]
    fn test_batch_skips_comments_and_counts() {
        let mut comment = SubtitleEvent::new(4171.0, 5105.0, "note");
        comment.is_comment = true;
        let events = vec![
            SubtitleEvent::new(1000.0, 2000.0, "plain"),
            comment,
            SubtitleEvent::new(4171.0, 5105.0, "coordinated"),
            SubtitleEvent::new(1000.0, 4171.0, "end only"),
        ];

        let (results, stats) = surgical_round_batch(&events, NTSC_FILM);

        assert_eq!(results.len(), 3);
        assert!(!results.contains_key(&1));
        assert!(results[&2].coordination_applied);

        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.total_timing_points, 6);
        assert_eq!(stats.starts_adjusted, 1);
        assert_eq!(stats.ends_adjusted, 2);
        assert_eq!(stats.ends_coordinated, 1);
        assert_eq!(stats.durations_preserved, 2);
        assert_eq!(stats.durations_changed, 1);
        assert_eq!(stats.points_different_from_floor, 3);
        assert_eq!(stats.points_identical_to_floor, 3);
        assert_eq!(stats.events_with_adjustments, 2);
    }

    proptest! {
        #[test]
        fn test_never_crosses_frame(t in 0.0f64..10_000_000.0, fps in 10.0f64..100.0) {
            let d = 1000.0 / fps;
            let result = surgical_round(t, d);
            prop_assert_eq!(frame_at(result.output_ms as f64, d), frame_at(t, d));
            prop_assert_eq!(result.output_ms % 10, 0);
        }

        #[test]
        fn test_degrades_to_floor(t in 0.0f64..10_000_000.0, fps in 10.0f64..100.0) {
            let d = 1000.0 / fps;
            let floor_value = floor_cs(t);
            let result = surgical_round(t, d);
            if frame_at(floor_value as f64, d) == frame_at(t, d) {
                prop_assert_eq!(result.output_ms, floor_value);
                prop_assert_eq!(result.method, RoundMethod::Floor);
            }
        }

        #[test]
        fn test_coordination_keeps_floor_duration(
            start in 0.0f64..5_000_000.0,
            length in 0.0f64..20_000.0,
            fps in 10.0f64..100.0,
        ) {
            let end = start + length;
            let result = surgical_round_event(start, end, 1000.0 / fps);
            if result.coordination_applied {
                prop_assert_eq!(
                    result.end.output_ms - result.start.output_ms,
                    floor_cs(end) - floor_cs(start)
                );
            }
        }
    }
}
