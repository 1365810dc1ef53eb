//! Frame/time conversion functions.
//!
//! Pure functions for converting between frame numbers and timestamps,
//! plus the checkpoint and candidate generators used by frame matching.
//! All functions are deterministic and have no side effects.
//!
//! Frame math is floor-based: frame N occupies `[N*d, (N+1)*d)`.

use std::collections::BTreeSet;

/// Small epsilon for floating-point comparisons.
pub(crate) const EPSILON: f64 = 1e-6;

/// Checkpoint positions as a percentage of video duration.
const CHECKPOINT_POSITIONS: [u32; 5] = [15, 30, 50, 70, 85];

// ============================================================================
// FRAME START (Floor-based, Deterministic)
// ============================================================================

/// Convert timestamp to frame number using FLOOR with epsilon protection.
///
/// This gives the frame that is currently displaying at the given time.
///
/// # Examples
/// ```
/// use vsg_framesync::subtitles::frame_utils::timing::time_to_frame_floor;
///
/// // At 24000/1001 fps (frame_duration = 41.708ms):
/// let fps = 24000.0 / 1001.0;
/// assert_eq!(time_to_frame_floor(0.0, fps), 0);
/// assert_eq!(time_to_frame_floor(41.707, fps), 0);  // Still in frame 0
/// assert_eq!(time_to_frame_floor(41.709, fps), 1);  // Frame 1 starts
/// assert_eq!(time_to_frame_floor(1001.0, fps), 24); // Frame 24
/// ```
pub fn time_to_frame_floor(time_ms: f64, fps: f64) -> i64 {
    frame_at(time_ms, frame_duration_ms(fps))
}

/// Frame index containing `time_ms` for a given frame duration.
///
/// The epsilon protects against FP errors where `time_ms` sits a hair
/// under an exact frame boundary.
#[inline]
pub fn frame_at(time_ms: f64, frame_duration_ms: f64) -> i64 {
    ((time_ms + EPSILON) / frame_duration_ms).floor() as i64
}

/// Convert frame number to its START timestamp (exact, no rounding).
///
/// # Examples
/// ```
/// use vsg_framesync::subtitles::frame_utils::timing::frame_to_time_floor;
///
/// assert!((frame_to_time_floor(0, 23.976) - 0.0).abs() < 0.001);
/// assert!((frame_to_time_floor(24, 23.976) - 1001.0).abs() < 0.1);
/// ```
pub fn frame_to_time_floor(frame_num: i64, fps: f64) -> f64 {
    frame_num as f64 * frame_duration_ms(fps)
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Calculate frame duration in milliseconds.
#[inline]
pub fn frame_duration_ms(fps: f64) -> f64 {
    1000.0 / fps
}

/// Convert FPS to fraction for NTSC rates.
///
/// NTSC standards use fractional rates (N×1000/1001) to avoid color/audio drift.
pub fn fps_to_fraction(fps: f64) -> (u32, u32) {
    if (fps - 23.976).abs() < 0.01 {
        (24000, 1001) // 23.976fps - NTSC film
    } else if (fps - 29.97).abs() < 0.01 {
        (30000, 1001) // 29.97fps - NTSC video
    } else if (fps - 59.94).abs() < 0.01 {
        (60000, 1001)
    } else if (fps - 24.0).abs() < 0.01 {
        (24, 1)
    } else if (fps - 25.0).abs() < 0.01 {
        (25, 1) // PAL
    } else if (fps - 30.0).abs() < 0.01 {
        (30, 1)
    } else if (fps - 50.0).abs() < 0.01 {
        (50, 1)
    } else if (fps - 60.0).abs() < 0.01 {
        (60, 1)
    } else {
        ((fps * 1000.0).round() as u32, 1000)
    }
}

/// Parse FPS fraction string (e.g., "24000/1001") to float.
///
/// Returns None for malformed input or a zero denominator.
pub fn parse_fps_fraction(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, denom)) => {
            let num: f64 = num.trim().parse().ok()?;
            let denom: f64 = denom.trim().parse().ok()?;
            if denom != 0.0 {
                Some(num / denom)
            } else {
                None
            }
        }
        None => s.trim().parse().ok(),
    }
}

/// Format a timestamp as `HH:MM:SS.cc` for reports.
///
/// Truncates to centiseconds; negative times display as zero.
pub fn format_display_timestamp(time_ms: f64) -> String {
    let total_cs = (time_ms.max(0.0) / 10.0) as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{:02}:{:02}:{:02}.{:02}", hours, mins, secs, cs)
}

// ============================================================================
// CANDIDATES AND CHECKPOINTS
// ============================================================================

/// Generate candidate frame offsets centered on a correlation value.
///
/// Always contains 0, so a wrong correlation estimate cannot hide a true
/// zero offset, plus `round(correlation_frames) ± search_range_frames`.
///
/// # Arguments
/// * `correlation_frames` - Audio correlation converted to frames (can be fractional)
/// * `search_range_frames` - How many frames on each side to search
///
/// # Returns
/// Sorted, deduplicated list of integer frame offsets to test
pub fn generate_frame_candidates(correlation_frames: f64, search_range_frames: i32) -> Vec<i32> {
    let mut candidates = BTreeSet::new();

    let base_frame = correlation_frames.round() as i32;
    let radius = search_range_frames.max(0);

    candidates.insert(0);
    candidates.insert(base_frame);
    for delta in -radius..=radius {
        candidates.insert(base_frame + delta);
    }

    candidates.into_iter().collect()
}

/// Select checkpoint times distributed across video duration.
///
/// Uses fixed positions (15/30/50/70/85%) truncated to `num_checkpoints`,
/// so no checkpoint sits at the very start or end of the video.
pub fn select_checkpoint_times(duration_ms: f64, num_checkpoints: usize) -> Vec<f64> {
    CHECKPOINT_POSITIONS
        .iter()
        .take(num_checkpoints)
        .map(|&pos| duration_ms * pos as f64 / 100.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_to_frame_floor() {
        let fps = 24000.0 / 1001.0;

        assert_eq!(time_to_frame_floor(0.0, fps), 0);
        assert_eq!(time_to_frame_floor(41.0, fps), 0); // Still in frame 0
        assert_eq!(time_to_frame_floor(42.0, fps), 1);
        assert_eq!(time_to_frame_floor(1001.0, fps), 24);

        // Rounded 23.976 runs slightly slow: 1001ms is still frame 23.
        assert_eq!(time_to_frame_floor(1001.0, 23.976), 23);
    }

    #[test]
    fn test_frame_at_negative_time() {
        assert_eq!(frame_at(-10.0, 41.708), -1);
    }

    #[test]
    fn test_fps_to_fraction() {
        assert_eq!(fps_to_fraction(23.976), (24000, 1001));
        assert_eq!(fps_to_fraction(29.97), (30000, 1001));
        assert_eq!(fps_to_fraction(25.0), (25, 1));
    }

    #[test]
    fn test_parse_fps_fraction() {
        assert!((parse_fps_fraction("24000/1001").unwrap() - 23.976).abs() < 0.001);
        assert!((parse_fps_fraction("25").unwrap() - 25.0).abs() < 0.001);
        assert!(parse_fps_fraction("invalid").is_none());
        assert!(parse_fps_fraction("0/0").is_none());
    }

    #[test]
    fn test_format_display_timestamp() {
        assert_eq!(format_display_timestamp(107_129.0), "00:01:47.12");
        assert_eq!(format_display_timestamp(3_723_456.0), "01:02:03.45");
        assert_eq!(format_display_timestamp(-500.0), "00:00:00.00");
    }

    #[test]
    fn test_generate_frame_candidates() {
        let candidates = generate_frame_candidates(2.3, 3);

        assert_eq!(candidates, vec![-1, 0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_generate_frame_candidates_far_from_zero() {
        let candidates = generate_frame_candidates(-10.6, 1);

        assert_eq!(candidates, vec![-12, -11, -10, 0]);
    }

    #[test]
    fn test_generate_frame_candidates_zero_radius() {
        assert_eq!(generate_frame_candidates(-1.1, 0), vec![-1, 0]);
    }

    #[test]
    fn test_select_checkpoint_times() {
        let duration = 1000000.0;
        let checkpoints = select_checkpoint_times(duration, 5);

        assert_eq!(checkpoints.len(), 5);
        assert!((checkpoints[0] - 150000.0).abs() < 1.0);
        assert!((checkpoints[2] - 500000.0).abs() < 1.0);
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_select_checkpoint_times_truncated() {
        let checkpoints = select_checkpoint_times(100_000.0, 2);
        assert_eq!(checkpoints, vec![15_000.0, 30_000.0]);
        assert_eq!(select_checkpoint_times(100_000.0, 9).len(), 5);
    }

    #[test]
    fn test_roundtrip_floor() {
        let fps = 23.976;

        for frame in 0..100 {
            let time = frame_to_time_floor(frame, fps);
            let recovered = time_to_frame_floor(time, fps);
            assert_eq!(frame, recovered, "Roundtrip failed for frame {}", frame);
        }
    }

    proptest! {
        #[test]
        fn test_candidates_contain_zero_and_estimate(
            correlation_frames in -500.0f64..500.0,
            radius in 0i32..10,
        ) {
            let candidates = generate_frame_candidates(correlation_frames, radius);
            let estimate = correlation_frames.round() as i32;
            prop_assert!(candidates.contains(&0));
            prop_assert!(candidates.contains(&estimate));
            prop_assert!(candidates.contains(&(estimate - radius)));
            prop_assert!(candidates.contains(&(estimate + radius)));
            prop_assert!(candidates.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
