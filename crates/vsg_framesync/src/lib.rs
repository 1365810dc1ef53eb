//! VSG Frame Sync - frame-accurate subtitle timing.
//!
//! Verifies an audio-correlation delay against the video frames of two
//! encodes, applies the frame-exact offset to subtitle events, and rounds
//! the result to centiseconds without moving any event to another frame.
//! Subtitle parsing, muxing and the UI live elsewhere.

pub mod config;
pub mod logging;
pub mod subtitles;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_returns_value() {
        assert!(!version().is_empty());
    }
}
