//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Defaults for every missing key
//!
//! # Example
//!
//! ```no_run
//! use vsg_framesync::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/framesync.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("Sequence length: {}", config.settings().video_verified.sequence_length);
//!
//! // Modify a setting
//! config.settings_mut().video_verified.use_pts_precision = true;
//!
//! // Save just the video_verified section atomically
//! config.update_section(ConfigSection::VideoVerified).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, InterlacedSettings, LoggingSettings, OutputSettings, Settings,
    VideoVerifiedSettings,
};
