//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::subtitles::frame_utils::types::{
    ComparisonMethod, DeinterlaceMethod, HashAlgorithm, InterlacedForceMode,
};
use crate::subtitles::RoundingMode;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Frame matching settings.
    #[serde(default)]
    pub video_verified: VideoVerifiedSettings,

    /// Interlaced and telecine profile.
    #[serde(default)]
    pub interlaced: InterlacedSettings,

    /// Output rounding and audit settings.
    #[serde(default)]
    pub output: OutputSettings,
}

fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write logs to a file in `logs_folder`.
    #[serde(default)]
    pub file_output: bool,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file_output: false,
            logs_folder: default_logs_folder(),
        }
    }
}

/// Frame matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoVerifiedSettings {
    /// Checkpoints tested across the video (1-5).
    #[serde(default = "default_num_checkpoints")]
    pub num_checkpoints: usize,

    /// Frames searched on each side of the correlation estimate.
    #[serde(default = "default_search_range")]
    pub search_range_frames: i32,

    #[serde(default)]
    pub comparison_method: ComparisonMethod,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    #[serde(default = "default_hash_size")]
    pub hash_size: u8,

    /// Hamming distance at or below which frames match.
    #[serde(default = "default_hash_threshold")]
    pub hash_threshold: u32,

    /// Distance threshold for SSIM and MSE.
    #[serde(default = "default_ssim_mse_threshold")]
    pub ssim_mse_threshold: f64,

    /// Radius for the legacy windowed comparison.
    #[serde(default = "default_window_radius")]
    pub window_radius: i32,

    /// Consecutive frames compared per checkpoint.
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    /// Correlations beyond this many frames are accepted without matching.
    #[serde(default = "default_zero_check_frames")]
    pub zero_check_frames: u32,

    /// Score margin within which a verified zero offset is preferred.
    #[serde(default = "default_min_quality_advantage")]
    pub min_quality_advantage: f64,

    /// Refine the offset with real frame timestamps.
    #[serde(default)]
    pub use_pts_precision: bool,

    /// Per-step tolerance when field matching is involved.
    #[serde(default = "default_ivtc_tolerance")]
    pub ivtc_tolerance_frames: u32,

    /// Audit frame alignment after sync.
    #[serde(default)]
    pub frame_audit_enabled: bool,
}

fn default_num_checkpoints() -> usize {
    5
}

fn default_search_range() -> i32 {
    3
}

fn default_hash_size() -> u8 {
    16
}

fn default_hash_threshold() -> u32 {
    12
}

fn default_ssim_mse_threshold() -> f64 {
    10.0
}

fn default_window_radius() -> i32 {
    1
}

fn default_sequence_length() -> usize {
    10
}

fn default_zero_check_frames() -> u32 {
    3
}

fn default_min_quality_advantage() -> f64 {
    0.1
}

fn default_ivtc_tolerance() -> u32 {
    1
}

impl Default for VideoVerifiedSettings {
    fn default() -> Self {
        Self {
            num_checkpoints: default_num_checkpoints(),
            search_range_frames: default_search_range(),
            comparison_method: ComparisonMethod::default(),
            hash_algorithm: HashAlgorithm::default(),
            hash_size: default_hash_size(),
            hash_threshold: default_hash_threshold(),
            ssim_mse_threshold: default_ssim_mse_threshold(),
            window_radius: default_window_radius(),
            sequence_length: default_sequence_length(),
            zero_check_frames: default_zero_check_frames(),
            min_quality_advantage: default_min_quality_advantage(),
            use_pts_precision: false,
            ivtc_tolerance_frames: default_ivtc_tolerance(),
            frame_audit_enabled: false,
        }
    }
}

/// Interlaced profile. Replaces the matching parameters when either video
/// is interlaced, telecined or mixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlacedSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub force_mode: InterlacedForceMode,

    #[serde(default)]
    pub deinterlace_method: DeinterlaceMethod,

    /// Inverse telecine telecined content instead of deinterlacing it.
    #[serde(default = "default_true")]
    pub use_ivtc: bool,

    #[serde(default = "default_num_checkpoints")]
    pub num_checkpoints: usize,

    #[serde(default = "default_search_range")]
    pub search_range_frames: i32,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    #[serde(default = "default_hash_size")]
    pub hash_size: u8,

    /// Slightly looser than progressive.
    #[serde(default = "default_interlaced_hash_threshold")]
    pub hash_threshold: u32,

    #[serde(default)]
    pub comparison_method: ComparisonMethod,

    #[serde(default = "default_interlaced_ssim_mse_threshold")]
    pub ssim_mse_threshold: f64,

    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
}

fn default_interlaced_hash_threshold() -> u32 {
    15
}

fn default_interlaced_ssim_mse_threshold() -> f64 {
    15.0
}

impl Default for InterlacedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            force_mode: InterlacedForceMode::default(),
            deinterlace_method: DeinterlaceMethod::default(),
            use_ivtc: true,
            num_checkpoints: default_num_checkpoints(),
            search_range_frames: default_search_range(),
            hash_algorithm: HashAlgorithm::default(),
            hash_size: default_hash_size(),
            hash_threshold: default_interlaced_hash_threshold(),
            comparison_method: ComparisonMethod::default(),
            ssim_mse_threshold: default_interlaced_ssim_mse_threshold(),
            sequence_length: default_sequence_length(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Rounding used when writing centisecond timestamps.
    #[serde(default)]
    pub rounding: RoundingMode,

    /// Use frame-preserving rounding.
    #[serde(default = "default_true")]
    pub surgical_rounding: bool,

    /// Folder for frame audit reports. Empty disables report files.
    #[serde(default)]
    pub audit_folder: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            rounding: RoundingMode::default(),
            surgical_rounding: true,
            audit_folder: String::new(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Logging,
    VideoVerified,
    Interlaced,
    Output,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Logging => "logging",
            ConfigSection::VideoVerified => "video_verified",
            ConfigSection::Interlaced => "interlaced",
            ConfigSection::Output => "output",
        }
    }

    /// Every section, in file order.
    pub fn all() -> [ConfigSection; 4] {
        [
            ConfigSection::Logging,
            ConfigSection::VideoVerified,
            ConfigSection::Interlaced,
            ConfigSection::Output,
        ]
    }
}
