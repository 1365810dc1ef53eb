//! Types for frame utilities.
//!
//! Contains the enums and structs shared by the frame_utils module and
//! the video-verified sync pipeline.

use serde::{Deserialize, Serialize};

/// Video properties detected from a file.
#[derive(Debug, Clone)]
pub struct VideoProperties {
    /// Frames per second (container `r_frame_rate`).
    pub fps: f64,
    /// FPS as fraction (numerator, denominator) e.g. (24000, 1001).
    pub fps_fraction: (u32, u32),
    /// Average frame rate reported by the container.
    pub avg_fps: f64,
    /// Whether average and nominal frame rates disagree.
    pub is_vfr: bool,
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// Estimated frame count.
    pub frame_count: u32,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Codec name as reported by ffprobe.
    pub codec_name: String,
    /// Whether the video is flagged interlaced.
    pub interlaced: bool,
    /// Field order for interlaced content.
    pub field_order: FieldOrder,
    /// Metadata-only content type classification.
    pub content_type: ContentType,
    /// Whether this is SD content (height <= 576).
    pub is_sd: bool,
    /// Whether this appears to be DVD content.
    pub is_dvd: bool,
    /// How properties were detected.
    pub detection_source: String,
}

impl Default for VideoProperties {
    fn default() -> Self {
        Self {
            fps: 23.976,
            fps_fraction: (24000, 1001),
            avg_fps: 23.976,
            is_vfr: false,
            duration_ms: 0.0,
            frame_count: 0,
            width: 1920,
            height: 1080,
            codec_name: String::new(),
            interlaced: false,
            field_order: FieldOrder::Progressive,
            content_type: ContentType::Progressive,
            is_sd: false,
            is_dvd: false,
            detection_source: "default".to_string(),
        }
    }
}

impl VideoProperties {
    /// Get frame duration in milliseconds.
    pub fn frame_duration_ms(&self) -> f64 {
        1000.0 / self.fps
    }
}

/// Field order for interlaced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrder {
    /// Progressive (non-interlaced).
    #[default]
    Progressive,
    /// Top Field First.
    TopFieldFirst,
    /// Bottom Field First.
    BottomFieldFirst,
    /// Unknown field order.
    Unknown,
}

impl FieldOrder {
    /// Parse from ffprobe field_order string.
    pub fn from_ffprobe(s: &str) -> Self {
        match s {
            "tt" | "tb" => Self::TopFieldFirst,
            "bb" | "bt" => Self::BottomFieldFirst,
            "progressive" => Self::Progressive,
            _ => Self::Unknown,
        }
    }

    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progressive => "progressive",
            Self::TopFieldFirst => "tff",
            Self::BottomFieldFirst => "bff",
            Self::Unknown => "unknown",
        }
    }

    /// Value for the `parity` option of FFmpeg deinterlacers.
    pub fn ffmpeg_parity(&self) -> &'static str {
        match self {
            Self::TopFieldFirst => "tff",
            Self::BottomFieldFirst => "bff",
            Self::Progressive | Self::Unknown => "auto",
        }
    }
}

/// Content type classification.
///
/// `Telecine` comes from container metadata only (the kind of pulldown is
/// unknown); cadence analysis refines it into `TelecineHard` or `TelecineSoft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Progressive content.
    #[default]
    Progressive,
    /// Interlaced content.
    Interlaced,
    /// Telecine of unknown kind (metadata guess).
    Telecine,
    /// Hard telecine: pulldown fields baked into the stream.
    TelecineHard,
    /// Soft telecine: progressive frames with repeat-field flags or duplicates.
    TelecineSoft,
    /// Mixture of progressive and interlaced sections.
    Mixed,
    /// Unknown content type.
    Unknown,
}

impl ContentType {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progressive => "progressive",
            Self::Interlaced => "interlaced",
            Self::Telecine => "telecine",
            Self::TelecineHard => "telecine_hard",
            Self::TelecineSoft => "telecine_soft",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }

    /// Whether this content needs the interlaced settings profile.
    pub fn is_interlaced_family(&self) -> bool {
        matches!(
            self,
            Self::Interlaced | Self::Telecine | Self::TelecineHard | Self::TelecineSoft | Self::Mixed
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a content classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Whole-file idet/mpdecimate cadence analysis.
    Idet,
    /// Container metadata (non-DVD content is not analyzed).
    Metadata,
    /// Container metadata after cadence analysis failed.
    MetadataFallback,
}

/// Result of classifying one video's content type.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentAnalysis {
    /// Classified content type.
    pub content_type: ContentType,
    /// Detected field order.
    pub field_order: FieldOrder,
    /// Confidence in the classification (0.0 - 1.0).
    pub confidence: f64,
    /// Fraction of frames detected as interlaced.
    pub interlaced_ratio: f64,
    /// Fraction of frames detected as progressive.
    pub progressive_ratio: f64,
    /// Fraction of frames with repeated fields.
    pub repeated_ratio: f64,
    /// Fraction of frames dropped as duplicates.
    pub duplicate_ratio: f64,
    /// How the classification was obtained.
    pub source: AnalysisSource,
}

impl ContentAnalysis {
    /// Build an analysis from container metadata alone.
    pub fn from_metadata(props: &VideoProperties, source: AnalysisSource, confidence: f64) -> Self {
        Self {
            content_type: props.content_type,
            field_order: props.field_order,
            confidence,
            interlaced_ratio: 0.0,
            progressive_ratio: 0.0,
            repeated_ratio: 0.0,
            duplicate_ratio: 0.0,
            source,
        }
    }
}

/// Hash algorithm for frame comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Perceptual hash (DCT-based) - best for different encodes.
    #[default]
    PHash,
    /// Difference hash - fast, good for same encode.
    DHash,
    /// Average hash - simplest, fastest.
    AHash,
    /// Block hash - good for partial image matching.
    BlockHash,
}

impl HashAlgorithm {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PHash => "phash",
            Self::DHash => "dhash",
            Self::AHash => "ahash",
            Self::BlockHash => "blockhash",
        }
    }
}

/// Comparison method for frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonMethod {
    /// Perceptual hash + hamming distance.
    #[default]
    Hash,
    /// Structural Similarity Index.
    Ssim,
    /// Mean Squared Error.
    Mse,
}

impl ComparisonMethod {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Ssim => "ssim",
            Self::Mse => "mse",
        }
    }
}

/// Deinterlace method for interlaced content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeinterlaceMethod {
    /// No deinterlacing (raw frames).
    None,
    /// YADIF - good quality, moderate speed.
    Yadif,
    /// Bob - fast, one frame per field.
    Bob,
    /// W3FDIF - Weston three-field deinterlacer.
    W3fdif,
    /// BWDIF - motion adaptive, best quality.
    #[default]
    Bwdif,
}

impl DeinterlaceMethod {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yadif => "yadif",
            Self::Bob => "bob",
            Self::W3fdif => "w3fdif",
            Self::Bwdif => "bwdif",
        }
    }
}

/// Force mode for interlaced handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterlacedForceMode {
    /// Auto-detect interlacing.
    #[default]
    Auto,
    /// Force progressive handling.
    Progressive,
    /// Force interlaced handling.
    Interlaced,
    /// Force telecine handling.
    Telecine,
}

impl InterlacedForceMode {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Progressive => "progressive",
            Self::Interlaced => "interlaced",
            Self::Telecine => "telecine",
        }
    }
}

/// Frame preprocessing applied to one video before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStrategy {
    /// Frames are used as decoded.
    #[default]
    Passthrough,
    /// Explicit deinterlace, frame count unchanged.
    Deinterlace(DeinterlaceMethod),
    /// Field matching followed by decimation to the film rate.
    InverseTelecine,
    /// Decimation only (pulldown already removed by the decoder).
    DecimateOnly,
}

impl ProcessingStrategy {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Deinterlace(_) => "deinterlace",
            Self::InverseTelecine => "ivtc",
            Self::DecimateOnly => "decimate",
        }
    }
}

/// Processing decision for one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessingPlan {
    /// Preprocessing strategy.
    pub strategy: ProcessingStrategy,
    /// Field order used by deinterlacers and field matching.
    pub field_order: FieldOrder,
}

impl ProcessingPlan {
    /// Pass-through plan.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Whether frames are actually dropped (indexing FPS changes).
    pub fn changes_frame_count(&self) -> bool {
        matches!(
            self.strategy,
            ProcessingStrategy::InverseTelecine | ProcessingStrategy::DecimateOnly
        )
    }

    /// Whether field matching runs (frame choice can drift by one between encodes).
    pub fn uses_field_matching(&self) -> bool {
        matches!(self.strategy, ProcessingStrategy::InverseTelecine)
    }
}

/// Result of comparing two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCompareResult {
    /// Distance/similarity metric (lower = more similar, 0 = identical).
    pub distance: f64,
    /// Whether frames are considered matching (distance <= threshold).
    pub is_match: bool,
    /// Method used for comparison.
    pub method: ComparisonMethod,
}

/// Result of verifying a frame sequence.
#[derive(Debug, Clone)]
pub struct SequenceVerifyResult {
    /// Number of frames that matched.
    pub matched_count: usize,
    /// Total frames tested.
    pub total_count: usize,
    /// Average distance across sequence.
    pub avg_distance: f64,
    /// Best distance found at each step that had frames available.
    pub distances: Vec<f64>,
    /// Whether sequence is verified (matched_count >= 70% of total).
    pub verified: bool,
}

impl SequenceVerifyResult {
    /// Check if sequence passes verification threshold.
    pub fn passes_threshold(&self, threshold_pct: f64) -> bool {
        if self.total_count == 0 {
            return false;
        }
        let ratio = self.matched_count as f64 / self.total_count as f64;
        ratio >= threshold_pct
    }
}

/// Details for a single checkpoint match test.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchObservation {
    /// Checkpoint time in the source video (ms).
    pub checkpoint_ms: f64,
    /// Source frame index tested.
    pub source_frame: i64,
    /// Target frame index tested (located via time, not index).
    pub target_frame: i64,
    /// Distance between the initial frame pair.
    pub distance: f64,
    /// Whether the initial frame pair matched.
    pub is_match: bool,
    /// Frames matched in sequence verification.
    pub sequence_matched: usize,
    /// Total frames in sequence.
    pub sequence_length: usize,
    /// Whether the sequence was verified.
    pub sequence_verified: bool,
    /// Average distance in sequence.
    pub sequence_avg_distance: f64,
}

/// Score of one candidate frame offset across all checkpoints.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    /// Frame offset being tested.
    pub frame_offset: i32,
    /// Approximate offset in milliseconds.
    pub approx_ms: f64,
    /// Aggregate quality score.
    pub score: f64,
    /// Number of checkpoints that produced a match.
    pub matched_checkpoints: usize,
    /// Number of checkpoints with verified sequences.
    pub sequence_verified: usize,
    /// Average initial-pair distance across checkpoints (infinite if none).
    pub avg_distance: f64,
    /// Per-checkpoint observations.
    pub observations: Vec<MatchObservation>,
}

/// Result of comparing video properties between source and target.
#[derive(Debug, Clone)]
pub struct VideoCompareResult {
    /// Whether FPS matches between videos.
    pub fps_match: bool,
    /// Ratio of source FPS to target FPS.
    pub fps_ratio: f64,
    /// Whether there's an interlacing mismatch.
    pub interlace_mismatch: bool,
    /// Whether PAL speedup (or its reverse) was detected.
    pub pal_speedup: bool,
    /// Warning messages.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_parsing() {
        assert_eq!(FieldOrder::from_ffprobe("tt"), FieldOrder::TopFieldFirst);
        assert_eq!(FieldOrder::from_ffprobe("tb"), FieldOrder::TopFieldFirst);
        assert_eq!(FieldOrder::from_ffprobe("bb"), FieldOrder::BottomFieldFirst);
        assert_eq!(FieldOrder::from_ffprobe("progressive"), FieldOrder::Progressive);
        assert_eq!(FieldOrder::from_ffprobe("unknown"), FieldOrder::Unknown);
    }

    #[test]
    fn test_interlaced_family() {
        assert!(ContentType::TelecineHard.is_interlaced_family());
        assert!(ContentType::TelecineSoft.is_interlaced_family());
        assert!(ContentType::Mixed.is_interlaced_family());
        assert!(!ContentType::Progressive.is_interlaced_family());
        assert!(!ContentType::Unknown.is_interlaced_family());
    }

    #[test]
    fn test_processing_plan_frame_count() {
        let ivtc = ProcessingPlan {
            strategy: ProcessingStrategy::InverseTelecine,
            field_order: FieldOrder::TopFieldFirst,
        };
        assert!(ivtc.changes_frame_count());
        assert!(ivtc.uses_field_matching());

        let deint = ProcessingPlan {
            strategy: ProcessingStrategy::Deinterlace(DeinterlaceMethod::Bwdif),
            field_order: FieldOrder::TopFieldFirst,
        };
        assert!(!deint.changes_frame_count());
        assert!(!deint.uses_field_matching());
        assert!(!ProcessingPlan::passthrough().changes_frame_count());
    }

    #[test]
    fn test_video_properties_default() {
        let props = VideoProperties::default();
        assert!((props.fps - 23.976).abs() < 0.001);
        assert_eq!(props.fps_fraction, (24000, 1001));
        assert!(!props.interlaced);
    }

    #[test]
    fn test_sequence_verify_threshold() {
        let result = SequenceVerifyResult {
            matched_count: 7,
            total_count: 10,
            avg_distance: 5.0,
            distances: vec![5.0; 10],
            verified: true,
        };
        assert!(result.passes_threshold(0.7));
        assert!(!result.passes_threshold(0.8));
    }

    #[test]
    fn test_enum_serde_names() {
        let json = serde_json::to_string(&ContentType::TelecineHard).unwrap();
        assert_eq!(json, "\"telecine_hard\"");
        let method: DeinterlaceMethod = serde_json::from_str("\"bwdif\"").unwrap();
        assert_eq!(method, DeinterlaceMethod::Bwdif);
    }
}
