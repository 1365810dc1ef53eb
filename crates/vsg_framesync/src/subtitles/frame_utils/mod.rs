//! Frame utilities for video-verified sync mode.
//!
//! # Components
//!
//! - **timing**: frame/time conversion, checkpoints, candidate offsets
//! - **hash** / **compare**: perceptual hashing and the frame comparator
//! - **verify**: position-exact sequence verification
//! - **properties** / **content**: ffprobe metadata and content-type analysis
//! - **cache**: explicit per-video analysis cache
//! - **reader**: video backends and handles (FFmpeg)
//! - **surgical**: frame-preserving centisecond rounding
//! - **audit**: read-only frame drift audit and report

pub mod audit;
pub mod cache;
pub mod compare;
pub mod content;
pub mod hash;
pub mod properties;
pub mod reader;
pub mod surgical;
pub mod timing;
pub mod types;
pub mod verify;

pub use audit::{run_frame_audit, write_audit_report, FrameAuditIssue, FrameAuditResult};
pub use cache::{FrameTimestamps, VideoAnalysisCache};
pub use compare::FrameComparator;
pub use content::{analyze_content_type, plan_processing, use_interlaced_settings};
pub use properties::{compare_video_properties, detect_properties};
pub use reader::{FfmpegBackend, HandleGuard, OpenRequest, VideoBackend, VideoHandle};
pub use surgical::{
    surgical_round, surgical_round_batch, surgical_round_event, RoundMethod, SurgicalBatchStats,
    SurgicalEventResult, SurgicalRoundResult,
};
pub use timing::{generate_frame_candidates, select_checkpoint_times};
pub use types::{
    CandidateScore, ComparisonMethod, ContentAnalysis, ContentType, DeinterlaceMethod, FieldOrder,
    HashAlgorithm, InterlacedForceMode, MatchObservation, ProcessingPlan, ProcessingStrategy,
    SequenceVerifyResult, VideoProperties,
};
pub use verify::verify_sequence;
