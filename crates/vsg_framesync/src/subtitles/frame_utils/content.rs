//! Content-type analysis and processing selection.
//!
//! DVD sources get a whole-file FFmpeg `idet,mpdecimate` pass to tell
//! hard telecine, soft telecine, interlaced, mixed and progressive apart.
//! Everything else is classified from container metadata.
//!
//! The classification picks a [`ProcessingPlan`] per video, which in turn
//! decides the FPS used for time to frame-index math:
//!
//! | content type           | processing             | indexing FPS      |
//! |------------------------|------------------------|-------------------|
//! | telecine (hard)        | field match + decimate | decimated rate    |
//! | telecine (soft)        | decimate only          | decimated rate    |
//! | interlaced / mixed     | explicit deinterlace   | container rate    |
//! | progressive / unknown  | passthrough            | container rate    |

use std::path::Path;
use std::process::Command;

use super::types::{
    AnalysisSource, ContentAnalysis, ContentType, DeinterlaceMethod, FieldOrder,
    InterlacedForceMode, ProcessingPlan, ProcessingStrategy, VideoProperties,
};
use crate::subtitles::error::FrameError;

/// Decimation keeps 4 of every 5 frames (29.97 -> 23.976).
const DECIMATE_KEEP_RATIO: f64 = 4.0 / 5.0;

/// Counters parsed from FFmpeg's idet and progress output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdetStats {
    pub repeated_neither: u64,
    pub repeated_top: u64,
    pub repeated_bottom: u64,
    pub single_tff: u64,
    pub single_bff: u64,
    pub single_progressive: u64,
    pub single_undetermined: u64,
    pub multi_tff: u64,
    pub multi_bff: u64,
    pub multi_progressive: u64,
    pub multi_undetermined: u64,
    /// Frames fed into the filters.
    pub input_frames: u64,
    /// Frames left after mpdecimate.
    pub output_frames: u64,
}

/// Find `header` in the last line carrying it and read the number after each label.
fn labeled_counts(stderr: &str, header: &str, labels: &[&str]) -> Option<Vec<u64>> {
    let line = stderr.lines().rev().find(|l| l.contains(header))?;
    let mut rest = &line[line.find(header)? + header.len()..];

    labels
        .iter()
        .map(|label| {
            let pos = rest.find(label)?;
            rest = rest[pos + label.len()..].trim_start();
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            rest[..end].parse().ok()
        })
        .collect()
}

/// Parse idet/mpdecimate stderr.
///
/// Returns None when the single-frame detection summary is missing,
/// which means idet never ran to completion.
pub fn parse_idet_output(stderr: &str, expected_frames: u64) -> Option<IdetStats> {
    let four = ["TFF:", "BFF:", "Progressive:", "Undetermined:"];
    let single = labeled_counts(stderr, "Single frame detection:", &four)?;
    let multi = labeled_counts(stderr, "Multi frame detection:", &four).unwrap_or(vec![0; 4]);
    let repeated = labeled_counts(stderr, "Repeated Fields:", &["Neither:", "Top:", "Bottom:"])
        .unwrap_or(vec![0; 3]);

    // Progress lines are \r separated; the last one holds the final count
    let output_frames = stderr
        .rfind("frame=")
        .and_then(|pos| {
            let rest = stderr[pos + "frame=".len()..].trim_start();
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            rest[..end].parse().ok()
        })
        .unwrap_or(expected_frames);

    let mut input_frames: u64 = single.iter().sum();
    if input_frames == 0 {
        input_frames = expected_frames;
    }

    Some(IdetStats {
        repeated_neither: repeated[0],
        repeated_top: repeated[1],
        repeated_bottom: repeated[2],
        single_tff: single[0],
        single_bff: single[1],
        single_progressive: single[2],
        single_undetermined: single[3],
        multi_tff: multi[0],
        multi_bff: multi[1],
        multi_progressive: multi[2],
        multi_undetermined: multi[3],
        input_frames,
        output_frames,
    })
}

/// Classify content from idet statistics.
pub fn classify_content(stats: &IdetStats, fallback_field_order: FieldOrder) -> ContentAnalysis {
    let total = stats.input_frames;
    if total == 0 {
        return ContentAnalysis {
            content_type: ContentType::Unknown,
            field_order: fallback_field_order,
            confidence: 0.0,
            interlaced_ratio: 0.0,
            progressive_ratio: 0.0,
            repeated_ratio: 0.0,
            duplicate_ratio: 0.0,
            source: AnalysisSource::Idet,
        };
    }

    let total_f = total as f64;
    let interlaced_ratio = (stats.single_tff + stats.single_bff) as f64 / total_f;
    let progressive_ratio = stats.single_progressive as f64 / total_f;
    let repeated_ratio = (stats.repeated_top + stats.repeated_bottom) as f64 / total_f;
    let duplicate_ratio = if stats.output_frames > 0 {
        (1.0 - stats.output_frames as f64 / total_f).max(0.0)
    } else {
        0.0
    };

    let field_order = if stats.single_tff > stats.single_bff {
        FieldOrder::TopFieldFirst
    } else if stats.single_bff > stats.single_tff {
        FieldOrder::BottomFieldFirst
    } else {
        FieldOrder::Progressive
    };

    let (content_type, confidence) = if interlaced_ratio > 0.5 && repeated_ratio > 0.05 {
        (ContentType::TelecineHard, interlaced_ratio.min(0.95))
    } else if progressive_ratio > 0.7 && repeated_ratio > 0.05 {
        (ContentType::TelecineSoft, progressive_ratio.min(0.95))
    } else if interlaced_ratio > 0.5 {
        (ContentType::Interlaced, interlaced_ratio.min(0.95))
    } else if progressive_ratio > 0.7 && duplicate_ratio > 0.15 {
        // Pulldown flags stripped but duplicate frames remain
        (ContentType::TelecineSoft, 0.85)
    } else if progressive_ratio > 0.7 {
        (ContentType::Progressive, progressive_ratio.min(0.95))
    } else {
        (ContentType::Mixed, 0.7)
    };

    ContentAnalysis {
        content_type,
        field_order,
        confidence,
        interlaced_ratio,
        progressive_ratio,
        repeated_ratio,
        duplicate_ratio,
        source: AnalysisSource::Idet,
    }
}

/// Run the idet + mpdecimate pass over the whole file.
pub fn run_idet_analysis(path: &Path, expected_frames: u64) -> Result<IdetStats, FrameError> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-nostdin", "-i"])
        .arg(path)
        .args(["-vf", "idet,mpdecimate", "-an", "-f", "null", "-"])
        .output()
        .map_err(|e| FrameError::AnalysisFailed(format!("ffmpeg execution failed: {}", e)))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    parse_idet_output(&stderr, expected_frames)
        .ok_or_else(|| FrameError::AnalysisFailed("could not parse idet output".to_string()))
}

/// Classify one video's content type.
///
/// Only DVD sources (MPEG-1/2 at DVD resolutions) are analyzed; this is a
/// full decode of the file and may take minutes.
pub fn analyze_content_type(path: &Path, props: &VideoProperties) -> ContentAnalysis {
    if !props.is_dvd {
        return ContentAnalysis::from_metadata(props, AnalysisSource::Metadata, 0.5);
    }

    tracing::info!(
        "[ContentAnalysis] MPEG-2 DVD detected, running full idet analysis on: {}",
        path.file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
    );

    let stats = match run_idet_analysis(path, u64::from(props.frame_count)) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!("[ContentAnalysis] {}, using metadata fallback", e);
            return ContentAnalysis::from_metadata(props, AnalysisSource::MetadataFallback, 0.3);
        }
    };

    tracing::debug!(
        "[ContentAnalysis] idet: TFF={} BFF={} progressive={} undetermined={}, repeated top={} bottom={}, frames {}/{}",
        stats.single_tff,
        stats.single_bff,
        stats.single_progressive,
        stats.single_undetermined,
        stats.repeated_top,
        stats.repeated_bottom,
        stats.output_frames,
        stats.input_frames
    );

    let analysis = classify_content(&stats, props.field_order);
    tracing::info!(
        "[ContentAnalysis] Result: {} (field_order={}, confidence={:.0}%, duplicates={:.1}%)",
        analysis.content_type,
        analysis.field_order.name(),
        analysis.confidence * 100.0,
        analysis.duplicate_ratio * 100.0
    );
    analysis
}

/// Decide whether the interlaced settings profile applies to this pair.
pub fn use_interlaced_settings(
    force_mode: InterlacedForceMode,
    handling_enabled: bool,
    source: ContentType,
    target: ContentType,
) -> bool {
    match force_mode {
        InterlacedForceMode::Progressive => false,
        InterlacedForceMode::Interlaced | InterlacedForceMode::Telecine => true,
        InterlacedForceMode::Auto => {
            handling_enabled && (source.is_interlaced_family() || target.is_interlaced_family())
        }
    }
}

/// Pick the preprocessing for one video.
///
/// Container "progressive" flags are not trusted: once the interlaced
/// profile is active, an interlaced-family classification always gets an
/// explicit deinterlace or IVTC.
pub fn plan_processing(
    analysis: &ContentAnalysis,
    use_interlaced: bool,
    deinterlace_method: DeinterlaceMethod,
    use_ivtc: bool,
) -> ProcessingPlan {
    let field_order = analysis.field_order;
    if !use_interlaced {
        return ProcessingPlan {
            strategy: ProcessingStrategy::Passthrough,
            field_order,
        };
    }

    let deinterlace = if deinterlace_method == DeinterlaceMethod::None {
        ProcessingStrategy::Passthrough
    } else {
        ProcessingStrategy::Deinterlace(deinterlace_method)
    };

    let strategy = match analysis.content_type {
        // Deinterlacing cannot undo pulldown.
        ContentType::Telecine | ContentType::TelecineHard => ProcessingStrategy::InverseTelecine,
        ContentType::TelecineSoft if use_ivtc => ProcessingStrategy::DecimateOnly,
        ContentType::TelecineSoft => ProcessingStrategy::Passthrough,
        ContentType::Interlaced | ContentType::Mixed => deinterlace,
        ContentType::Progressive | ContentType::Unknown => ProcessingStrategy::Passthrough,
    };

    ProcessingPlan {
        strategy,
        field_order,
    }
}

/// FPS to use for time to frame-index conversion after processing.
///
/// Only processing that actually drops frames changes it.
pub fn indexing_fps(native_fps: f64, plan: &ProcessingPlan) -> f64 {
    if plan.changes_frame_count() {
        native_fps * DECIMATE_KEEP_RATIO
    } else {
        native_fps
    }
}
