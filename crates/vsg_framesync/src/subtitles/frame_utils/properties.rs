//! Video property detection functions.
//!
//! Uses ffprobe to detect video properties like FPS, resolution, interlacing,
//! duration, and frame count. Parsing of the ffprobe JSON is kept separate
//! from running the process so it can be tested without FFmpeg installed.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use super::timing::parse_fps_fraction;
use super::types::{ContentType, FieldOrder, VideoCompareResult, VideoProperties};
use crate::subtitles::error::FrameError;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    field_order: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse a numeric ffprobe field, treating "N/A" as missing.
fn probe_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.filter(|v| *v != "N/A").and_then(|v| v.trim().parse().ok())
}

/// Detect video properties from a file using ffprobe.
///
/// # Logging
/// Logs detection progress with `[VideoProps]` prefix
pub fn detect_properties(path: &Path) -> Result<VideoProperties, FrameError> {
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    tracing::info!("[VideoProps] Detecting properties for: {}", filename);

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate,avg_frame_rate,field_order,nb_frames,duration,codec_name,width,height",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| FrameError::PropertiesFailed(format!("ffprobe execution failed: {}", e)))?;

    if !output.status.success() {
        return Err(FrameError::PropertiesFailed(format!(
            "ffprobe exited with {} for {}",
            output.status, filename
        )));
    }

    let props = parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))?;
    log_properties(&props);
    Ok(props)
}

/// Build `VideoProperties` from ffprobe's JSON output.
pub fn parse_ffprobe_output(json: &str) -> Result<VideoProperties, FrameError> {
    let data: ProbeOutput = serde_json::from_str(json).map_err(|e| {
        FrameError::PropertiesFailed(format!("Failed to parse ffprobe JSON: {}", e))
    })?;

    let stream = data
        .streams
        .first()
        .ok_or_else(|| FrameError::PropertiesFailed("No video streams found".to_string()))?;

    let mut props = VideoProperties {
        detection_source: "ffprobe".to_string(),
        ..Default::default()
    };

    // r_frame_rate is the nominal rate; avg_frame_rate drifts for VFR sources
    if let Some(r_frame_rate) = stream.r_frame_rate.as_deref() {
        if let Some(fps) = parse_fps_fraction(r_frame_rate).filter(|f| *f > 0.0) {
            props.fps = fps;
            props.avg_fps = fps;
            if let Some((num, denom)) = r_frame_rate.split_once('/') {
                if let (Ok(num), Ok(denom)) = (num.parse::<u32>(), denom.parse::<u32>()) {
                    props.fps_fraction = (num, denom);
                }
            }
        }
    }
    if let Some(avg) = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_fps_fraction)
        .filter(|f| *f > 0.0)
    {
        props.avg_fps = avg;
        props.is_vfr = (avg - props.fps).abs() / props.fps > 0.001;
    }

    if let Some(width) = stream.width {
        props.width = width;
    }
    if let Some(height) = stream.height {
        props.height = height;
    }
    props.codec_name = stream.codec_name.clone().unwrap_or_default();

    if let Some(field_order) = stream.field_order.as_deref() {
        props.field_order = FieldOrder::from_ffprobe(field_order);
        props.interlaced = matches!(
            props.field_order,
            FieldOrder::TopFieldFirst | FieldOrder::BottomFieldFirst
        );
    }

    // MKV often only carries the format duration
    let duration_secs = probe_number::<f64>(stream.duration.as_deref()).or_else(|| {
        data.format
            .as_ref()
            .and_then(|f| probe_number::<f64>(f.duration.as_deref()))
    });
    if let Some(secs) = duration_secs {
        props.duration_ms = secs * 1000.0;
    }

    props.frame_count = probe_number::<u32>(stream.nb_frames.as_deref()).unwrap_or(0);
    if props.frame_count == 0 && props.duration_ms > 0.0 {
        props.frame_count = (props.duration_ms * props.fps / 1000.0) as u32;
    }

    props.is_sd = props.height <= 576;

    // NTSC DVD: 720x480 or 704x480, PAL DVD: 720x576 or 704x576
    let dvd_width = props.width == 720 || props.width == 704;
    let is_ntsc_res = dvd_width && (props.height == 480 || props.height == 486);
    let is_pal_res = dvd_width && (props.height == 576 || props.height == 578);
    let is_mpeg = matches!(props.codec_name.as_str(), "mpeg2video" | "mpeg1video");
    props.is_dvd = is_mpeg && (is_ntsc_res || is_pal_res);

    props.content_type = if props.interlaced {
        if (props.fps - 29.97).abs() < 0.1 && is_ntsc_res {
            ContentType::Telecine
        } else {
            ContentType::Interlaced
        }
    } else if (props.fps - 29.97).abs() < 0.1 && props.is_sd {
        // 29.97p SD - could be soft telecine or native
        ContentType::Unknown
    } else {
        ContentType::Progressive
    };

    Ok(props)
}

fn log_properties(props: &VideoProperties) {
    tracing::info!(
        "[VideoProps] FPS: {:.3} ({}/{}){}",
        props.fps,
        props.fps_fraction.0,
        props.fps_fraction.1,
        if props.is_vfr { " [VFR]" } else { "" }
    );
    tracing::info!(
        "[VideoProps] Resolution: {}x{} ({})",
        props.width,
        props.height,
        props.codec_name
    );
    tracing::info!(
        "[VideoProps] Scan type: {}, Field order: {}",
        if props.interlaced {
            "interlaced"
        } else {
            "progressive"
        },
        props.field_order.name()
    );
    tracing::info!(
        "[VideoProps] Duration: {:.0}ms, Frames: {}",
        props.duration_ms,
        props.frame_count
    );
    if props.is_dvd {
        tracing::info!(
            "[VideoProps] Content type: {} (DVD detected)",
            props.content_type.name()
        );
    } else {
        tracing::info!("[VideoProps] Content type: {}", props.content_type.name());
    }
}

/// Compare video properties between source and target.
///
/// Purely diagnostic: logs FPS and interlacing mismatches so an operator
/// can tell why frame matching might struggle.
pub fn compare_video_properties(
    source_props: &VideoProperties,
    target_props: &VideoProperties,
) -> VideoCompareResult {
    let fps_diff_pct = (source_props.fps - target_props.fps).abs() / target_props.fps * 100.0;
    let fps_ratio = source_props.fps / target_props.fps;

    let mut result = VideoCompareResult {
        fps_match: fps_diff_pct < 0.1,
        fps_ratio,
        interlace_mismatch: source_props.interlaced != target_props.interlaced,
        pal_speedup: false,
        warnings: Vec::new(),
    };

    if result.fps_match {
        tracing::info!(
            "[VideoProps] FPS: MATCH ({:.3} ~ {:.3})",
            source_props.fps,
            target_props.fps
        );
    } else {
        // 23.976 -> 25 is ~4.2% faster, 25 -> 23.976 the reverse
        let inverse = 1.0 / fps_ratio;
        if (fps_ratio > 1.04 && fps_ratio < 1.05) || (inverse > 1.04 && inverse < 1.05) {
            result.pal_speedup = true;
            result.warnings.push(format!(
                "PAL speedup detected (ratio={:.4}), frame offsets will not be constant",
                fps_ratio
            ));
        } else {
            result.warnings.push(format!(
                "Different framerates ({:.3} vs {:.3}, diff={:.2}%)",
                source_props.fps, target_props.fps, fps_diff_pct
            ));
        }
    }

    if result.interlace_mismatch {
        result.warnings.push(format!(
            "Interlacing mismatch (source={}, target={})",
            source_props.field_order.name(),
            target_props.field_order.name()
        ));
    }

    for warn in &result.warnings {
        tracing::warn!("[VideoProps] WARNING: {}", warn);
    }

    result
}

/// Check if ffprobe is available.
pub fn is_ffprobe_available() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
