//! FFmpeg subprocess-based video reader.
//!
//! Each frame request runs one `ffmpeg` process that seeks, applies the
//! processing filter chain and writes a single PNG to stdout. Slow per
//! frame, so recently decoded frames are kept in a small in-memory cache.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::Mutex;

use super::{OpenRequest, VideoHandle};
use crate::subtitles::error::FrameError;
use crate::subtitles::frame_utils::cache::FrameTimestamps;
use crate::subtitles::frame_utils::content::indexing_fps;
use crate::subtitles::frame_utils::timing::frame_duration_ms;
use crate::subtitles::frame_utils::types::{
    ContentType, DeinterlaceMethod, ProcessingPlan, ProcessingStrategy,
};

/// Decoded frames kept per reader before the cache is flushed.
const FRAME_CACHE_CAPACITY: usize = 256;

/// FFmpeg `-vf` chain for a processing plan, or None for passthrough.
pub fn filter_chain(plan: &ProcessingPlan) -> Option<String> {
    let parity = plan.field_order.ffmpeg_parity();
    match plan.strategy {
        ProcessingStrategy::Passthrough => None,
        ProcessingStrategy::Deinterlace(method) => match method {
            DeinterlaceMethod::None => None,
            DeinterlaceMethod::Yadif => Some(format!("yadif=mode=send_frame:parity={}", parity)),
            DeinterlaceMethod::Bob => Some(format!("yadif=mode=send_field:parity={}", parity)),
            DeinterlaceMethod::W3fdif => Some("w3fdif".to_string()),
            DeinterlaceMethod::Bwdif => Some(format!("bwdif=mode=send_frame:parity={}", parity)),
        },
        ProcessingStrategy::InverseTelecine => Some(format!(
            "fieldmatch=order={},yadif=deint=interlaced,decimate",
            parity
        )),
        ProcessingStrategy::DecimateOnly => Some("decimate".to_string()),
    }
}

/// Format ms as an FFmpeg `-ss` value (HH:MM:SS.mmm).
fn format_seek_time(time_ms: f64) -> String {
    let time_secs = time_ms.max(0.0) / 1000.0;
    let hours = (time_secs / 3600.0) as u32;
    let minutes = ((time_secs % 3600.0) / 60.0) as u32;
    let seconds = time_secs % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, seconds)
}

/// Load presentation timestamps of the first video stream.
pub fn load_frame_timestamps(path: &Path) -> Result<FrameTimestamps, FrameError> {
    tracing::info!(
        "[FFmpeg] Loading frame timestamps: {}",
        path.file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
    );

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "packet=pts_time",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FrameError::FfprobeNotFound,
            _ => FrameError::open(path, format!("ffprobe execution failed: {}", e)),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FrameError::open(
            path,
            format!("ffprobe failed: {}", stderr.lines().last().unwrap_or("unknown error")),
        ));
    }

    let table = FrameTimestamps::from_ffprobe_csv(&String::from_utf8_lossy(&output.stdout));
    if table.is_empty() {
        return Err(FrameError::InvalidData("no frame timestamps found".to_string()));
    }

    tracing::debug!("[FFmpeg] Loaded {} frame timestamps", table.len());
    Ok(table)
}

/// FFmpeg subprocess-based video handle.
pub struct FfmpegReader {
    path: PathBuf,
    indexing_fps: f64,
    /// Expected frames after processing (0 if unknown).
    frame_count: i64,
    content_type: ContentType,
    filter: Option<String>,
    /// Only kept when processing does not change the frame count.
    timestamps: Option<Arc<FrameTimestamps>>,
    frames: Mutex<HashMap<i64, DynamicImage>>,
    closed: bool,
}

impl FfmpegReader {
    /// Open a video with the requested processing.
    pub fn open(request: &OpenRequest<'_>) -> Result<Self, FrameError> {
        if !request.path.exists() {
            return Err(FrameError::open(request.path, "File does not exist"));
        }

        let plan = request.plan;
        let indexing_fps = indexing_fps(request.props.fps, &plan);
        if !(indexing_fps.is_finite() && indexing_fps > 0.0) {
            return Err(FrameError::open(
                request.path,
                format!("invalid frame rate {}", indexing_fps),
            ));
        }

        let frame_count = if plan.changes_frame_count() {
            i64::from(request.props.frame_count) * 4 / 5
        } else {
            i64::from(request.props.frame_count)
        };

        // Source timestamps no longer line up with frame indices after decimation
        let timestamps = if plan.changes_frame_count() {
            None
        } else {
            request.timestamps.clone()
        };

        let filter = filter_chain(&plan);
        tracing::debug!(
            "[FFmpeg] Opened video: {:.3} fps (indexing), {} frames, filter={}, pts={}",
            indexing_fps,
            frame_count,
            filter.as_deref().unwrap_or("none"),
            timestamps.is_some()
        );

        Ok(Self {
            path: request.path.to_path_buf(),
            indexing_fps,
            frame_count,
            content_type: request.content_type,
            filter,
            timestamps,
            frames: Mutex::new(HashMap::new()),
            closed: false,
        })
    }

    /// Extract a frame at a specific time using FFmpeg.
    fn extract_frame_at_time(&self, time_ms: f64) -> Result<DynamicImage, FrameError> {
        if self.closed {
            return Err(FrameError::extraction(time_ms, "reader is closed"));
        }
        if time_ms < 0.0 {
            return Err(FrameError::extraction(time_ms, "negative time"));
        }

        let time_str = format_seek_time(time_ms);
        tracing::trace!("[FFmpeg] Extracting frame at {}", time_str);

        let mut command = Command::new("ffmpeg");
        command
            .args(["-v", "error", "-nostdin", "-ss", &time_str, "-i"])
            .arg(&self.path);
        if let Some(filter) = &self.filter {
            command.args(["-vf", filter]);
        }
        command.args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"]);

        let output = command.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FrameError::FfmpegNotFound,
            _ => FrameError::extraction(time_ms, format!("FFmpeg execution failed: {}", e)),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FrameError::extraction(
                time_ms,
                format!(
                    "FFmpeg failed: {}",
                    stderr.lines().last().unwrap_or("unknown error")
                ),
            ));
        }

        if output.stdout.is_empty() {
            return Err(FrameError::extraction(time_ms, "FFmpeg produced no output"));
        }

        image::load(Cursor::new(output.stdout), image::ImageFormat::Png)
            .map_err(|e| FrameError::extraction(time_ms, format!("Failed to decode PNG: {}", e)))
    }

    /// Seek time for a frame index: the middle of the frame, so container
    /// rounding cannot land on the neighbour.
    fn seek_time_for_index(&self, index: i64) -> Option<f64> {
        let frame_ms = frame_duration_ms(self.indexing_fps);
        let start = match &self.timestamps {
            Some(table) => table.pts(index)?,
            None => {
                if self.frame_count > 0 && index >= self.frame_count {
                    return None;
                }
                index as f64 * frame_ms
            }
        };
        Some(start + frame_ms / 2.0)
    }
}

impl VideoHandle for FfmpegReader {
    fn fps(&self) -> f64 {
        self.indexing_fps
    }

    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn has_pts(&self) -> bool {
        self.timestamps.is_some()
    }

    fn frame_at_time(&self, time_ms: f64) -> Result<DynamicImage, FrameError> {
        self.extract_frame_at_time(time_ms)
    }

    fn frame_at_index(&self, index: i64) -> Result<DynamicImage, FrameError> {
        if let Some(frame) = self.frames.lock().get(&index) {
            return Ok(frame.clone());
        }

        let time_ms = self
            .seek_time_for_index(index)
            .filter(|_| index >= 0)
            .ok_or_else(|| {
                FrameError::InvalidData(format!("frame index {} out of range", index))
            })?;
        let frame = self.extract_frame_at_time(time_ms)?;

        let mut frames = self.frames.lock();
        if frames.len() >= FRAME_CACHE_CAPACITY {
            frames.clear();
        }
        frames.insert(index, frame.clone());
        Ok(frame)
    }

    fn frame_index_for_time(&self, time_ms: f64) -> Option<i64> {
        self.timestamps.as_ref()?.frame_for_time(time_ms)
    }

    fn frame_pts(&self, index: i64) -> Option<f64> {
        self.timestamps.as_ref()?.pts(index)
    }

    fn backend_name(&self) -> &str {
        "ffmpeg"
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames.lock().clear();
    }
}
