//! Deterministic in-memory videos for tests.
//!
//! Raw frame `i` shows content id `i - shift`. Each content id renders as a
//! 64x64 grid of black/white 8x8 blocks drawn from a seeded hash, so two
//! videos with the same seed share footage and different seeds do not.
//!
//! Opening with a plan that decimates keeps four raw frames out of every
//! five, dropping the one at `cadence_phase`. Two videos with different
//! phases drift against each other by a frame, the way separate IVTC runs
//! over different encodes do.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma};
use parking_lot::Mutex;

use super::{OpenRequest, VideoBackend, VideoHandle};
use crate::subtitles::error::FrameError;
use crate::subtitles::frame_utils::cache::FrameTimestamps;
use crate::subtitles::frame_utils::content::indexing_fps;
use crate::subtitles::frame_utils::timing::{frame_at, frame_duration_ms};
use crate::subtitles::frame_utils::types::{
    AnalysisSource, ContentAnalysis, ContentType, ProcessingPlan, VideoProperties,
};

/// Raw frames per decimation cycle.
const CYCLE: i64 = 5;

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Synthetic video handle.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    pub fps: f64,
    /// Target frame `i + shift` shows source frame `i` when seeds match.
    pub shift: i64,
    pub seed: u64,
    /// Frames past this index are unavailable.
    pub frame_count: i64,
    /// Every frame shows the same picture.
    pub is_static: bool,
    pub content_type: ContentType,
    /// Real timestamps (constant rate) are exposed.
    pub has_pts: bool,
    /// Probe reports variable frame rate.
    pub is_vfr: bool,
    /// Raw frame within each cycle of five dropped by decimation.
    pub cadence_phase: i64,
    plan: ProcessingPlan,
    timestamps: Option<Arc<FrameTimestamps>>,
    closed: Arc<AtomicBool>,
}

impl SyntheticVideo {
    pub fn new(fps: f64, shift: i64, seed: u64) -> Self {
        Self {
            fps,
            shift,
            seed,
            frame_count: 1_000_000,
            is_static: false,
            content_type: ContentType::Progressive,
            has_pts: false,
            is_vfr: false,
            cadence_phase: CYCLE - 1,
            plan: ProcessingPlan::passthrough(),
            timestamps: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_frame_count(mut self, frame_count: i64) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_pts(mut self) -> Self {
        self.has_pts = true;
        self
    }

    pub fn with_static_content(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_vfr(mut self) -> Self {
        self.is_vfr = true;
        self
    }

    pub fn with_cadence_phase(mut self, phase: i64) -> Self {
        self.cadence_phase = phase.rem_euclid(CYCLE);
        self
    }

    /// Raw frame shown at a processed index.
    fn raw_index(&self, index: i64) -> i64 {
        if !self.plan.changes_frame_count() {
            return index;
        }
        let kept = CYCLE - 1;
        let slot = index.rem_euclid(kept);
        let raw_slot = if slot >= self.cadence_phase { slot + 1 } else { slot };
        index.div_euclid(kept) * CYCLE + raw_slot
    }

    /// Flag set once `close` is called.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn render(&self, content_id: i64) -> DynamicImage {
        let id = if self.is_static { 0 } else { content_id };
        let key = splitmix64(self.seed ^ splitmix64(id as u64));
        let image = GrayImage::from_fn(64, 64, |x, y| {
            let block = (y / 8) * 8 + (x / 8);
            let bit = splitmix64(key.wrapping_add(u64::from(block))) & 1;
            Luma([if bit == 1 { 255 } else { 0 }])
        });
        DynamicImage::ImageLuma8(image)
    }
}

impl VideoHandle for SyntheticVideo {
    fn fps(&self) -> f64 {
        indexing_fps(self.fps, &self.plan)
    }

    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn has_pts(&self) -> bool {
        self.has_pts || self.timestamps.is_some()
    }

    fn frame_at_time(&self, time_ms: f64) -> Result<DynamicImage, FrameError> {
        let index = self
            .frame_index_for_time(time_ms)
            .unwrap_or_else(|| frame_at(time_ms, frame_duration_ms(self.fps())));
        self.frame_at_index(index)
    }

    fn frame_at_index(&self, index: i64) -> Result<DynamicImage, FrameError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FrameError::InvalidData("closed".to_string()));
        }
        let raw = self.raw_index(index);
        if index < 0 || raw >= self.frame_count {
            return Err(FrameError::InvalidData(format!("frame {} out of range", index)));
        }
        Ok(self.render(raw - self.shift))
    }

    fn frame_index_for_time(&self, time_ms: f64) -> Option<i64> {
        if let Some(timestamps) = &self.timestamps {
            return timestamps.frame_for_time(time_ms);
        }
        self.has_pts
            .then(|| frame_at(time_ms, frame_duration_ms(self.fps())))
    }

    fn frame_pts(&self, index: i64) -> Option<f64> {
        if let Some(timestamps) = &self.timestamps {
            return timestamps.pts(index);
        }
        (self.has_pts && index >= 0).then(|| index as f64 * frame_duration_ms(self.fps()))
    }

    fn backend_name(&self) -> &str {
        "synthetic"
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Backend serving [`SyntheticVideo`]s by path.
#[derive(Debug, Default)]
pub struct SyntheticBackend {
    pub available: bool,
    pub videos: HashMap<PathBuf, SyntheticVideo>,
    /// Paths that probe fine but fail to open.
    pub unopenable: Vec<PathBuf>,
    /// Duration reported by probe.
    pub duration_ms: f64,
    /// Timestamp tables loaded so far.
    pub timestamp_loads: AtomicUsize,
    /// Path and plan of every successful open, in order.
    pub opened: Mutex<Vec<(PathBuf, ProcessingPlan)>>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self {
            available: true,
            duration_ms: 600_000.0,
            ..Default::default()
        }
    }

    pub fn with_video(mut self, path: &str, video: SyntheticVideo) -> Self {
        self.videos.insert(PathBuf::from(path), video);
        self
    }

    fn video(&self, path: &Path) -> Result<&SyntheticVideo, FrameError> {
        self.videos
            .get(path)
            .ok_or_else(|| FrameError::open(path, "unknown synthetic video"))
    }
}

impl VideoBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn has_video(&self, path: &Path) -> bool {
        self.videos.contains_key(path)
    }

    fn probe(&self, path: &Path) -> Result<VideoProperties, FrameError> {
        let video = self.video(path)?;
        Ok(VideoProperties {
            fps: video.fps,
            avg_fps: video.fps,
            duration_ms: self.duration_ms,
            is_vfr: video.is_vfr,
            content_type: video.content_type,
            detection_source: "synthetic".to_string(),
            ..Default::default()
        })
    }

    fn analyze(&self, _path: &Path, props: &VideoProperties) -> ContentAnalysis {
        ContentAnalysis::from_metadata(props, AnalysisSource::Metadata, 0.5)
    }

    fn load_timestamps(&self, path: &Path) -> Result<FrameTimestamps, FrameError> {
        let video = self.video(path)?;
        let frame_ms = frame_duration_ms(video.fps);
        let count = (self.duration_ms / frame_ms).ceil() as i64 + 1;
        self.timestamp_loads.fetch_add(1, Ordering::SeqCst);
        Ok(FrameTimestamps::new(
            (0..count).map(|i| i as f64 * frame_ms).collect(),
        ))
    }

    fn open(&self, request: &OpenRequest<'_>) -> Result<Box<dyn VideoHandle>, FrameError> {
        if self.unopenable.iter().any(|p| p == request.path) {
            return Err(FrameError::open(request.path, "synthetic open failure"));
        }
        let mut video = self.video(request.path)?.clone();
        video.plan = request.plan;
        // Source timestamps no longer line up after decimation
        if !request.plan.changes_frame_count() {
            video.timestamps = request.timestamps.clone();
        }
        self.opened
            .lock()
            .push((request.path.to_path_buf(), request.plan));
        Ok(Box::new(video))
    }
}
