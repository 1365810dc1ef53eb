//! Per-video analysis cache.
//!
//! Loading a per-frame timestamp table or running cadence analysis means
//! decoding the whole file, so both are memoized by path. The cache is an
//! explicit object owned by the caller and passed into each sync call; it
//! can be shared between tracks processed in parallel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::timing::EPSILON;
use super::types::ContentAnalysis;
use crate::subtitles::error::FrameError;

/// Presentation timestamps of every frame, in ms from the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTimestamps {
    pts_ms: Vec<f64>,
}

impl FrameTimestamps {
    /// Build from raw timestamps in any order.
    ///
    /// Sorted into presentation order and rebased so frame 0 is at 0ms.
    pub fn new(mut pts_ms: Vec<f64>) -> Self {
        pts_ms.retain(|p| p.is_finite());
        pts_ms.sort_by(f64::total_cmp);
        if let Some(&first) = pts_ms.first() {
            for p in &mut pts_ms {
                *p -= first;
            }
        }
        Self { pts_ms }
    }

    /// Parse `ffprobe -show_entries packet=pts_time -of csv=p=0` output (seconds).
    ///
    /// Lines without a usable time (`N/A`, blank) are skipped.
    pub fn from_ffprobe_csv(output: &str) -> Self {
        let pts_ms = output
            .lines()
            .filter_map(|line| line.split(',').next())
            .filter_map(|field| field.trim().parse::<f64>().ok())
            .map(|secs| secs * 1000.0)
            .collect();
        Self::new(pts_ms)
    }

    pub fn len(&self) -> usize {
        self.pts_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pts_ms.is_empty()
    }

    /// PTS of frame `index` in ms.
    pub fn pts(&self, index: i64) -> Option<f64> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.pts_ms.get(i).copied())
    }

    /// Frame displayed at `time_ms`: the last frame whose PTS is not after it.
    ///
    /// None before the first frame or for an empty table.
    pub fn frame_for_time(&self, time_ms: f64) -> Option<i64> {
        let after = self.pts_ms.partition_point(|&p| p <= time_ms + EPSILON);
        after.checked_sub(1).map(|i| i as i64)
    }
}

/// Memoized timestamp tables and content analyses, keyed by path.
#[derive(Debug, Default)]
pub struct VideoAnalysisCache {
    timestamps: Mutex<HashMap<PathBuf, Arc<FrameTimestamps>>>,
    content: Mutex<HashMap<PathBuf, ContentAnalysis>>,
}

impl VideoAnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached timestamp table for `path`, loading it on first use.
    ///
    /// Load failures are not cached.
    pub fn timestamps_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<FrameTimestamps>, FrameError>
    where
        F: FnOnce() -> Result<FrameTimestamps, FrameError>,
    {
        if let Some(hit) = self.timestamps.lock().get(path) {
            tracing::debug!("[VideoCache] Timestamp cache hit: {}", path.display());
            return Ok(Arc::clone(hit));
        }

        // Loaded outside the lock; a concurrent load of the same path keeps the first result
        let loaded = Arc::new(load()?);
        let mut map = self.timestamps.lock();
        Ok(Arc::clone(map.entry(path.to_path_buf()).or_insert(loaded)))
    }

    /// Cached content analysis for `path`, computing it on first use.
    pub fn content_or_analyze<F>(&self, path: &Path, analyze: F) -> ContentAnalysis
    where
        F: FnOnce() -> ContentAnalysis,
    {
        if let Some(hit) = self.content.lock().get(path) {
            tracing::debug!("[VideoCache] Content analysis cache hit: {}", path.display());
            return hit.clone();
        }

        let analysis = analyze();
        self.content
            .lock()
            .entry(path.to_path_buf())
            .or_insert(analysis)
            .clone()
    }

    /// Whether anything is cached for `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.timestamps.lock().contains_key(path) || self.content.lock().contains_key(path)
    }

    /// Drop everything cached for `path` (e.g. after the file changed).
    pub fn invalidate(&self, path: &Path) {
        self.timestamps.lock().remove(path);
        self.content.lock().remove(path);
    }

    pub fn clear(&self) {
        self.timestamps.lock().clear();
        self.content.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::frame_utils::types::{AnalysisSource, VideoProperties};

    #[test]
    fn test_timestamps_from_ffprobe_csv() {
        // Decode order with B-frames, offset start
        let csv = "1.042000\n1.000000\n1.125000,\nN/A\n\n1.083000\n";
        let table = FrameTimestamps::from_ffprobe_csv(csv);

        assert_eq!(table.len(), 4);
        assert_eq!(table.pts(0), Some(0.0));
        assert!((table.pts(1).unwrap() - 42.0).abs() < 1e-6);
        assert!((table.pts(3).unwrap() - 125.0).abs() < 1e-6);
        assert_eq!(table.pts(4), None);
        assert_eq!(table.pts(-1), None);
    }

    #[test]
    fn test_frame_for_time() {
        let table = FrameTimestamps::new(vec![0.0, 40.0, 90.0, 130.0]);

        assert_eq!(table.frame_for_time(-1.0), None);
        assert_eq!(table.frame_for_time(0.0), Some(0));
        assert_eq!(table.frame_for_time(39.9), Some(0));
        assert_eq!(table.frame_for_time(40.0), Some(1));
        assert_eq!(table.frame_for_time(100.0), Some(2));
        assert_eq!(table.frame_for_time(10_000.0), Some(3));
        assert_eq!(FrameTimestamps::new(vec![]).frame_for_time(5.0), None);
    }

    #[test]
    fn test_timestamps_loaded_once() {
        let cache = VideoAnalysisCache::new();
        let path = Path::new("/videos/a.mkv");
        let mut loads = 0;

        for _ in 0..3 {
            let table = cache
                .timestamps_or_load(path, || {
                    loads += 1;
                    Ok(FrameTimestamps::new(vec![0.0, 41.7]))
                })
                .unwrap();
            assert_eq!(table.len(), 2);
        }
        assert_eq!(loads, 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = VideoAnalysisCache::new();
        let path = Path::new("/videos/a.mkv");

        let err = cache.timestamps_or_load(path, || Err(FrameError::FfprobeNotFound));
        assert!(err.is_err());
        assert!(!cache.contains(path));

        assert!(cache
            .timestamps_or_load(path, || Ok(FrameTimestamps::new(vec![0.0])))
            .is_ok());
        assert!(cache.contains(path));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = VideoAnalysisCache::new();
        let a = Path::new("/videos/a.mkv");
        let b = Path::new("/videos/b.mkv");
        let props = VideoProperties::default();
        let analysis = || ContentAnalysis::from_metadata(&props, AnalysisSource::Metadata, 0.5);

        cache.content_or_analyze(a, analysis);
        cache.content_or_analyze(b, analysis);
        assert!(cache.contains(a) && cache.contains(b));

        cache.invalidate(a);
        assert!(!cache.contains(a));
        assert!(cache.contains(b));

        cache.clear();
        assert!(!cache.contains(b));
    }

    #[test]
    fn test_content_analysis_memoized() {
        let cache = VideoAnalysisCache::new();
        let path = Path::new("/videos/a.vob");
        let props = VideoProperties::default();
        let mut runs = 0;

        for _ in 0..2 {
            cache.content_or_analyze(path, || {
                runs += 1;
                ContentAnalysis::from_metadata(&props, AnalysisSource::Idet, 0.9)
            });
        }
        assert_eq!(runs, 1);
    }
}
