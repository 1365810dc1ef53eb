//! Frame alignment audit.
//!
//! Predicts, for the rounding mode that will be used at save time, which
//! events end up on a different frame than their exact (post-sync) times.
//! Read-only: no event timing is modified.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::timing::{format_display_timestamp, frame_at, frame_duration_ms};
use crate::subtitles::error::SubtitleError;
use crate::subtitles::types::{RoundingMode, SubtitleData};

const PREVIEW_CHARS: usize = 40;
const RULE: &str = "======================================================================";

/// Category of an audit issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueType {
    BothDrift,
    EndEarly,
    EndLate,
    StartEarly,
    StartLate,
    Ok,
}

impl IssueType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BothDrift => "BOTH_DRIFT",
            Self::EndEarly => "END_EARLY",
            Self::EndLate => "END_LATE",
            Self::StartEarly => "START_EARLY",
            Self::StartLate => "START_LATE",
            Self::Ok => "OK",
        }
    }
}

/// One event whose start or end drifts after rounding.
#[derive(Debug, Clone)]
pub struct FrameAuditIssue {
    pub line_index: usize,
    /// First 40 characters of the text, newlines flattened.
    pub text_preview: String,
    /// Start time as `HH:MM:SS.cc`.
    pub timestamp_display: String,

    pub exact_start_ms: f64,
    pub rounded_start_ms: i64,
    pub target_start_frame: i64,
    pub actual_start_frame: i64,
    /// Frames off: negative is early, positive is late.
    pub start_drift: i64,
    pub start_fix_needed_ms: i64,

    pub exact_end_ms: f64,
    pub rounded_end_ms: i64,
    pub target_end_frame: i64,
    pub actual_end_frame: i64,
    pub end_drift: i64,
    pub end_fix_needed_ms: i64,

    pub original_duration_ms: f64,
    pub rounded_duration_ms: i64,
    pub duration_delta_ms: i64,
}

impl FrameAuditIssue {
    pub fn issue_type(&self) -> IssueType {
        if self.start_drift != 0 && self.end_drift != 0 {
            IssueType::BothDrift
        } else if self.start_drift < 0 {
            IssueType::StartEarly
        } else if self.start_drift > 0 {
            IssueType::StartLate
        } else if self.end_drift < 0 {
            IssueType::EndEarly
        } else if self.end_drift > 0 {
            IssueType::EndLate
        } else {
            IssueType::Ok
        }
    }
}

/// Aggregate audit result for one subtitle track.
#[derive(Debug, Clone)]
pub struct FrameAuditResult {
    pub job_name: String,
    pub fps: f64,
    pub frame_duration_ms: f64,
    pub rounding_mode: RoundingMode,
    pub offset_applied_ms: f64,
    /// Non-comment events audited.
    pub total_events: usize,
    pub audit_timestamp: DateTime<Local>,

    pub start_ok: usize,
    pub start_early: usize,
    pub start_late: usize,

    pub end_ok: usize,
    pub end_early: usize,
    pub end_late: usize,

    pub span_ok: usize,
    pub span_changed: usize,

    pub duration_unchanged: usize,
    pub duration_delta_10ms: usize,
    pub duration_delta_20ms: usize,
    pub duration_delta_large: usize,

    /// Only events with drift.
    pub issues: Vec<FrameAuditIssue>,

    /// Start drifts each mode would produce.
    pub floor_issues: usize,
    pub round_issues: usize,
    pub ceil_issues: usize,
}

impl FrameAuditResult {
    fn new(job_name: &str, fps: f64, rounding_mode: RoundingMode, offset_ms: f64) -> Self {
        Self {
            job_name: job_name.to_string(),
            fps,
            frame_duration_ms: frame_duration_ms(fps),
            rounding_mode,
            offset_applied_ms: offset_ms,
            total_events: 0,
            audit_timestamp: Local::now(),
            start_ok: 0,
            start_early: 0,
            start_late: 0,
            end_ok: 0,
            end_early: 0,
            end_late: 0,
            span_ok: 0,
            span_changed: 0,
            duration_unchanged: 0,
            duration_delta_10ms: 0,
            duration_delta_20ms: 0,
            duration_delta_large: 0,
            issues: Vec::new(),
            floor_issues: 0,
            round_issues: 0,
            ceil_issues: 0,
        }
    }

    pub fn total_start_issues(&self) -> usize {
        self.start_early + self.start_late
    }

    pub fn total_end_issues(&self) -> usize {
        self.end_early + self.end_late
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Mode with the fewest start issues (ties: floor, round, ceil).
    pub fn suggested_mode(&self) -> RoundingMode {
        [
            (RoundingMode::Floor, self.floor_issues),
            (RoundingMode::Round, self.round_issues),
            (RoundingMode::Ceil, self.ceil_issues),
        ]
        .into_iter()
        .fold(None, |best: Option<(RoundingMode, usize)>, (mode, count)| match best {
            Some((_, best_count)) if best_count <= count => best,
            _ => Some((mode, count)),
        })
        .map(|(mode, _)| mode)
        .unwrap_or_default()
    }
}

#[inline]
fn rounded_cs(ms: f64, mode: RoundingMode) -> i64 {
    mode.apply_ass(ms) as i64
}

/// Smallest centisecond change that puts `exact_ms` back in `target_frame`.
fn find_minimal_fix(exact_ms: f64, target_frame: i64, frame_ms: f64, mode: RoundingMode) -> i64 {
    let frame_start = target_frame as f64 * frame_ms;
    let frame_end = (target_frame + 1) as f64 * frame_ms;

    let rounded = rounded_cs(exact_ms, mode);
    if frame_at(rounded as f64, frame_ms) == target_frame {
        return 0;
    }

    let ceil_start = (frame_start / 10.0).ceil() as i64 * 10;
    if frame_at(ceil_start as f64, frame_ms) == target_frame {
        return ceil_start - rounded;
    }

    let floor_end = ((frame_end - 0.1) / 10.0).floor() as i64 * 10;
    if frame_at(floor_end as f64, frame_ms) == target_frame {
        return floor_end - rounded;
    }

    (frame_start - rounded as f64) as i64
}

fn text_preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview.replace('\n', " ").replace("\\N", " ")
}

/// Audit every non-comment event against `fps` under `rounding_mode`.
///
/// Call after the sync offset has been applied and before saving.
pub fn run_frame_audit(
    data: &SubtitleData,
    fps: f64,
    rounding_mode: RoundingMode,
    offset_ms: f64,
    job_name: &str,
) -> FrameAuditResult {
    let mut result = FrameAuditResult::new(job_name, fps, rounding_mode, offset_ms);
    let frame_ms = result.frame_duration_ms;

    tracing::info!("[FrameAudit] Starting audit: {} events", data.events.len());
    tracing::debug!(
        "[FrameAudit] FPS: {:.3}, frame duration: {:.3}ms, rounding: {}",
        fps,
        frame_ms,
        rounding_mode.name()
    );

    for (idx, event) in data.events.iter().enumerate() {
        if event.is_comment {
            continue;
        }
        result.total_events += 1;

        let exact_start = event.start_ms;
        let exact_end = event.end_ms;

        let target_start_frame = frame_at(exact_start, frame_ms);
        let target_end_frame = frame_at(exact_end, frame_ms);

        let rounded_start = rounded_cs(exact_start, rounding_mode);
        let rounded_end = rounded_cs(exact_end, rounding_mode);

        let actual_start_frame = frame_at(rounded_start as f64, frame_ms);
        let actual_end_frame = frame_at(rounded_end as f64, frame_ms);

        let start_drift = actual_start_frame - target_start_frame;
        let end_drift = actual_end_frame - target_end_frame;

        let original_duration = exact_end - exact_start;
        let rounded_duration = rounded_end - rounded_start;
        let duration_delta = rounded_duration - original_duration.trunc() as i64;

        match start_drift {
            0 => result.start_ok += 1,
            d if d < 0 => result.start_early += 1,
            _ => result.start_late += 1,
        }
        match end_drift {
            0 => result.end_ok += 1,
            d if d < 0 => result.end_early += 1,
            _ => result.end_late += 1,
        }

        if actual_end_frame - actual_start_frame == target_end_frame - target_start_frame {
            result.span_ok += 1;
        } else {
            result.span_changed += 1;
        }

        match duration_delta.abs() {
            0 => result.duration_unchanged += 1,
            1..=10 => result.duration_delta_10ms += 1,
            11..=20 => result.duration_delta_20ms += 1,
            _ => result.duration_delta_large += 1,
        }

        for mode in [RoundingMode::Floor, RoundingMode::Round, RoundingMode::Ceil] {
            if frame_at(rounded_cs(exact_start, mode) as f64, frame_ms) != target_start_frame {
                match mode {
                    RoundingMode::Floor => result.floor_issues += 1,
                    RoundingMode::Round => result.round_issues += 1,
                    RoundingMode::Ceil => result.ceil_issues += 1,
                }
            }
        }

        if start_drift != 0 || end_drift != 0 {
            result.issues.push(FrameAuditIssue {
                line_index: idx,
                text_preview: text_preview(&event.text),
                timestamp_display: format_display_timestamp(exact_start),
                exact_start_ms: exact_start,
                rounded_start_ms: rounded_start,
                target_start_frame,
                actual_start_frame,
                start_drift,
                start_fix_needed_ms: find_minimal_fix(
                    exact_start,
                    target_start_frame,
                    frame_ms,
                    rounding_mode,
                ),
                exact_end_ms: exact_end,
                rounded_end_ms: rounded_end,
                target_end_frame,
                actual_end_frame,
                end_drift,
                end_fix_needed_ms: find_minimal_fix(
                    exact_end,
                    target_end_frame,
                    frame_ms,
                    rounding_mode,
                ),
                original_duration_ms: original_duration,
                rounded_duration_ms: rounded_duration,
                duration_delta_ms: duration_delta,
            });
        }
    }

    tracing::info!(
        "[FrameAudit] Audit complete: {} issues found",
        result.issues.len()
    );
    result
}

fn pct(count: usize, total: usize) -> f64 {
    100.0 * count as f64 / total as f64
}

/// Render the plain-text report.
pub fn format_audit_report(result: &FrameAuditResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let mut line = |text: String| {
        let _ = writeln!(out, "{}", text);
    };

    line(RULE.to_string());
    line("FRAME ALIGNMENT AUDIT REPORT".to_string());
    line(RULE.to_string());
    line(String::new());
    line(format!("Job: {}", result.job_name));
    line(format!(
        "Audit time: {}",
        result.audit_timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    line(format!("Sync offset applied: {:+.3}ms", result.offset_applied_ms));
    line(format!(
        "Target FPS: {:.3} (frame duration: {:.3}ms)",
        result.fps, result.frame_duration_ms
    ));
    line(format!("Rounding mode: {}", result.rounding_mode.name()));
    line(format!("Total events: {}", result.total_events));
    line(String::new());

    line(RULE.to_string());
    line("SUMMARY".to_string());
    line(RULE.to_string());
    line(String::new());

    let total = result.total_events;
    if total > 0 {
        let row = |label: &str, count: usize| {
            format!("  {:<19}{:4} ({:.1}%)", label, count, pct(count, total))
        };

        line("Start times:".to_string());
        line(row("Correct frame:", result.start_ok));
        line(row("1+ frame early:", result.start_early));
        line(row("1+ frame late:", result.start_late));
        line(String::new());

        line("End times:".to_string());
        line(row("Correct frame:", result.end_ok));
        line(row("1+ frame early:", result.end_early));
        line(row("1+ frame late:", result.end_late));
        line(String::new());

        line("Frame span:".to_string());
        line(row("Correct span:", result.span_ok));
        line(row("Span changed:", result.span_changed));
        line(String::new());

        line("Duration delta:".to_string());
        line(row("Unchanged (0ms):", result.duration_unchanged));
        line(row("+/-10ms:", result.duration_delta_10ms));
        line(row("+/-20ms:", result.duration_delta_20ms));
        line(row(">+/-20ms:", result.duration_delta_large));
        line(String::new());

        line("Rounding mode comparison (start time issues):".to_string());
        line(format!("  {:<19}{:4} issues", "Floor:", result.floor_issues));
        line(format!("  {:<19}{:4} issues", "Round:", result.round_issues));
        line(format!("  {:<19}{:4} issues", "Ceil:", result.ceil_issues));
        line(format!(
            "  {:<19}{} (fewest issues)",
            "Suggested mode:",
            result.suggested_mode().name()
        ));
        line(String::new());
    }

    if result.has_issues() {
        line(RULE.to_string());
        line(format!(
            "ISSUES ({} events with frame drift)",
            result.issues.len()
        ));
        line(RULE.to_string());
        line(String::new());

        let mut sorted: Vec<&FrameAuditIssue> = result.issues.iter().collect();
        sorted.sort_by_key(|i| (i.issue_type().name(), i.line_index));

        for issue in sorted {
            line(format!(
                "[{}] Line {} @ {}",
                issue.issue_type().name(),
                issue.line_index,
                issue.timestamp_display
            ));
            line(format!("  Text: \"{}\"", issue.text_preview));

            if issue.start_drift != 0 {
                line(format!(
                    "  Start: {:.2}ms -> {}ms (frame {} -> {}) {} FRAME {}",
                    issue.exact_start_ms,
                    issue.rounded_start_ms,
                    issue.target_start_frame,
                    issue.actual_start_frame,
                    issue.start_drift.abs(),
                    if issue.start_drift < 0 { "EARLY" } else { "LATE" }
                ));
                line(format!(
                    "  Would need: {:+}ms to fix start",
                    issue.start_fix_needed_ms
                ));
            } else {
                line(format!("  Start OK: frame {}", issue.target_start_frame));
            }

            if issue.end_drift != 0 {
                line(format!(
                    "  End: {:.2}ms -> {}ms (frame {} -> {}) {} FRAME {}",
                    issue.exact_end_ms,
                    issue.rounded_end_ms,
                    issue.target_end_frame,
                    issue.actual_end_frame,
                    issue.end_drift.abs(),
                    if issue.end_drift < 0 { "EARLY" } else { "LATE" }
                ));
                line(format!(
                    "  Would need: {:+}ms to fix end",
                    issue.end_fix_needed_ms
                ));
            } else {
                line(format!("  End OK: frame {}", issue.target_end_frame));
            }

            if issue.duration_delta_ms != 0 {
                line(format!(
                    "  Duration: {:.1}ms -> {}ms ({:+}ms)",
                    issue.original_duration_ms, issue.rounded_duration_ms, issue.duration_delta_ms
                ));
            }
            line(String::new());
        }
    } else {
        line(RULE.to_string());
        line("NO ISSUES DETECTED".to_string());
        line(RULE.to_string());
        line(String::new());
        line("All subtitle events will land on their correct frames after rounding.".to_string());
        line(String::new());
    }

    line(RULE.to_string());
    line("END OF REPORT".to_string());
    out.push_str(RULE);
    out
}

/// Report file name: `{job}_{YYYYmmdd_HHMMSS}_frame_audit.txt`.
pub fn audit_report_filename(result: &FrameAuditResult) -> String {
    let safe_job: String = result
        .job_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || "._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}_{}_frame_audit.txt",
        safe_job,
        result.audit_timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Write the report into `output_dir` (created if needed).
pub fn write_audit_report(
    result: &FrameAuditResult,
    output_dir: &Path,
) -> Result<PathBuf, SubtitleError> {
    fs::create_dir_all(output_dir).map_err(|e| SubtitleError::write(output_dir, e))?;

    let path = output_dir.join(audit_report_filename(result));
    fs::write(&path, format_audit_report(result)).map_err(|e| SubtitleError::write(&path, e))?;

    tracing::info!("[FrameAudit] Report written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitles::types::SubtitleEvent;

    const FPS: f64 = 23.976;

    fn data(events: Vec<SubtitleEvent>) -> SubtitleData {
        SubtitleData {
            events,
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_events_have_no_issues() {
        let result = run_frame_audit(
            &data(vec![SubtitleEvent::new(1000.0, 2000.0, "ok")]),
            FPS,
            RoundingMode::Floor,
            0.0,
            "job",
        );

        assert_eq!(result.total_events, 1);
        assert_eq!(result.start_ok, 1);
        assert_eq!(result.end_ok, 1);
        assert_eq!(result.duration_unchanged, 1);
        assert!(!result.has_issues());
    }

    #[test]
    fn test_floor_start_drifts_early() {
        let result = run_frame_audit(
            &data(vec![SubtitleEvent::new(4171.0, 5105.0, "line")]),
            FPS,
            RoundingMode::Floor,
            0.0,
            "job",
        );

        assert_eq!(result.start_early, 1);
        assert_eq!(result.end_ok, 1);
        assert_eq!(result.span_changed, 1);
        assert_eq!(result.floor_issues, 1);
        assert_eq!(result.ceil_issues, 0);

        let issue = &result.issues[0];
        assert_eq!(issue.issue_type(), IssueType::StartEarly);
        assert_eq!(issue.rounded_start_ms, 4170);
        assert_eq!(issue.target_start_frame, 100);
        assert_eq!(issue.actual_start_frame, 99);
        assert_eq!(issue.start_drift, -1);
        assert_eq!(issue.start_fix_needed_ms, 10);
        assert_eq!(issue.end_fix_needed_ms, 0);
    }

    #[test]
    fn test_hundred_events_twelve_drifting() {
        // 240 frames at 24000/1001 last exactly 10010ms, so every block
        // repeats the same centisecond/frame relationship.
        let fps = 24000.0 / 1001.0;
        let events = (0..100)
            .map(|k| {
                let base = k as f64 * 10_010.0;
                let start = if k < 12 { base + 4171.0 } else { base + 4180.0 };
                SubtitleEvent::new(start, base + 5105.0, "x")
            })
            .collect();

        let result = run_frame_audit(&data(events), fps, RoundingMode::Floor, 0.0, "batch");

        assert_eq!(result.total_events, 100);
        assert_eq!(result.start_early + result.start_late, 12);
        assert_eq!(result.start_early, 12);
        assert_eq!(result.start_ok, 88);
        assert_eq!(result.end_ok, 100);
        assert_eq!(result.issues.len(), 12);
    }

    #[test]
    fn test_suggested_mode_tie_prefers_floor() {
        let mut result = run_frame_audit(&data(vec![]), FPS, RoundingMode::Round, 0.0, "job");
        assert_eq!(result.suggested_mode(), RoundingMode::Floor);

        result.floor_issues = 3;
        result.round_issues = 1;
        result.ceil_issues = 1;
        assert_eq!(result.suggested_mode(), RoundingMode::Round);
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut comment = SubtitleEvent::new(4171.0, 5105.0, "comment");
        comment.is_comment = true;

        let result = run_frame_audit(&data(vec![comment]), FPS, RoundingMode::Floor, 0.0, "job");
        assert_eq!(result.total_events, 0);
        assert!(!result.has_issues());
    }

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("a\\Nb"), "a b");
        let long = "x".repeat(50);
        assert_eq!(text_preview(&long), format!("{}...", "x".repeat(40)));
    }

    #[test]
    fn test_report_contents() {
        let result = run_frame_audit(
            &data(vec![SubtitleEvent::new(4171.0, 5105.0, "Hello\nthere")]),
            FPS,
            RoundingMode::Floor,
            -41.5,
            "Show: Ep/01",
        );

        let report = format_audit_report(&result);
        assert!(report.contains("FRAME ALIGNMENT AUDIT REPORT"));
        assert!(report.contains("Sync offset applied: -41.500ms"));
        assert!(report.contains("[START_EARLY] Line 0 @ 00:00:04.17"));
        assert!(report.contains("Text: \"Hello there\""));
        assert!(report.contains("Would need: +10ms to fix start"));
        assert!(report.contains("Suggested mode:    ceil (fewest issues)"));
        assert!(report.ends_with(&format!("END OF REPORT\n{}", RULE)));
    }

    #[test]
    fn test_write_audit_report() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_frame_audit(
            &data(vec![SubtitleEvent::new(1000.0, 2000.0, "ok")]),
            FPS,
            RoundingMode::Floor,
            0.0,
            "Show: Ep/01",
        );

        let path = write_audit_report(&result, &dir.path().join("audit")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Show__Ep_01_"));
        assert!(name.ends_with("_frame_audit.txt"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("NO ISSUES DETECTED"));
    }
}
