//! Per-session frame log and end-of-session aggregation.

use serde::{Deserialize, Serialize};

use crate::{AngleSet, ErrorRecord, MotionError, Result, Severity};

/// One processed frame as stored in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub timestamp: f64,
    pub rep_count: u32,
    pub angles: AngleSet,
    pub errors: Vec<ErrorRecord>,
}

/// Occurrence count of one error name across a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStat {
    pub name: String,
    pub count: u32,
    /// Severity of the first occurrence.
    pub severity: Severity,
}

/// Statistics computed once when a session is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_reps: u32,
    pub correct_reps: u32,
    /// Percentage of frames without any reported error, rounded to two
    /// decimals.
    pub accuracy: f64,
    pub duration_seconds: u64,
    pub frame_count: usize,
    /// Error histogram in first-seen order.
    pub common_errors: Vec<ErrorStat>,
}

/// Append-only log of processed frames. Sealed by [`FrameLog::finalize`].
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    frames: Vec<FrameRecord>,
    finalized: bool,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: FrameRecord) -> Result<()> {
        if self.finalized {
            return Err(MotionError::SessionFinalized);
        }
        self.frames.push(record);
        Ok(())
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn latest(&self) -> Option<&FrameRecord> {
        self.frames.last()
    }

    /// Seals the log and computes its summary. Only the first call succeeds.
    pub fn finalize(&mut self, duration_seconds: u64) -> Result<SessionSummary> {
        if self.finalized {
            return Err(MotionError::SessionFinalized);
        }
        self.finalized = true;
        Ok(SessionAggregator::summarize(&self.frames, duration_seconds))
    }
}

/// Pure end-of-session statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionAggregator;

impl SessionAggregator {
    pub fn summarize(frames: &[FrameRecord], duration_seconds: u64) -> SessionSummary {
        let total_reps = frames.iter().map(|frame| frame.rep_count).max().unwrap_or(0);

        let clean_frames = frames.iter().filter(|frame| frame.errors.is_empty()).count();
        let accuracy = if frames.is_empty() {
            0.0
        } else {
            clean_frames as f64 / frames.len() as f64 * 100.0
        };

        // Session-wide accuracy scaled onto the rep count, not a per-rep audit.
        let correct_reps = (total_reps as f64 * accuracy / 100.0).floor() as u32;

        SessionSummary {
            total_reps,
            correct_reps,
            accuracy: (accuracy * 100.0).round() / 100.0,
            duration_seconds,
            frame_count: frames.len(),
            common_errors: error_histogram(frames),
        }
    }
}

fn error_histogram(frames: &[FrameRecord]) -> Vec<ErrorStat> {
    let mut stats: Vec<ErrorStat> = Vec::new();
    for error in frames.iter().flat_map(|frame| &frame.errors) {
        match stats.iter_mut().find(|stat| stat.name == error.name) {
            Some(stat) => stat.count += 1,
            None => stats.push(ErrorStat {
                name: error.name.clone(),
                count: 1,
                severity: error.severity,
            }),
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostureError;

    fn frame(rep_count: u32, errors: &[PostureError]) -> FrameRecord {
        FrameRecord {
            timestamp: 0.0,
            rep_count,
            angles: AngleSet::new(),
            errors: errors.iter().map(|error| error.record()).collect(),
        }
    }

    #[test]
    fn empty_log_summarises_to_zero() {
        let mut log = FrameLog::new();
        let summary = log.finalize(0).unwrap();

        assert_eq!(summary.total_reps, 0);
        assert_eq!(summary.correct_reps, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.common_errors.is_empty());
    }

    #[test]
    fn computes_accuracy_and_correct_reps() {
        let frames = vec![
            frame(0, &[]),
            frame(1, &[PostureError::KneeAngleHigh]),
            frame(2, &[]),
            frame(3, &[PostureError::KneeAngleHigh, PostureError::NotStandingStraight]),
            frame(3, &[PostureError::KneeAngleHigh]),
            frame(3, &[]),
        ];
        let summary = SessionAggregator::summarize(&frames, 42);

        assert_eq!(summary.total_reps, 3);
        assert_eq!(summary.accuracy, 50.0);
        // floor(3 * 50%)
        assert_eq!(summary.correct_reps, 1);
        assert_eq!(summary.duration_seconds, 42);
        assert_eq!(summary.frame_count, 6);
        assert_eq!(
            summary.common_errors,
            vec![
                ErrorStat {
                    name: "Not deep enough".to_string(),
                    count: 3,
                    severity: Severity::High,
                },
                ErrorStat {
                    name: "Not standing straight".to_string(),
                    count: 1,
                    severity: Severity::Medium,
                },
            ]
        );
    }

    #[test]
    fn finalize_seals_the_log() {
        let mut log = FrameLog::new();
        log.append(frame(1, &[])).unwrap();
        assert!(log.finalize(1).is_ok());

        assert!(matches!(log.finalize(1), Err(MotionError::SessionFinalized)));
        assert!(matches!(log.append(frame(2, &[])), Err(MotionError::SessionFinalized)));
        assert_eq!(log.len(), 1);
    }
}
