use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    feedback, AngleCalculator, AngleSet, AppConfig, ErrorDetector, ErrorRecord, ExerciseState,
    ExerciseType, FrameRecord, MotionError, RepCounter, Result, Side, Skeleton,
};

/// Extra fields reported only for the single-leg stand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLegExtras {
    pub hold_time_remaining: Option<f64>,
    pub current_side: Side,
}

/// Everything reported for a frame in which a pose was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseDetails {
    pub timestamp: f64,
    /// Angles rounded to one decimal place.
    pub angles: AngleSet,
    pub rep_count: u32,
    pub errors: Vec<ErrorRecord>,
    pub feedback: String,
    pub state: ExerciseState,
    #[serde(flatten)]
    pub single_leg: Option<SingleLegExtras>,
}

/// Per-frame result sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub pose_detected: bool,
    #[serde(flatten)]
    pub details: Option<PoseDetails>,
}

impl FrameAnalysis {
    /// Result for a frame in which the estimator found no body.
    pub fn no_pose() -> Self {
        Self {
            pose_detected: false,
            details: None,
        }
    }

    pub fn rep_count(&self) -> Option<u32> {
        self.details.as_ref().map(|details| details.rep_count)
    }

    pub fn state(&self) -> Option<ExerciseState> {
        self.details.as_ref().map(|details| details.state)
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        self.details
            .as_ref()
            .map(|details| details.errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn feedback(&self) -> Option<&str> {
        self.details.as_ref().map(|details| details.feedback.as_str())
    }
}

/// A processed frame: the log entry and the client-facing analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub record: FrameRecord,
    pub analysis: FrameAnalysis,
}

/// Per-session pipeline: angles, then rep counting, then posture errors.
/// Frames must be fed in arrival order; the analyzer is not shared between
/// sessions.
#[derive(Clone)]
pub struct ExerciseAnalyzer {
    exercise: ExerciseType,
    counter: RepCounter,
    detector: ErrorDetector,
    last_timestamp: Option<f64>,
    frames_processed: u64,
}

impl ExerciseAnalyzer {
    /// Creates an analyzer with the built-in profile and debounce window.
    pub fn new(exercise: ExerciseType) -> Self {
        Self {
            exercise,
            counter: RepCounter::new(exercise),
            detector: ErrorDetector::new(exercise),
            last_timestamp: None,
            frames_processed: 0,
        }
    }

    /// Creates an analyzer using the profile and debounce window from
    /// `config`.
    pub fn with_config(exercise: ExerciseType, config: &AppConfig) -> Result<Self> {
        let counter = RepCounter::with_profile(exercise, config.profile(exercise))?;
        let detector = ErrorDetector::with_debounce(exercise, config.engine.debounce_seconds);
        Ok(Self {
            exercise,
            counter,
            detector,
            last_timestamp: None,
            frames_processed: 0,
        })
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn counter(&self) -> &RepCounter {
        &self.counter
    }

    pub fn rep_count(&self) -> u32 {
        self.counter.rep_count()
    }

    pub fn state(&self) -> ExerciseState {
        self.counter.state()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Clears the counter and every debounce timer while preserving
    /// configuration.
    pub fn reset(&mut self) {
        self.counter.reset();
        self.detector.reset();
        self.last_timestamp = None;
        tracing::debug!(exercise = %self.exercise, "analyzer reset");
    }

    /// Runs one frame through the pipeline. A timestamp earlier than the
    /// previous frame is treated as the previous instant.
    pub fn process(&mut self, skeleton: &Skeleton, timestamp: f64) -> Result<ProcessedFrame> {
        if !timestamp.is_finite() {
            return Err(MotionError::MalformedFrame(
                "frame timestamp is not finite".to_string(),
            ));
        }

        let now = match self.last_timestamp {
            Some(last) if timestamp < last => {
                tracing::debug!(timestamp, last, "out-of-order frame clamped");
                last
            }
            _ => timestamp,
        };
        self.last_timestamp = Some(now);

        let angles = AngleCalculator::get_angles(skeleton, self.exercise);
        let rep_count = self.counter.update(&angles, now);
        let state = self.counter.state();
        let errors = self.detector.detect(&angles, state, now);

        let side = self.counter.current_side();
        let hold_time_remaining = self.counter.hold_time_remaining();
        let feedback = feedback::feedback_for(&errors, state, side, hold_time_remaining);
        let single_leg = side.map(|current_side| SingleLegExtras {
            hold_time_remaining,
            current_side,
        });

        self.frames_processed += 1;

        let analysis = FrameAnalysis {
            pose_detected: true,
            details: Some(PoseDetails {
                timestamp: now,
                angles: angles.rounded(),
                rep_count,
                errors: errors.clone(),
                feedback,
                state,
                single_leg,
            }),
        };
        let record = FrameRecord {
            timestamp: now,
            rep_count,
            angles,
            errors,
        };

        Ok(ProcessedFrame { record, analysis })
    }
}

impl fmt::Debug for ExerciseAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExerciseAnalyzer")
            .field("exercise", &self.exercise)
            .field("state", &self.counter.state())
            .field("rep_count", &self.counter.rep_count())
            .field("pending_errors", &self.detector.pending())
            .field("last_timestamp", &self.last_timestamp)
            .field("frames_processed", &self.frames_processed)
            .finish()
    }
}

/// Admission hint for transports: drops frames that arrive closer together
/// than the configured minimum interval.
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval: f64,
    last_admitted: Option<f64>,
}

impl FrameGate {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval: min_interval.max(0.0),
            last_admitted: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.engine.min_frame_interval)
    }

    /// Returns `true` and records `timestamp` if the frame should be
    /// processed.
    pub fn admit(&mut self, timestamp: f64) -> bool {
        if let Some(last) = self.last_admitted {
            if timestamp - last < self.min_interval {
                return false;
            }
        }
        self.last_admitted = Some(timestamp);
        true
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }
}
