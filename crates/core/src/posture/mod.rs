//! Debounced posture-error detection.
//!
//! Each exercise has a fixed, ordered rule table keyed by FSM state. A rule
//! that fires starts a timer for its error; the error is only reported once
//! the rule has fired on every update for at least the debounce window. A
//! rule that stops firing loses its timer immediately.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    angles::{keys, neutral},
    AngleSet, ExerciseState, ExerciseType,
};

/// Default seconds a violation must persist before it is reported.
pub const DEFAULT_DEBOUNCE_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every posture error the rule tables can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureError {
    ShoulderAngleLow,
    ElbowBent,
    ArmsNotDown,
    KneeAngleHigh,
    NotStandingStraight,
    KneeNotHigh,
    KneeNotBent,
}

impl PostureError {
    /// Stable identifier used as the debounce key.
    pub fn code(self) -> &'static str {
        match self {
            Self::ShoulderAngleLow => "shoulder_angle_low",
            Self::ElbowBent => "elbow_bent",
            Self::ArmsNotDown => "arms_not_down",
            Self::KneeAngleHigh => "knee_angle_high",
            Self::NotStandingStraight => "not_standing_straight",
            Self::KneeNotHigh => "knee_not_high",
            Self::KneeNotBent => "knee_not_bent",
        }
    }

    /// Short human-readable name, used as the histogram key.
    pub fn name(self) -> &'static str {
        match self {
            Self::ShoulderAngleLow => "Not raised enough",
            Self::ElbowBent => "Arm not straight",
            Self::ArmsNotDown => "Not fully lowered",
            Self::KneeAngleHigh => "Not deep enough",
            Self::NotStandingStraight => "Not standing straight",
            Self::KneeNotHigh => "Knee not high enough",
            Self::KneeNotBent => "Knee not bent enough",
        }
    }

    /// Corrective cue shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::ShoulderAngleLow => "Raise your arms higher!",
            Self::ElbowBent => "Straighten your arms!",
            Self::ArmsNotDown => "Lower your arms all the way!",
            Self::KneeAngleHigh => "Bend your knees deeper!",
            Self::NotStandingStraight => "Stand up straight!",
            Self::KneeNotHigh => "Lift your knee higher!",
            Self::KneeNotBent => "Bend your knee more!",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::ShoulderAngleLow | Self::KneeAngleHigh | Self::KneeNotHigh => Severity::High,
            Self::ElbowBent
            | Self::ArmsNotDown
            | Self::NotStandingStraight
            | Self::KneeNotBent => Severity::Medium,
        }
    }

    pub fn record(self) -> ErrorRecord {
        ErrorRecord {
            name: self.name().to_string(),
            message: self.message().to_string(),
            severity: self.severity(),
        }
    }
}

/// A surfaced posture error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub name: String,
    pub message: String,
    pub severity: Severity,
}

/// Scalars the rules are evaluated against, derived once per frame.
#[derive(Debug, Clone, Copy)]
struct Measurements {
    /// Larger of the two shoulder angles.
    shoulder: f64,
    /// Smaller of the two elbow angles.
    elbow: f64,
    /// Smaller of the two knee angles.
    knee: f64,
    /// Knee angle of the lifted leg (the side with the smaller angle).
    active_knee: f64,
    active_knee_y: f64,
    active_hip_y: f64,
}

impl Measurements {
    fn from_angles(angles: &AngleSet) -> Self {
        let left_knee = angles.get_or(keys::LEFT_KNEE, neutral::EXTENDED_JOINT);
        let right_knee = angles.get_or(keys::RIGHT_KNEE, neutral::EXTENDED_JOINT);
        let (active_knee, knee_y_key, hip_y_key) = if left_knee < right_knee {
            (left_knee, keys::LEFT_KNEE_Y, keys::LEFT_HIP_Y)
        } else {
            (right_knee, keys::RIGHT_KNEE_Y, keys::RIGHT_HIP_Y)
        };

        Self {
            shoulder: angles
                .get_or(keys::LEFT_SHOULDER, neutral::RESTING_SHOULDER)
                .max(angles.get_or(keys::RIGHT_SHOULDER, neutral::RESTING_SHOULDER)),
            elbow: angles
                .get_or(keys::LEFT_ELBOW, neutral::EXTENDED_JOINT)
                .min(angles.get_or(keys::RIGHT_ELBOW, neutral::EXTENDED_JOINT)),
            knee: left_knee.min(right_knee),
            active_knee,
            active_knee_y: angles.get_or(knee_y_key, neutral::NORMALISED_Y),
            active_hip_y: angles.get_or(hip_y_key, neutral::NORMALISED_Y),
        }
    }
}

struct PostureRule {
    state: ExerciseState,
    error: PostureError,
    violated: fn(&Measurements) -> bool,
}

const ARM_RAISE_RULES: &[PostureRule] = &[
    PostureRule {
        state: ExerciseState::Up,
        error: PostureError::ShoulderAngleLow,
        violated: |m| m.shoulder < 160.0,
    },
    PostureRule {
        state: ExerciseState::Up,
        error: PostureError::ElbowBent,
        violated: |m| m.elbow < 160.0,
    },
    PostureRule {
        state: ExerciseState::Down,
        error: PostureError::ArmsNotDown,
        violated: |m| m.shoulder > 90.0,
    },
];

const SQUAT_RULES: &[PostureRule] = &[
    PostureRule {
        state: ExerciseState::Up,
        error: PostureError::KneeAngleHigh,
        violated: |m| m.knee > 90.0,
    },
    PostureRule {
        state: ExerciseState::Down,
        error: PostureError::NotStandingStraight,
        violated: |m| m.knee < 160.0,
    },
];

const SINGLE_LEG_RULES: &[PostureRule] = &[
    PostureRule {
        state: ExerciseState::Holding,
        error: PostureError::KneeNotHigh,
        violated: |m| m.active_knee_y >= m.active_hip_y - 0.05,
    },
    PostureRule {
        state: ExerciseState::Holding,
        error: PostureError::KneeNotBent,
        violated: |m| m.active_knee > 100.0,
    },
];

fn rules_for(exercise: ExerciseType) -> &'static [PostureRule] {
    match exercise {
        ExerciseType::ArmRaise => ARM_RAISE_RULES,
        ExerciseType::Squat => SQUAT_RULES,
        ExerciseType::SingleLegStand => SINGLE_LEG_RULES,
    }
}

/// Per-session debounce filter over the exercise's rule table.
#[derive(Debug, Clone)]
pub struct ErrorDetector {
    exercise: ExerciseType,
    debounce_seconds: f64,
    /// First-detection timestamp per currently firing error.
    timers: HashMap<PostureError, f64>,
}

impl ErrorDetector {
    pub fn new(exercise: ExerciseType) -> Self {
        Self::with_debounce(exercise, DEFAULT_DEBOUNCE_SECONDS)
    }

    pub fn with_debounce(exercise: ExerciseType, debounce_seconds: f64) -> Self {
        Self {
            exercise,
            debounce_seconds,
            timers: HashMap::new(),
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    /// Evaluates the rules for `state` at `now` and returns every error whose
    /// debounce window has elapsed, in rule-table order.
    pub fn detect(&mut self, angles: &AngleSet, state: ExerciseState, now: f64) -> Vec<ErrorRecord> {
        let measurements = Measurements::from_angles(angles);
        let mut firing = Vec::new();
        let mut reported = Vec::new();

        for rule in rules_for(self.exercise).iter().filter(|rule| rule.state == state) {
            if !(rule.violated)(&measurements) {
                continue;
            }
            firing.push(rule.error);

            let first_seen = *self.timers.entry(rule.error).or_insert(now);
            if now - first_seen >= self.debounce_seconds {
                reported.push(rule.error.record());
            }
        }

        self.timers.retain(|error, _| firing.contains(error));

        if !reported.is_empty() {
            tracing::debug!(
                exercise = %self.exercise,
                state = %state,
                errors = reported.len(),
                "posture errors reported"
            );
        }
        reported
    }

    /// Number of errors currently being timed.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Drops every running debounce timer.
    pub fn reset(&mut self) {
        self.timers.clear();
    }
}
