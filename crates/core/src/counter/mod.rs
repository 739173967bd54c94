//! Repetition counting state machines.
//!
//! Two families share one contract (`update`, `state`, `reset`):
//!
//! - [`RaiseLowerCounter`] for movements that swing a single primary angle
//!   between a resting and a peak threshold (arm raise, squat).
//! - [`SingleLegCounter`] for the timed single-leg stand, which alternates
//!   sides and only counts a repetition once both legs have held.
//!
//! All transitions are driven by the caller-supplied timestamp; the counters
//! never read a clock themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    angles::{keys, neutral},
    AngleSet, ExerciseProfile, ExerciseType, MotionError, RaiseLowerProfile, Result,
    SingleLegProfile,
};

/// Upper bound on chained transitions inside one raise/lower update. Each of
/// the four states is visited at most once before hysteresis stops the walk.
const MAX_SETTLE_STEPS: usize = 4;

/// Current phase of an exercise. Raise/lower exercises use `Down`, `Raising`,
/// `Up` and `Lowering`; the single-leg stand uses `Ready`, `Lifting`,
/// `Holding`, `Lowering`, `SwitchSide` and `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseState {
    Down,
    Raising,
    Up,
    Lowering,
    Ready,
    Lifting,
    Holding,
    SwitchSide,
    Complete,
}

impl ExerciseState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Raising => "raising",
            Self::Up => "up",
            Self::Lowering => "lowering",
            Self::Ready => "ready",
            Self::Lifting => "lifting",
            Self::Holding => "holding",
            Self::SwitchSide => "switch_side",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ExerciseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leg currently tracked by the single-leg counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Per-session repetition counter, one variant per exercise family.
#[derive(Debug, Clone)]
pub enum RepCounter {
    RaiseLower(RaiseLowerCounter),
    SingleLeg(SingleLegCounter),
}

impl RepCounter {
    /// Counter for `exercise` using its built-in profile.
    pub fn new(exercise: ExerciseType) -> Self {
        match ExerciseProfile::for_exercise(exercise) {
            ExerciseProfile::RaiseLower(profile) => {
                Self::RaiseLower(RaiseLowerCounter::new(exercise, profile))
            }
            ExerciseProfile::SingleLeg(profile) => Self::SingleLeg(SingleLegCounter::new(profile)),
        }
    }

    /// Counter for `exercise` using an explicit profile. The profile family
    /// must match the exercise.
    pub fn with_profile(exercise: ExerciseType, profile: ExerciseProfile) -> Result<Self> {
        match profile {
            ExerciseProfile::RaiseLower(profile) if !exercise.is_single_leg() => {
                Ok(Self::RaiseLower(RaiseLowerCounter::new(exercise, profile)))
            }
            ExerciseProfile::SingleLeg(profile) if exercise.is_single_leg() => {
                Ok(Self::SingleLeg(SingleLegCounter::new(profile)))
            }
            _ => Err(MotionError::msg(format!(
                "profile family does not match exercise `{exercise}`"
            ))),
        }
    }

    /// Feeds one frame of angles observed at `now` (seconds) and returns the
    /// repetition count.
    pub fn update(&mut self, angles: &AngleSet, now: f64) -> u32 {
        match self {
            Self::RaiseLower(counter) => counter.update(angles, now),
            Self::SingleLeg(counter) => counter.update(angles, now),
        }
    }

    pub fn state(&self) -> ExerciseState {
        match self {
            Self::RaiseLower(counter) => counter.state(),
            Self::SingleLeg(counter) => counter.state(),
        }
    }

    pub fn rep_count(&self) -> u32 {
        match self {
            Self::RaiseLower(counter) => counter.rep_count(),
            Self::SingleLeg(counter) => counter.rep_count(),
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        match self {
            Self::RaiseLower(counter) => counter.exercise(),
            Self::SingleLeg(_) => ExerciseType::SingleLegStand,
        }
    }

    /// Returns the counter to its initial state and clears every timer and
    /// flag, including the repetition count.
    pub fn reset(&mut self) {
        match self {
            Self::RaiseLower(counter) => counter.reset(),
            Self::SingleLeg(counter) => counter.reset(),
        }
    }

    /// Seconds left in the current hold. Only set while a single-leg hold
    /// is in progress.
    pub fn hold_time_remaining(&self) -> Option<f64> {
        match self {
            Self::RaiseLower(_) => None,
            Self::SingleLeg(counter) => counter.hold_time_remaining(),
        }
    }

    /// Leg being tracked. Only set for the single-leg family.
    pub fn current_side(&self) -> Option<Side> {
        match self {
            Self::RaiseLower(_) => None,
            Self::SingleLeg(counter) => Some(counter.current_side()),
        }
    }
}

/// Which direction the primary angle travels on the way to the peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Travel {
    /// Angle grows toward the peak (arm raise, max of both shoulders).
    Opening,
    /// Angle shrinks toward the peak (squat, min of both knees).
    Closing,
}

/// Hysteresis state machine for the arm raise and the squat.
#[derive(Debug, Clone)]
pub struct RaiseLowerCounter {
    exercise: ExerciseType,
    travel: Travel,
    profile: RaiseLowerProfile,
    state: ExerciseState,
    rep_count: u32,
    last_state_change: Option<f64>,
}

impl RaiseLowerCounter {
    pub fn new(exercise: ExerciseType, profile: RaiseLowerProfile) -> Self {
        let travel = match exercise {
            ExerciseType::Squat => Travel::Closing,
            _ => Travel::Opening,
        };
        Self {
            exercise,
            travel,
            profile,
            state: ExerciseState::Down,
            rep_count: 0,
            last_state_change: None,
        }
    }

    pub fn update(&mut self, angles: &AngleSet, now: f64) -> u32 {
        let primary = self.primary_angle(angles);

        for _ in 0..MAX_SETTLE_STEPS {
            let next = match self.travel {
                Travel::Opening => self.next_opening(primary),
                Travel::Closing => self.next_closing(primary),
            };
            let Some(next) = next else { break };
            self.transition(next, primary, now);
        }

        self.rep_count
    }

    pub fn state(&self) -> ExerciseState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn reset(&mut self) {
        self.state = ExerciseState::Down;
        self.rep_count = 0;
        self.last_state_change = None;
    }

    fn primary_angle(&self, angles: &AngleSet) -> f64 {
        match self.travel {
            Travel::Opening => angles
                .get_or(keys::LEFT_SHOULDER, neutral::RESTING_SHOULDER)
                .max(angles.get_or(keys::RIGHT_SHOULDER, neutral::RESTING_SHOULDER)),
            Travel::Closing => angles
                .get_or(keys::LEFT_KNEE, neutral::EXTENDED_JOINT)
                .min(angles.get_or(keys::RIGHT_KNEE, neutral::EXTENDED_JOINT)),
        }
    }

    fn next_opening(&self, angle: f64) -> Option<ExerciseState> {
        let RaiseLowerProfile {
            down_threshold: down,
            up_threshold: up,
            hysteresis,
        } = self.profile;

        match self.state {
            ExerciseState::Down if angle > down + hysteresis => Some(ExerciseState::Raising),
            ExerciseState::Raising if angle >= up => Some(ExerciseState::Up),
            ExerciseState::Raising if angle < down => Some(ExerciseState::Down),
            ExerciseState::Up if angle < up - hysteresis => Some(ExerciseState::Lowering),
            ExerciseState::Lowering if angle < down => Some(ExerciseState::Down),
            ExerciseState::Lowering if angle > up => Some(ExerciseState::Up),
            _ => None,
        }
    }

    fn next_closing(&self, angle: f64) -> Option<ExerciseState> {
        let RaiseLowerProfile {
            down_threshold: down,
            up_threshold: up,
            hysteresis,
        } = self.profile;

        match self.state {
            ExerciseState::Down if angle < down - hysteresis => Some(ExerciseState::Lowering),
            ExerciseState::Lowering if angle <= up => Some(ExerciseState::Up),
            ExerciseState::Lowering if angle > down => Some(ExerciseState::Down),
            ExerciseState::Up if angle > up + hysteresis => Some(ExerciseState::Raising),
            ExerciseState::Raising if angle >= down => Some(ExerciseState::Down),
            ExerciseState::Raising if angle < up => Some(ExerciseState::Up),
            _ => None,
        }
    }

    fn transition(&mut self, next: ExerciseState, angle: f64, now: f64) {
        // Returning to Down from the inbound phase completes a repetition;
        // aborting from the outbound phase does not.
        let inbound = match self.travel {
            Travel::Opening => ExerciseState::Lowering,
            Travel::Closing => ExerciseState::Raising,
        };
        if next == ExerciseState::Down && self.state == inbound {
            self.rep_count += 1;
        }

        let phase_seconds = self.last_state_change.map(|since| now - since);
        tracing::debug!(
            exercise = %self.exercise,
            from = %self.state,
            to = %next,
            angle,
            ?phase_seconds,
            reps = self.rep_count,
            "state transition"
        );
        self.state = next;
        self.last_state_change = Some(now);
    }
}

/// Timed single-leg stand: each leg must hold a raised knee for
/// `hold_duration` seconds; one repetition is both legs.
#[derive(Debug, Clone)]
pub struct SingleLegCounter {
    profile: SingleLegProfile,
    state: ExerciseState,
    rep_count: u32,
    current_side: Side,
    hold_start_time: Option<f64>,
    left_completed: bool,
    right_completed: bool,
    last_state_change: Option<f64>,
    last_update: Option<f64>,
}

impl SingleLegCounter {
    pub fn new(profile: SingleLegProfile) -> Self {
        Self {
            profile,
            state: ExerciseState::Ready,
            rep_count: 0,
            current_side: Side::Left,
            hold_start_time: None,
            left_completed: false,
            right_completed: false,
            last_state_change: None,
            last_update: None,
        }
    }

    pub fn update(&mut self, angles: &AngleSet, now: f64) -> u32 {
        self.last_update = Some(now);

        let (knee_key, knee_y_key, hip_y_key) = match self.current_side {
            Side::Left => (keys::LEFT_KNEE, keys::LEFT_KNEE_Y, keys::LEFT_HIP_Y),
            Side::Right => (keys::RIGHT_KNEE, keys::RIGHT_KNEE_Y, keys::RIGHT_HIP_Y),
        };
        let knee_angle = angles.get_or(knee_key, neutral::EXTENDED_JOINT);
        let knee_y = angles.get_or(knee_y_key, neutral::NORMALISED_Y);
        let hip_y = angles.get_or(hip_y_key, neutral::NORMALISED_Y);

        // Image y grows downwards, so a positive difference means the knee
        // sits above the hip.
        let height_diff = hip_y - knee_y;
        let knee_lifted = height_diff > self.profile.knee_height_threshold
            && knee_angle < self.profile.knee_threshold;

        tracing::trace!(
            side = self.current_side.as_str(),
            height_diff,
            knee_angle,
            knee_lifted,
            "single leg sample"
        );

        let since_change = self
            .last_state_change
            .map(|changed| now - changed)
            .unwrap_or(f64::INFINITY);

        match self.state {
            ExerciseState::Ready => {
                if knee_lifted {
                    self.transition(ExerciseState::Lifting, now);
                }
            }
            ExerciseState::Lifting => {
                if knee_angle <= self.profile.knee_threshold && knee_lifted {
                    self.hold_start_time = Some(now);
                    self.transition(ExerciseState::Holding, now);
                } else if !knee_lifted {
                    self.transition(ExerciseState::Ready, now);
                }
            }
            ExerciseState::Holding => {
                if let Some(started) = self.hold_start_time {
                    let lost = !knee_lifted
                        || knee_angle
                            > self.profile.knee_threshold + self.profile.lost_position_margin;
                    if lost {
                        self.hold_start_time = None;
                        self.transition(ExerciseState::Lowering, now);
                    } else if now - started >= self.profile.hold_duration {
                        self.hold_start_time = None;
                        match self.current_side {
                            Side::Left => self.left_completed = true,
                            Side::Right => self.right_completed = true,
                        }
                        tracing::debug!(side = self.current_side.as_str(), "hold completed");
                        self.transition(ExerciseState::Lowering, now);
                    }
                }
            }
            ExerciseState::Lowering => {
                if !knee_lifted && knee_angle > self.profile.leg_down_angle {
                    if self.left_completed && self.right_completed {
                        self.rep_count += 1;
                        self.left_completed = false;
                        self.right_completed = false;
                        self.transition(ExerciseState::Complete, now);
                    } else {
                        self.current_side = self.current_side.opposite();
                        self.transition(ExerciseState::SwitchSide, now);
                    }
                }
            }
            ExerciseState::SwitchSide => {
                if since_change > self.profile.switch_pause {
                    self.transition(ExerciseState::Ready, now);
                }
            }
            ExerciseState::Complete => {
                if since_change > self.profile.complete_pause {
                    self.current_side = Side::Left;
                    self.transition(ExerciseState::Ready, now);
                }
            }
            // Raise/lower states are never entered by this family.
            ExerciseState::Down | ExerciseState::Raising | ExerciseState::Up => {}
        }

        self.rep_count
    }

    pub fn state(&self) -> ExerciseState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn current_side(&self) -> Side {
        self.current_side
    }

    pub fn left_completed(&self) -> bool {
        self.left_completed
    }

    pub fn right_completed(&self) -> bool {
        self.right_completed
    }

    /// Seconds left before the current hold succeeds, measured at the most
    /// recent update.
    pub fn hold_time_remaining(&self) -> Option<f64> {
        if self.state != ExerciseState::Holding {
            return None;
        }
        let started = self.hold_start_time?;
        let now = self.last_update?;
        Some((self.profile.hold_duration - (now - started)).max(0.0))
    }

    pub fn reset(&mut self) {
        self.state = ExerciseState::Ready;
        self.rep_count = 0;
        self.current_side = Side::Left;
        self.hold_start_time = None;
        self.left_completed = false;
        self.right_completed = false;
        self.last_state_change = None;
        self.last_update = None;
    }

    fn transition(&mut self, next: ExerciseState, now: f64) {
        tracing::debug!(
            side = self.current_side.as_str(),
            from = %self.state,
            to = %next,
            reps = self.rep_count,
            "state transition"
        );
        self.state = next;
        self.last_state_change = Some(now);
    }
}
