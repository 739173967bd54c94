use serde::{Deserialize, Serialize};

use crate::ExerciseType;

/// Thresholds for the raise/lower counter family. `down_threshold` is the
/// resting pose and `up_threshold` the peak. For the squat the peak is the
/// smaller angle, so the two are inverted compared with the arm raise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaiseLowerProfile {
    pub down_threshold: f64,
    pub up_threshold: f64,
    pub hysteresis: f64,
}

impl RaiseLowerProfile {
    pub fn arm_raise() -> Self {
        Self {
            down_threshold: 90.0,
            up_threshold: 160.0,
            hysteresis: 5.0,
        }
    }

    pub fn squat() -> Self {
        Self {
            down_threshold: 160.0,
            up_threshold: 90.0,
            hysteresis: 5.0,
        }
    }
}

/// Configuration of the single-leg-stand counter. Durations are in seconds,
/// heights in normalised frame units, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleLegProfile {
    pub knee_threshold: f64,
    pub knee_height_threshold: f64,
    pub hold_duration: f64,
    pub hysteresis: f64,
    pub switch_pause: f64,
    pub complete_pause: f64,
    /// Degrees beyond `knee_threshold` at which a hold counts as lost.
    pub lost_position_margin: f64,
    /// Knee angle above which the lifted leg counts as back on the ground.
    pub leg_down_angle: f64,
}

impl Default for SingleLegProfile {
    fn default() -> Self {
        Self {
            knee_threshold: 90.0,
            knee_height_threshold: 0.1,
            hold_duration: 10.0,
            hysteresis: 5.0,
            switch_pause: 2.0,
            complete_pause: 3.0,
            lost_position_margin: 15.0,
            leg_down_angle: 160.0,
        }
    }
}

/// Static per-exercise configuration consumed by the rep counter and the
/// posture detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ExerciseProfile {
    RaiseLower(RaiseLowerProfile),
    SingleLeg(SingleLegProfile),
}

impl ExerciseProfile {
    /// Built-in profile for `exercise`.
    pub fn for_exercise(exercise: ExerciseType) -> Self {
        match exercise {
            ExerciseType::ArmRaise => Self::RaiseLower(RaiseLowerProfile::arm_raise()),
            ExerciseType::Squat => Self::RaiseLower(RaiseLowerProfile::squat()),
            ExerciseType::SingleLegStand => Self::SingleLeg(SingleLegProfile::default()),
        }
    }

    /// Whether this profile can drive the counter family `exercise` needs.
    pub fn fits(&self, exercise: ExerciseType) -> bool {
        matches!(
            (self, exercise.is_single_leg()),
            (Self::RaiseLower(_), false) | (Self::SingleLeg(_), true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squat_thresholds_are_inverted() {
        let squat = RaiseLowerProfile::squat();
        let arm = RaiseLowerProfile::arm_raise();
        assert!(squat.down_threshold > squat.up_threshold);
        assert!(arm.down_threshold < arm.up_threshold);
    }

    #[test]
    fn built_in_profiles_fit_their_exercise() {
        for exercise in ExerciseType::ALL {
            assert!(ExerciseProfile::for_exercise(exercise).fits(exercise));
        }
        let single_leg = ExerciseProfile::for_exercise(ExerciseType::SingleLegStand);
        assert!(!single_leg.fits(ExerciseType::Squat));
    }
}
