use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{ExerciseProfile, ExerciseType, MotionError, RaiseLowerProfile, Result, SingleLegProfile};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub profiles: ProfileConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::info!(?path, "loaded configuration");
        Ok(config)
    }

    /// Checks values that would otherwise stall or invert the state machines.
    pub fn validate(&self) -> Result<()> {
        if !(self.engine.debounce_seconds >= 0.0) {
            return Err(MotionError::InvalidInput("debounce_seconds must be non-negative"));
        }
        if !(self.engine.min_frame_interval >= 0.0) {
            return Err(MotionError::InvalidInput("min_frame_interval must be non-negative"));
        }
        // The squat peaks at the smaller knee angle, so its thresholds run
        // the other way round.
        for (name, profile, peak_is_larger) in [
            ("arm_raise", &self.profiles.arm_raise, true),
            ("squat", &self.profiles.squat, false),
        ] {
            if !(profile.hysteresis >= 0.0) {
                return Err(MotionError::msg(format!(
                    "{name}: hysteresis must be non-negative"
                )));
            }
            let ordered = if peak_is_larger {
                profile.down_threshold < profile.up_threshold
            } else {
                profile.down_threshold > profile.up_threshold
            };
            if !ordered {
                return Err(MotionError::msg(format!(
                    "{name}: down_threshold {} and up_threshold {} are in the wrong order",
                    profile.down_threshold, profile.up_threshold
                )));
            }
        }
        if !(self.profiles.single_leg_stand.hold_duration > 0.0) {
            return Err(MotionError::InvalidInput("hold_duration must be positive"));
        }
        Ok(())
    }

    /// Effective profile for `exercise`.
    pub fn profile(&self, exercise: ExerciseType) -> ExerciseProfile {
        self.profiles.profile(exercise)
    }
}

/// Settings shared by every exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds a posture error must persist before it is reported.
    pub debounce_seconds: f64,
    /// Soft minimum spacing between admitted frames, in seconds.
    pub min_frame_interval: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: 1.0,
            min_frame_interval: 0.025,
        }
    }
}

/// One profile per supported exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    #[serde(deserialize_with = "arm_raise_profile")]
    pub arm_raise: RaiseLowerProfile,
    #[serde(deserialize_with = "squat_profile")]
    pub squat: RaiseLowerProfile,
    pub single_leg_stand: SingleLegProfile,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            arm_raise: RaiseLowerProfile::arm_raise(),
            squat: RaiseLowerProfile::squat(),
            single_leg_stand: SingleLegProfile::default(),
        }
    }
}

impl ProfileConfig {
    pub fn profile(&self, exercise: ExerciseType) -> ExerciseProfile {
        match exercise {
            ExerciseType::ArmRaise => ExerciseProfile::RaiseLower(self.arm_raise),
            ExerciseType::Squat => ExerciseProfile::RaiseLower(self.squat),
            ExerciseType::SingleLegStand => ExerciseProfile::SingleLeg(self.single_leg_stand),
        }
    }
}

/// Partial raise/lower profile as written in a config file. Omitted fields
/// keep the exercise's built-in value.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RaiseLowerOverrides {
    down_threshold: Option<f64>,
    up_threshold: Option<f64>,
    hysteresis: Option<f64>,
}

impl RaiseLowerOverrides {
    fn apply(self, base: RaiseLowerProfile) -> RaiseLowerProfile {
        RaiseLowerProfile {
            down_threshold: self.down_threshold.unwrap_or(base.down_threshold),
            up_threshold: self.up_threshold.unwrap_or(base.up_threshold),
            hysteresis: self.hysteresis.unwrap_or(base.hysteresis),
        }
    }
}

fn arm_raise_profile<'de, D>(deserializer: D) -> std::result::Result<RaiseLowerProfile, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RaiseLowerOverrides::deserialize(deserializer)?.apply(RaiseLowerProfile::arm_raise()))
}

fn squat_profile<'de, D>(deserializer: D) -> std::result::Result<RaiseLowerProfile, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(RaiseLowerOverrides::deserialize(deserializer)?.apply(RaiseLowerProfile::squat()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "engine": { "debounce_seconds": 0.5 } }"#).unwrap();

        assert_eq!(config.engine.debounce_seconds, 0.5);
        assert_eq!(config.engine.min_frame_interval, 0.025);
        assert_eq!(config.profiles.squat, RaiseLowerProfile::squat());
        assert_eq!(config.profiles.single_leg_stand.hold_duration, 10.0);
    }

    #[test]
    fn partial_raise_lower_profile_keeps_exercise_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "profiles": { "squat": { "hysteresis": 3 }, "arm_raise": { "up_threshold": 150 } } }"#,
        )
        .unwrap();

        assert_eq!(config.profiles.squat.hysteresis, 3.0);
        assert_eq!(config.profiles.squat.down_threshold, 160.0);
        assert_eq!(config.profiles.squat.up_threshold, 90.0);
        assert_eq!(config.profiles.arm_raise.up_threshold, 150.0);
        assert_eq!(config.profiles.arm_raise.down_threshold, 90.0);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_thresholds_in_the_wrong_order() {
        let mut config = AppConfig::default();
        config.profiles.squat = RaiseLowerProfile::arm_raise();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.profiles.arm_raise = RaiseLowerProfile::squat();
        assert!(config.validate().is_err());

        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_negative_debounce() {
        let mut config = AppConfig::default();
        config.engine.debounce_seconds = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn profile_lookup_matches_exercise() {
        let config = AppConfig::default();
        for exercise in ExerciseType::ALL {
            assert!(config.profile(exercise).fits(exercise));
        }
    }
}
