//! Joint-angle geometry.
//!
//! Turns a [`Skeleton`] into the named angle set a given exercise needs. The
//! schema differs per exercise; consumers read keys through [`AngleSet::get_or`]
//! so that a partially populated set degrades to neutral values.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Landmark, MotionError, PoseLandmark, Result, Skeleton};

/// Added to the denominator of the cosine so that zero-length rays stay finite.
const DEGENERATE_EPSILON: f64 = 1e-6;

/// Angle-set keys shared by the calculator, counters and posture rules.
pub mod keys {
    pub const LEFT_KNEE: &str = "left_knee";
    pub const RIGHT_KNEE: &str = "right_knee";
    pub const LEFT_SHOULDER: &str = "left_shoulder";
    pub const RIGHT_SHOULDER: &str = "right_shoulder";
    pub const LEFT_ELBOW: &str = "left_elbow";
    pub const RIGHT_ELBOW: &str = "right_elbow";
    pub const LEFT_LEG: &str = "left_leg";
    pub const RIGHT_LEG: &str = "right_leg";
    pub const LEFT_FOOT_HEIGHT: &str = "left_foot_height";
    pub const RIGHT_FOOT_HEIGHT: &str = "right_foot_height";
    pub const LEFT_KNEE_Y: &str = "left_knee_y";
    pub const RIGHT_KNEE_Y: &str = "right_knee_y";
    pub const LEFT_HIP_Y: &str = "left_hip_y";
    pub const RIGHT_HIP_Y: &str = "right_hip_y";
}

/// Neutral fallbacks used when a key is absent from the set.
pub mod neutral {
    /// Straight knee or elbow.
    pub const EXTENDED_JOINT: f64 = 180.0;
    /// Arm hanging at the side.
    pub const RESTING_SHOULDER: f64 = 0.0;
    /// Middle of the frame.
    pub const NORMALISED_Y: f64 = 0.5;
}

/// Exercises the engine knows how to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    ArmRaise,
    SingleLegStand,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 3] = [Self::Squat, Self::ArmRaise, Self::SingleLegStand];

    /// Identifier used on the wire and in storage.
    pub fn id(self) -> &'static str {
        match self {
            Self::Squat => "squat",
            Self::ArmRaise => "arm_raise",
            Self::SingleLegStand => "single_leg_stand",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Squat => "Squat",
            Self::ArmRaise => "Arm Raise",
            Self::SingleLegStand => "Single Leg Stand",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Squat => "Strengthens the thighs and glutes",
            Self::ArmRaise => "Shoulder and arm mobility",
            Self::SingleLegStand => "Balance and leg strength",
        }
    }

    /// Suggested repetitions for one session.
    pub fn target_reps(self) -> u32 {
        match self {
            Self::Squat => 10,
            Self::ArmRaise => 15,
            Self::SingleLegStand => 5,
        }
    }

    /// Whether the exercise uses the single-leg counter family.
    pub fn is_single_leg(self) -> bool {
        matches!(self, Self::SingleLegStand)
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExerciseType {
    type Err = MotionError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|exercise| exercise.id() == value)
            .ok_or_else(|| MotionError::UnsupportedExercise(value.to_string()))
    }
}

/// Catalog entry describing an exercise to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub target_reps: u32,
}

impl From<ExerciseType> for ExerciseInfo {
    fn from(exercise: ExerciseType) -> Self {
        Self {
            id: exercise.id().to_string(),
            name: exercise.display_name().to_string(),
            description: exercise.description().to_string(),
            target_reps: exercise.target_reps(),
        }
    }
}

/// Named joint angles (degrees) and auxiliary scalars for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AngleSet {
    values: BTreeMap<String, f64>,
}

impl AngleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Reads `key`, falling back to `default` when the joint was not measured.
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Copy with every value rounded to one decimal place, as reported to
    /// clients.
    pub fn rounded(&self) -> Self {
        Self {
            values: self
                .iter()
                .map(|(key, value)| (key.to_string(), (value * 10.0).round() / 10.0))
                .collect(),
        }
    }
}

/// Stateless joint-angle geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct AngleCalculator;

impl AngleCalculator {
    /// Angle at vertex `b` between the rays `b -> a` and `b -> c`, in
    /// degrees within `[0, 180]`. Measured in the image plane.
    pub fn calculate_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f64 {
        let (bax, bay) = (a.x - b.x, a.y - b.y);
        let (bcx, bcy) = (c.x - b.x, c.y - b.y);

        let dot = bax * bcx + bay * bcy;
        let norms = bax.hypot(bay) * bcx.hypot(bcy);
        let cosine = dot / (norms + DEGENERATE_EPSILON);

        // NaN only appears for non-finite input; the clamp keeps it out of acos.
        let cosine = if cosine.is_nan() { 1.0 } else { cosine.clamp(-1.0, 1.0) };
        cosine.acos().to_degrees()
    }

    /// Builds the angle set `exercise` needs from `skeleton`.
    pub fn get_angles(skeleton: &Skeleton, exercise: ExerciseType) -> AngleSet {
        use PoseLandmark::*;

        let angle = |a: PoseLandmark, b: PoseLandmark, c: PoseLandmark| {
            Self::calculate_angle(skeleton.get(a), skeleton.get(b), skeleton.get(c))
        };
        let y = |joint: PoseLandmark| skeleton.get(joint).y;

        let mut set = AngleSet::new();
        match exercise {
            ExerciseType::Squat => {
                set.insert(keys::LEFT_KNEE, angle(LeftHip, LeftKnee, LeftAnkle));
                set.insert(keys::RIGHT_KNEE, angle(RightHip, RightKnee, RightAnkle));
            }
            ExerciseType::ArmRaise => {
                set.insert(keys::LEFT_SHOULDER, angle(LeftHip, LeftShoulder, LeftElbow));
                set.insert(keys::RIGHT_SHOULDER, angle(RightHip, RightShoulder, RightElbow));
                set.insert(keys::LEFT_ELBOW, angle(LeftShoulder, LeftElbow, LeftWrist));
                set.insert(keys::RIGHT_ELBOW, angle(RightShoulder, RightElbow, RightWrist));
            }
            ExerciseType::SingleLegStand => {
                set.insert(keys::LEFT_LEG, angle(LeftShoulder, LeftHip, LeftKnee));
                set.insert(keys::RIGHT_LEG, angle(RightShoulder, RightHip, RightKnee));
                set.insert(keys::LEFT_KNEE, angle(LeftHip, LeftKnee, LeftAnkle));
                set.insert(keys::RIGHT_KNEE, angle(RightHip, RightKnee, RightAnkle));
                set.insert(keys::LEFT_FOOT_HEIGHT, y(LeftAnkle) - y(RightKnee));
                set.insert(keys::RIGHT_FOOT_HEIGHT, y(RightAnkle) - y(LeftKnee));
                set.insert(keys::LEFT_KNEE_Y, y(LeftKnee));
                set.insert(keys::RIGHT_KNEE_Y, y(RightKnee));
                set.insert(keys::LEFT_HIP_Y, y(LeftHip));
                set.insert(keys::RIGHT_HIP_Y, y(RightHip));

                tracing::trace!(
                    left_knee = set.get_or(keys::LEFT_KNEE, neutral::EXTENDED_JOINT),
                    right_knee = set.get_or(keys::RIGHT_KNEE, neutral::EXTENDED_JOINT),
                    "single leg angles"
                );
            }
        }
        set
    }

    /// Like [`Self::get_angles`] but accepts the exercise by name, reporting
    /// [`MotionError::UnsupportedExercise`] for unknown names.
    pub fn get_angles_for(skeleton: &Skeleton, exercise: &str) -> Result<AngleSet> {
        let exercise = exercise.parse::<ExerciseType>()?;
        Ok(Self::get_angles(skeleton, exercise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> Landmark {
        Landmark::new(x, y)
    }

    #[test]
    fn right_angle_and_straight_line() {
        let right = AngleCalculator::calculate_angle(&point(0.0, 1.0), &point(0.0, 0.0), &point(1.0, 0.0));
        assert!((right - 90.0).abs() < 1e-3);

        let straight =
            AngleCalculator::calculate_angle(&point(-1.0, 0.0), &point(0.0, 0.0), &point(1.0, 0.0));
        // The epsilon in the denominator shaves a fraction of a degree off.
        assert!((straight - 180.0).abs() < 0.1);
    }

    #[test]
    fn identical_points_stay_finite() {
        let p = point(0.3, 0.3);
        let angle = AngleCalculator::calculate_angle(&p, &p, &p);
        assert!(angle.is_finite());
        assert!((0.0..=180.0).contains(&angle));
    }

    #[test]
    fn parses_known_and_rejects_unknown_exercises() {
        assert_eq!("squat".parse::<ExerciseType>().unwrap(), ExerciseType::Squat);
        assert_eq!(
            "single_leg_stand".parse::<ExerciseType>().unwrap(),
            ExerciseType::SingleLegStand
        );

        let err = AngleCalculator::get_angles_for(&Skeleton::default(), "push_up").unwrap_err();
        assert!(matches!(err, MotionError::UnsupportedExercise(name) if name == "push_up"));
    }

    #[test]
    fn squat_schema_measures_both_knees() {
        let mut skeleton = Skeleton::default();
        skeleton.set(PoseLandmark::LeftHip, point(0.4, 0.5));
        skeleton.set(PoseLandmark::LeftKnee, point(0.4, 0.7));
        skeleton.set(PoseLandmark::LeftAnkle, point(0.4, 0.9));
        skeleton.set(PoseLandmark::RightHip, point(0.6, 0.5));
        skeleton.set(PoseLandmark::RightKnee, point(0.6, 0.7));
        skeleton.set(PoseLandmark::RightAnkle, point(0.8, 0.7));

        let angles = AngleCalculator::get_angles(&skeleton, ExerciseType::Squat);
        assert_eq!(angles.len(), 2);
        assert!((angles.get(keys::LEFT_KNEE).unwrap() - 180.0).abs() < 1.0);
        assert!((angles.get(keys::RIGHT_KNEE).unwrap() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn single_leg_schema_includes_raw_heights() {
        let mut skeleton = Skeleton::default();
        skeleton.set(PoseLandmark::LeftKnee, point(0.4, 0.45));
        skeleton.set(PoseLandmark::RightKnee, point(0.6, 0.7));
        skeleton.set(PoseLandmark::LeftHip, point(0.4, 0.5));
        skeleton.set(PoseLandmark::RightHip, point(0.6, 0.5));
        skeleton.set(PoseLandmark::LeftAnkle, point(0.4, 0.6));
        skeleton.set(PoseLandmark::RightAnkle, point(0.6, 0.9));

        let angles = AngleCalculator::get_angles(&skeleton, ExerciseType::SingleLegStand);
        assert_eq!(angles.len(), 10);
        assert_eq!(angles.get(keys::LEFT_KNEE_Y), Some(0.45));
        assert_eq!(angles.get(keys::RIGHT_HIP_Y), Some(0.5));
        assert!((angles.get(keys::LEFT_FOOT_HEIGHT).unwrap() - (0.6 - 0.7)).abs() < 1e-12);
        assert!((angles.get(keys::RIGHT_FOOT_HEIGHT).unwrap() - (0.9 - 0.45)).abs() < 1e-12);
    }

    #[test]
    fn rounding_keeps_one_decimal() {
        let set = AngleSet::new().with(keys::LEFT_KNEE, 91.26).with(keys::RIGHT_KNEE, 170.04);
        let rounded = set.rounded();
        assert_eq!(rounded.get(keys::LEFT_KNEE), Some(91.3));
        assert_eq!(rounded.get(keys::RIGHT_KNEE), Some(170.0));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn coordinate() -> impl Strategy<Value = f64> {
        -2.0f64..2.0
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: angles stay in [0, 180] and do not depend on ray order.
        #[test]
        fn prop_angle_bounded_and_symmetric(
            ax in coordinate(), ay in coordinate(),
            bx in coordinate(), by in coordinate(),
            cx in coordinate(), cy in coordinate(),
        ) {
            let (a, b, c) = (Landmark::new(ax, ay), Landmark::new(bx, by), Landmark::new(cx, cy));
            let forward = AngleCalculator::calculate_angle(&a, &b, &c);
            let backward = AngleCalculator::calculate_angle(&c, &b, &a);

            prop_assert!(forward.is_finite());
            prop_assert!((0.0..=180.0).contains(&forward));
            prop_assert!((forward - backward).abs() < 1e-9);
        }

        /// Property: collapsed rays never yield NaN or infinity.
        #[test]
        fn prop_degenerate_rays_are_finite(
            bx in coordinate(), by in coordinate(),
            cx in coordinate(), cy in coordinate(),
            jitter in 0.0f64..1e-9,
        ) {
            let b = Landmark::new(bx, by);
            let a = Landmark::new(bx + jitter, by);
            let c = Landmark::new(cx, cy);
            let angle = AngleCalculator::calculate_angle(&a, &b, &c);
            prop_assert!(angle.is_finite());
            prop_assert!((0.0..=180.0).contains(&angle));
        }
    }
}
