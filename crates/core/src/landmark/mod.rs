use serde::{Deserialize, Serialize};

use crate::{MotionError, Result};

/// Number of joints in the full-body skeleton produced by the pose estimator.
pub const SKELETON_SIZE: usize = 33;

/// Fixed joint identifiers of the 33-point skeleton. Discriminants match the
/// indices used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    /// Index of the joint inside a [`Skeleton`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A single tracked joint. Coordinates are normalised to the frame and
/// `visibility` is the estimator's confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: 1.0,
        }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Wire representation of one landmark, tagged with its joint id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkEntry {
    pub id: usize,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

impl From<LandmarkEntry> for Landmark {
    fn from(entry: LandmarkEntry) -> Self {
        Self {
            x: entry.x,
            y: entry.y,
            z: entry.z,
            visibility: entry.visibility,
        }
    }
}

/// Complete set of joints for one frame, indexed by [`PoseLandmark`].
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    points: [Landmark; SKELETON_SIZE],
}

impl Skeleton {
    /// Decodes wire entries into a skeleton. Every joint id must appear,
    /// coordinates must be finite, and later duplicates overwrite earlier
    /// ones.
    pub fn from_entries(entries: &[LandmarkEntry]) -> Result<Self> {
        let mut points = [Landmark::default(); SKELETON_SIZE];
        let mut seen = [false; SKELETON_SIZE];

        for entry in entries {
            if entry.id >= SKELETON_SIZE {
                return Err(MotionError::MalformedFrame(format!(
                    "landmark id {} is outside the {SKELETON_SIZE}-point skeleton",
                    entry.id
                )));
            }
            let point = Landmark::from(*entry);
            if !point.is_finite() {
                return Err(MotionError::MalformedFrame(format!(
                    "landmark {} has non-finite coordinates",
                    entry.id
                )));
            }
            points[entry.id] = point;
            seen[entry.id] = true;
        }

        if let Some(missing) = seen.iter().position(|present| !present) {
            return Err(MotionError::MalformedFrame(format!(
                "landmark {missing} is missing"
            )));
        }

        Ok(Self { points })
    }

    pub fn get(&self, joint: PoseLandmark) -> &Landmark {
        &self.points[joint.index()]
    }

    pub fn set(&mut self, joint: PoseLandmark, landmark: Landmark) {
        self.points[joint.index()] = landmark;
    }

    /// Re-encodes the skeleton as wire entries.
    pub fn to_entries(&self) -> Vec<LandmarkEntry> {
        self.points
            .iter()
            .enumerate()
            .map(|(id, point)| LandmarkEntry {
                id,
                x: point.x,
                y: point.y,
                z: point.z,
                visibility: point.visibility,
            })
            .collect()
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            points: [Landmark::default(); SKELETON_SIZE],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entries() -> Vec<LandmarkEntry> {
        (0..SKELETON_SIZE)
            .map(|id| LandmarkEntry {
                id,
                x: id as f64 / 100.0,
                y: 0.5,
                z: 0.0,
                visibility: 0.9,
            })
            .collect()
    }

    #[test]
    fn decodes_complete_entry_list() {
        let skeleton = Skeleton::from_entries(&full_entries()).unwrap();
        assert!((skeleton.get(PoseLandmark::LeftKnee).x - 0.25).abs() < 1e-12);
        assert_eq!(skeleton.to_entries().len(), SKELETON_SIZE);
    }

    #[test]
    fn rejects_missing_joint() {
        let mut entries = full_entries();
        entries.retain(|entry| entry.id != PoseLandmark::RightAnkle.index());

        let err = Skeleton::from_entries(&entries).unwrap_err();
        assert!(matches!(err, MotionError::MalformedFrame(_)));
        assert!(format!("{err}").contains("28"));
    }

    #[test]
    fn rejects_out_of_range_and_non_finite_points() {
        let mut entries = full_entries();
        entries.push(LandmarkEntry {
            id: 40,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            visibility: 1.0,
        });
        assert!(Skeleton::from_entries(&entries).is_err());

        let mut entries = full_entries();
        entries[3].y = f64::NAN;
        assert!(Skeleton::from_entries(&entries).is_err());
    }
}
