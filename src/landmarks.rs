//! Semantic landmark roles and their canonical detector indices.
//!
//! The defaults follow the MediaPipe Face Mesh numbering (468 points, or
//! 478 when iris refinement is enabled).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{LandmarkSet, Point};

/// Landmark count of the face mesh without iris refinement.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Landmark count of the face mesh with iris refinement.
pub const FACE_MESH_REFINED_LANDMARKS: usize = 478;

/// Landmark roles the measurement pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRole {
    LeftEye,
    RightEye,
    JawLeft,
    JawRight,
    Chin,
    Forehead,
    CheekLeft,
    CheekRight,
}

impl LandmarkRole {
    pub const ALL: [LandmarkRole; 8] = [
        LandmarkRole::LeftEye,
        LandmarkRole::RightEye,
        LandmarkRole::JawLeft,
        LandmarkRole::JawRight,
        LandmarkRole::Chin,
        LandmarkRole::Forehead,
        LandmarkRole::CheekLeft,
        LandmarkRole::CheekRight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LandmarkRole::LeftEye => "left_eye",
            LandmarkRole::RightEye => "right_eye",
            LandmarkRole::JawLeft => "jaw_left",
            LandmarkRole::JawRight => "jaw_right",
            LandmarkRole::Chin => "chin",
            LandmarkRole::Forehead => "forehead",
            LandmarkRole::CheekLeft => "cheek_left",
            LandmarkRole::CheekRight => "cheek_right",
        }
    }
}

/// Mapping from each [`LandmarkRole`] to a canonical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSchema {
    /// Outer corner of the left eye (calibration anchor)
    pub left_eye: usize,
    /// Outer corner of the right eye (calibration anchor)
    pub right_eye: usize,
    pub jaw_left: usize,
    pub jaw_right: usize,
    pub chin: usize,
    pub forehead: usize,
    pub cheek_left: usize,
    pub cheek_right: usize,
}

impl Default for LandmarkSchema {
    fn default() -> Self {
        Self::face_mesh()
    }
}

impl LandmarkSchema {
    /// MediaPipe Face Mesh indices.
    pub const fn face_mesh() -> Self {
        Self {
            left_eye: 33,
            right_eye: 263,
            jaw_left: 234,
            jaw_right: 454,
            chin: 152,
            forehead: 10,
            cheek_left: 50,
            cheek_right: 280,
        }
    }

    pub fn index(&self, role: LandmarkRole) -> usize {
        match role {
            LandmarkRole::LeftEye => self.left_eye,
            LandmarkRole::RightEye => self.right_eye,
            LandmarkRole::JawLeft => self.jaw_left,
            LandmarkRole::JawRight => self.jaw_right,
            LandmarkRole::Chin => self.chin,
            LandmarkRole::Forehead => self.forehead,
            LandmarkRole::CheekLeft => self.cheek_left,
            LandmarkRole::CheekRight => self.cheek_right,
        }
    }

    /// Largest index the schema references.
    pub fn max_index(&self) -> usize {
        LandmarkRole::ALL
            .iter()
            .map(|role| self.index(*role))
            .max()
            .unwrap_or(0)
    }

    /// Check the schema against a detector that emits `landmark_count` points.
    pub fn validate(&self, landmark_count: usize) -> Result<()> {
        for role in LandmarkRole::ALL {
            let index = self.index(role);
            if index >= landmark_count {
                return Err(Error::InvalidConfig(format!(
                    "landmark role {} maps to index {} but the detector emits {} points",
                    role.name(),
                    index,
                    landmark_count
                )));
            }
        }
        Ok(())
    }

    /// Look up the point for `role`.
    pub fn point(&self, landmarks: &LandmarkSet, role: LandmarkRole) -> Result<Point> {
        landmarks.get(self.index(role))
    }

    /// Fail with [`Error::MissingLandmarks`] unless every role is present.
    pub fn require(&self, landmarks: &LandmarkSet) -> Result<()> {
        let needed = self.max_index();
        landmarks.get(needed).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_mesh_indices() {
        let schema = LandmarkSchema::face_mesh();
        assert_eq!(schema.index(LandmarkRole::LeftEye), 33);
        assert_eq!(schema.index(LandmarkRole::RightEye), 263);
        assert_eq!(schema.index(LandmarkRole::JawLeft), 234);
        assert_eq!(schema.index(LandmarkRole::JawRight), 454);
        assert_eq!(schema.index(LandmarkRole::Chin), 152);
        assert_eq!(schema.index(LandmarkRole::Forehead), 10);
        assert_eq!(schema.index(LandmarkRole::CheekLeft), 50);
        assert_eq!(schema.index(LandmarkRole::CheekRight), 280);
        assert_eq!(schema.max_index(), 454);
    }

    #[test]
    fn validates_against_detector_count() {
        let schema = LandmarkSchema::face_mesh();
        assert!(schema.validate(FACE_MESH_LANDMARKS).is_ok());
        assert!(schema.validate(FACE_MESH_REFINED_LANDMARKS).is_ok());
        assert!(matches!(schema.validate(68), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn require_rejects_truncated_set() {
        let schema = LandmarkSchema::face_mesh();
        let short = LandmarkSet::new(vec![Point::default(); 300]);
        match schema.require(&short) {
            Err(Error::MissingLandmarks { index, len }) => {
                assert_eq!(index, 454);
                assert_eq!(len, 300);
            }
            other => panic!("expected MissingLandmarks, got {:?}", other),
        }

        let full = LandmarkSet::new(vec![Point::default(); FACE_MESH_LANDMARKS]);
        assert!(schema.require(&full).is_ok());
    }

    #[test]
    fn partial_schema_json_keeps_defaults() {
        let schema: LandmarkSchema = serde_json::from_str(r#"{"chin": 200}"#).unwrap();
        assert_eq!(schema.chin, 200);
        assert_eq!(schema.left_eye, 33);
    }
}
