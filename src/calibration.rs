//! Pixel-to-centimeter calibration from the interpupillary distance.
//!
//! The distance between the two eye landmarks is compared against an
//! anthropometric reference (the adult average IPD) to get a per-frame
//! conversion factor. The factor is only valid for the frame it was
//! computed from: the subject may move closer or turn between frames.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::landmarks::{LandmarkRole, LandmarkSchema};
use crate::types::LandmarkSet;

/// Average adult interpupillary distance in centimeters.
pub const AVERAGE_IPD_CM: f32 = 6.3;

/// Centimeters per normalized image unit. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ScaleFactor(f32);

impl ScaleFactor {
    /// Returns `None` unless `cm_per_unit` is finite and greater than zero.
    pub fn new(cm_per_unit: f32) -> Option<Self> {
        if cm_per_unit.is_finite() && cm_per_unit > 0.0 {
            Some(Self(cm_per_unit))
        } else {
            None
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Convert a normalized distance to centimeters.
    pub fn to_cm(&self, normalized: f32) -> f32 {
        normalized * self.0
    }
}

/// Derives a [`ScaleFactor`] from the eye landmarks of a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEngine {
    reference_cm: f32,
    schema: LandmarkSchema,
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self {
            reference_cm: AVERAGE_IPD_CM,
            schema: LandmarkSchema::face_mesh(),
        }
    }
}

impl CalibrationEngine {
    pub fn new(reference_cm: f32, schema: LandmarkSchema) -> Result<Self> {
        if !(reference_cm.is_finite() && reference_cm > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "calibration reference must be a positive distance, got {}",
                reference_cm
            )));
        }
        Ok(Self {
            reference_cm,
            schema,
        })
    }

    pub fn reference_cm(&self) -> f32 {
        self.reference_cm
    }

    /// Eye-to-eye distance in normalized units.
    pub fn eye_distance(&self, landmarks: &LandmarkSet) -> Result<f32> {
        let left = self.schema.point(landmarks, LandmarkRole::LeftEye)?;
        let right = self.schema.point(landmarks, LandmarkRole::RightEye)?;
        Ok(left.distance(&right))
    }

    /// Compute the scale for this frame: reference ÷ eye distance.
    ///
    /// Coincident or corrupt eye points fail with
    /// [`Error::DegenerateCalibration`] rather than yielding an infinite
    /// or NaN scale.
    pub fn compute_scale(&self, landmarks: &LandmarkSet) -> Result<ScaleFactor> {
        let distance = self.eye_distance(landmarks)?;
        if !(distance.is_finite() && distance > 0.0) {
            return Err(Error::DegenerateCalibration { distance });
        }

        ScaleFactor::new(self.reference_cm / distance)
            .ok_or(Error::DegenerateCalibration { distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn face_with_eyes(left: Point, right: Point) -> LandmarkSet {
        let schema = LandmarkSchema::face_mesh();
        let mut points = vec![Point::new(0.5, 0.5); schema.max_index() + 1];
        points[schema.left_eye] = left;
        points[schema.right_eye] = right;
        LandmarkSet::new(points)
    }

    #[test]
    fn scale_is_reference_over_eye_distance() {
        let engine = CalibrationEngine::default();
        let left = Point::new(0.45, 0.4);
        let right = Point::new(0.55, 0.4);
        let face = face_with_eyes(left, right);

        let scale = engine.compute_scale(&face).unwrap();
        assert_eq!(scale.value(), AVERAGE_IPD_CM / left.distance(&right));
        assert!((scale.value() - 63.0).abs() < 1e-3);
    }

    #[test]
    fn coincident_eyes_are_degenerate() {
        let engine = CalibrationEngine::default();
        let eye = Point::new(0.5, 0.4);
        let face = face_with_eyes(eye, eye);

        match engine.compute_scale(&face) {
            Err(Error::DegenerateCalibration { distance }) => assert_eq!(distance, 0.0),
            other => panic!("expected DegenerateCalibration, got {:?}", other),
        }
    }

    #[test]
    fn nan_eye_point_is_degenerate() {
        let engine = CalibrationEngine::default();
        let face = face_with_eyes(Point::new(f32::NAN, 0.4), Point::new(0.55, 0.4));
        assert!(matches!(
            engine.compute_scale(&face),
            Err(Error::DegenerateCalibration { .. })
        ));
    }

    #[test]
    fn vanishing_distance_is_degenerate() {
        let engine = CalibrationEngine::default();
        let face = face_with_eyes(Point::new(0.0, 0.0), Point::new(1e-40, 0.0));
        assert!(matches!(
            engine.compute_scale(&face),
            Err(Error::DegenerateCalibration { .. })
        ));
    }

    #[test]
    fn missing_eye_landmark() {
        let engine = CalibrationEngine::default();
        let face = LandmarkSet::new(vec![Point::new(0.5, 0.5); 100]);
        assert!(matches!(
            engine.compute_scale(&face),
            Err(Error::MissingLandmarks { index: 263, len: 100 })
        ));
    }

    #[test]
    fn rejects_non_positive_reference() {
        let schema = LandmarkSchema::face_mesh();
        assert!(CalibrationEngine::new(0.0, schema).is_err());
        assert!(CalibrationEngine::new(-6.3, schema).is_err());
        assert!(CalibrationEngine::new(f32::NAN, schema).is_err());
        assert!(CalibrationEngine::new(6.5, schema).is_ok());
    }

    #[test]
    fn scale_factor_domain() {
        assert!(ScaleFactor::new(0.0).is_none());
        assert!(ScaleFactor::new(-1.0).is_none());
        assert!(ScaleFactor::new(f32::INFINITY).is_none());
        assert!((ScaleFactor::new(63.0).unwrap().to_cm(0.3) - 18.9).abs() < 1e-4);
    }
}
