//! Calibrated facial measurements and the fat score heuristic.
//!
//! Distances are taken between pairs of landmarks in normalized image
//! units and converted to centimeters with a per-frame [`ScaleFactor`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calibration::ScaleFactor;
use crate::error::{Error, Result};
use crate::landmarks::{LandmarkRole, LandmarkSchema};
use crate::types::LandmarkSet;

/// Weights of the fat score.
///
/// These are empirical, tunable constants. They have no physical
/// derivation and the resulting score is not a clinical measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatScoreWeights {
    /// Weight of the jaw width term
    pub jaw: f32,
    /// Weight of the cheek width term
    pub cheek: f32,
}

impl Default for FatScoreWeights {
    fn default() -> Self {
        Self {
            jaw: 1.5,
            cheek: 1.2,
        }
    }
}

impl FatScoreWeights {
    pub fn validate(&self) -> Result<()> {
        if !(self.jaw.is_finite() && self.cheek.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "fat score weights must be finite, got jaw={} cheek={}",
                self.jaw, self.cheek
            )));
        }
        Ok(())
    }
}

/// Measurements for one face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Distance between the jaw corners
    pub jaw_width_cm: f32,
    /// Distance from chin to forehead
    pub face_height_cm: f32,
    /// Dimensionless, unbounded heuristic
    pub fat_score: f32,
}

impl Metrics {
    /// The fat score as displayed to users (score × 100).
    pub fn fat_value(&self) -> f32 {
        self.fat_score * 100.0
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Face fat value: {:.2} | Jaw width: {:.1} cm | Face height: {:.1} cm",
            self.fat_value(),
            self.jaw_width_cm,
            self.face_height_cm
        )
    }
}

/// Turns a landmark set and a scale into [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasurementExtractor {
    schema: LandmarkSchema,
    weights: FatScoreWeights,
}

impl MeasurementExtractor {
    pub fn new(schema: LandmarkSchema, weights: FatScoreWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { schema, weights })
    }

    pub fn schema(&self) -> &LandmarkSchema {
        &self.schema
    }

    pub fn weights(&self) -> &FatScoreWeights {
        &self.weights
    }

    fn span(&self, landmarks: &LandmarkSet, a: LandmarkRole, b: LandmarkRole) -> Result<f32> {
        let pa = self.schema.point(landmarks, a)?;
        let pb = self.schema.point(landmarks, b)?;
        Ok(pa.distance(&pb))
    }

    /// Compute the metrics for one frame.
    ///
    /// Pure: the same landmarks and scale always give the same result.
    pub fn compute_metrics(&self, landmarks: &LandmarkSet, scale: ScaleFactor) -> Result<Metrics> {
        let jaw = self.span(landmarks, LandmarkRole::JawLeft, LandmarkRole::JawRight)?;
        let height = self.span(landmarks, LandmarkRole::Chin, LandmarkRole::Forehead)?;
        let cheek = self.span(landmarks, LandmarkRole::CheekLeft, LandmarkRole::CheekRight)?;

        if !(height.is_finite() && height > 0.0) {
            return Err(Error::DivisionByZero {
                what: "chin to forehead",
            });
        }
        finite(jaw, "jaw width")?;
        finite(cheek, "cheek width")?;

        let metrics = Metrics {
            jaw_width_cm: finite(scale.to_cm(jaw), "jaw width in cm")?,
            face_height_cm: finite(scale.to_cm(height), "face height in cm")?,
            fat_score: finite(
                (self.weights.jaw * jaw + self.weights.cheek * cheek) / height,
                "fat score",
            )?,
        };
        Ok(metrics)
    }
}

fn finite(value: f32, what: &'static str) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NonFiniteMeasurement { what })
    }
}
