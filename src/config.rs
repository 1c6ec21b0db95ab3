use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::AVERAGE_IPD_CM;
use crate::error::{Error, Result};
use crate::landmarks::LandmarkSchema;
use crate::measurement::FatScoreWeights;
use crate::source::DetectorOptions;
use crate::throttle::DEFAULT_THROTTLE_INTERVAL;

/// Pipeline configuration.
///
/// Every field has a default, so a JSON file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Real-world eye distance used for calibration, in centimeters
    pub calibration_cm: f32,
    /// Minimum time between two published metric updates
    pub throttle_interval_ms: u64,
    pub weights: FatScoreWeights,
    pub detector: DetectorOptions,
    pub schema: LandmarkSchema,
    /// Overlay canvas size in pixels
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calibration_cm: AVERAGE_IPD_CM,
            throttle_interval_ms: DEFAULT_THROTTLE_INTERVAL.as_millis() as u64,
            weights: FatScoreWeights::default(),
            detector: DetectorOptions::default(),
            schema: LandmarkSchema::face_mesh(),
            frame_width: 640,
            frame_height: 480,
        }
    }
}

impl Config {
    /// Load a JSON config file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.calibration_cm.is_finite() && self.calibration_cm > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "calibration_cm must be a positive distance, got {}",
                self.calibration_cm
            )));
        }
        if self.throttle_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "throttle_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(Error::InvalidConfig(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        self.weights.validate()?;
        self.detector.validate()?;
        self.schema.validate(self.detector.landmark_count())
    }
}
