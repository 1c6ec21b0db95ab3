use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Overlay image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Degenerate calibration: eye distance {distance} cannot produce a finite positive scale")]
    DegenerateCalibration { distance: f32 },

    #[error("Missing landmarks: index {index} requested from a set of {len} points")]
    MissingLandmarks { index: usize, len: usize },

    #[error("Division by zero: {what} distance is zero")]
    DivisionByZero { what: &'static str },

    #[error("Non-finite measurement: {what}")]
    NonFiniteMeasurement { what: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame record on line {line}: {reason}")]
    InvalidFrame { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
