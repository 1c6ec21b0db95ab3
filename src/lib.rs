//! # face-measure
//!
//! Calibrated facial measurements from face-mesh landmarks.
//!
//! This crate provides:
//! - **Calibration**: converts normalized landmark distances to centimeters
//!   using the average adult interpupillary distance (6.3 cm) as reference
//! - **Measurements**: jaw width, face height and a heuristic fat score
//! - **Throttling**: publishes metrics at most once per interval (15 s by default)
//! - **Pipeline**: per-frame orchestration with a per-frame overlay and a
//!   shared, rate-limited metrics snapshot
//!
//! Landmark detection itself is external. Results are fed in one frame at
//! a time, either directly or through a [`LandmarkSource`].
//!
//! ## Algorithm Overview
//!
//! For each frame with a face:
//! 1. scale = reference IPD ÷ distance(left eye, right eye)
//! 2. jaw width = distance(jaw left, jaw right) × scale
//! 3. face height = distance(chin, forehead) × scale
//! 4. fat score = (1.5 × jaw + 1.2 × cheek) ÷ height, in normalized units
//! 5. publish if the throttle interval has elapsed since the last publication
//!
//! The fat score weights are empirical and tunable; the score is not a
//! clinical measure.
//!
//! ## Quick Start
//!
//! ```rust
//! use face_measure::{
//!     Config, FrameOutcome, LandmarkSchema, LandmarkSet, ManualClock, NullRenderer,
//!     PipelineCoordinator, Point,
//! };
//!
//! let schema = LandmarkSchema::face_mesh();
//! let mut points = vec![Point::new(0.5, 0.5); 478];
//! points[schema.left_eye] = Point::new(0.45, 0.4);
//! points[schema.right_eye] = Point::new(0.55, 0.4);
//! points[schema.jaw_left] = Point::new(0.35, 0.55);
//! points[schema.jaw_right] = Point::new(0.65, 0.55);
//! points[schema.forehead] = Point::new(0.5, 0.2);
//! points[schema.chin] = Point::new(0.5, 0.6);
//! points[schema.cheek_left] = Point::new(0.375, 0.5);
//! points[schema.cheek_right] = Point::new(0.625, 0.5);
//! let face = LandmarkSet::new(points);
//!
//! let mut pipeline =
//!     PipelineCoordinator::new(&Config::default(), NullRenderer, ManualClock::new()).unwrap();
//!
//! if let FrameOutcome::Published(metrics) = pipeline.process_frame(Some(&face)) {
//!     assert!((metrics.jaw_width_cm - 18.9).abs() < 1e-3);
//!     println!("{}", metrics);
//! }
//! ```

mod calibration;
mod config;
mod error;
mod landmarks;
mod measurement;
mod overlay;
mod pipeline;
mod source;
mod throttle;
mod types;

pub use calibration::{CalibrationEngine, ScaleFactor, AVERAGE_IPD_CM};
pub use config::Config;
pub use error::{Error, Result};
pub use landmarks::{
    LandmarkRole, LandmarkSchema, FACE_MESH_LANDMARKS, FACE_MESH_REFINED_LANDMARKS,
};
pub use measurement::{FatScoreWeights, MeasurementExtractor, Metrics};
pub use overlay::{
    measurement_lines, ImageOverlay, LabelPlacement, MeasurementLine, NullRenderer, Renderer,
    HEIGHT_COLOR, JAW_COLOR, MESH_COLOR,
};
pub use pipeline::{FrameOutcome, MetricsHandle, PipelineCoordinator, RunSummary};
pub use source::{ClockedSource, DetectorOptions, Frame, JsonLinesSource, LandmarkSource, VecSource};
pub use throttle::{
    Clock, ManualClock, SystemClock, ThrottlePhase, ThrottleState, UpdateThrottler,
    DEFAULT_THROTTLE_INTERVAL,
};
pub use types::{LandmarkSet, Point};
