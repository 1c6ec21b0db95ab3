//! Per-frame orchestration: calibrate, measure, render, throttle, publish.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibration::CalibrationEngine;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::measurement::{MeasurementExtractor, Metrics};
use crate::overlay::{measurement_lines, Renderer};
use crate::source::LandmarkSource;
use crate::throttle::{Clock, UpdateThrottler};
use crate::types::LandmarkSet;

/// Shared, read-only view of the published metrics.
///
/// Readers always see a whole [`Metrics`] value, never a partial update.
#[derive(Debug, Clone, Default)]
pub struct MetricsHandle {
    inner: Arc<RwLock<Option<Metrics>>>,
}

impl MetricsHandle {
    pub fn get(&self) -> Option<Metrics> {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, value: Option<Metrics>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

/// What happened to one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The detector found no face. Published metrics are unchanged.
    NoFace,
    /// Calibration or measurement failed; the frame was dropped.
    Skipped(Error),
    /// Metrics were computed but the throttle interval has not elapsed.
    Throttled(Metrics),
    /// Metrics were computed and published.
    Published(Metrics),
}

impl FrameOutcome {
    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            FrameOutcome::Throttled(m) | FrameOutcome::Published(m) => Some(m),
            FrameOutcome::NoFace | FrameOutcome::Skipped(_) => None,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, FrameOutcome::Published(_))
    }
}

/// Frame counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub no_face: u64,
    pub skipped: u64,
    pub throttled: u64,
    pub published: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        match outcome {
            FrameOutcome::NoFace => self.no_face += 1,
            FrameOutcome::Skipped(_) => self.skipped += 1,
            FrameOutcome::Throttled(_) => self.throttled += 1,
            FrameOutcome::Published(_) => self.published += 1,
        }
    }
}

/// Runs the measurement pipeline over a stream of detector results.
///
/// Frames must be fed one at a time; the coordinator owns the throttle
/// state and is the only writer of the published metrics.
pub struct PipelineCoordinator<R, C> {
    calibration: CalibrationEngine,
    extractor: MeasurementExtractor,
    throttler: UpdateThrottler,
    renderer: R,
    clock: C,
    published: MetricsHandle,
}

impl<R: Renderer, C: Clock> PipelineCoordinator<R, C> {
    pub fn new(config: &Config, renderer: R, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calibration: CalibrationEngine::new(config.calibration_cm, config.schema)?,
            extractor: MeasurementExtractor::new(config.schema, config.weights)?,
            throttler: UpdateThrottler::new(config.throttle_interval())?,
            renderer,
            clock,
            published: MetricsHandle::default(),
        })
    }

    /// Handle for consumers that read the published metrics.
    pub fn handle(&self) -> MetricsHandle {
        self.published.clone()
    }

    pub fn published(&self) -> Option<Metrics> {
        self.published.get()
    }

    pub fn throttler(&self) -> &UpdateThrottler {
        &self.throttler
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Forget all published state, as on a pipeline restart.
    pub fn reset(&mut self) {
        self.throttler.reset();
        self.published.set(None);
    }

    fn measure(&self, landmarks: &LandmarkSet) -> Result<Metrics> {
        self.extractor.schema().require(landmarks)?;
        let scale = self.calibration.compute_scale(landmarks)?;
        self.extractor.compute_metrics(landmarks, scale)
    }

    /// Process the detector result for one frame.
    pub fn process_frame(&mut self, landmarks: Option<&LandmarkSet>) -> FrameOutcome {
        let Some(landmarks) = landmarks else {
            return FrameOutcome::NoFace;
        };

        let metrics = match self.measure(landmarks) {
            Ok(m) => m,
            Err(e) => {
                warn!("Skipping frame: {}", e);
                // The mesh is still shown, just without measurement lines.
                self.renderer.render(landmarks, &[]);
                return FrameOutcome::Skipped(e);
            }
        };

        match measurement_lines(self.extractor.schema(), landmarks, &metrics) {
            Ok(lines) => self.renderer.render(landmarks, &lines),
            Err(e) => warn!("Cannot build overlay lines: {}", e),
        }

        debug!(
            jaw_width_cm = metrics.jaw_width_cm,
            face_height_cm = metrics.face_height_cm,
            fat_score = metrics.fat_score,
            "Measured frame"
        );

        if self.throttler.offer(metrics, self.clock.now()) {
            self.published.set(Some(metrics));
            info!("Published: {}", metrics);
            FrameOutcome::Published(metrics)
        } else {
            FrameOutcome::Throttled(metrics)
        }
    }

    /// Drain `source`, calling `on_frame` after every frame.
    ///
    /// Per-frame measurement errors are absorbed; errors from the source
    /// itself end the run.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<RunSummary>
    where
        S: LandmarkSource,
        F: FnMut(&FrameOutcome),
    {
        let mut summary = RunSummary::default();

        while let Some(frame) = source.next_frame()? {
            let outcome = self.process_frame(frame.landmarks.as_ref());
            summary.record(&outcome);
            on_frame(&outcome);
        }

        info!(
            frames = summary.frames,
            published = summary.published,
            skipped = summary.skipped,
            "Landmark stream finished"
        );
        Ok(summary)
    }
}
