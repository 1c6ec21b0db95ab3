//! Landmark sources.
//!
//! A source yields one [`Frame`] per pull: either the landmarks of the
//! single tracked face, or nothing when no face was found. The detector
//! itself lives outside this crate; recorded detector output can be
//! replayed with [`JsonLinesSource`].

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::landmarks::{FACE_MESH_LANDMARKS, FACE_MESH_REFINED_LANDMARKS};
use crate::throttle::ManualClock;
use crate::types::{LandmarkSet, Point};

/// Settings the external face-mesh detector is expected to run with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_faces: usize,
    /// Iris refinement adds 10 landmarks (478 instead of 468)
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl DetectorOptions {
    /// Number of landmarks the detector emits per face.
    pub fn landmark_count(&self) -> usize {
        if self.refine_landmarks {
            FACE_MESH_REFINED_LANDMARKS
        } else {
            FACE_MESH_LANDMARKS
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_faces != 1 {
            return Err(Error::InvalidConfig(format!(
                "only single-face tracking is supported, got max_faces={}",
                self.max_faces
            )));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// One detector result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// Capture time relative to the start of the stream, when known.
    pub timestamp: Option<Duration>,
    /// `None` when no face was detected.
    pub landmarks: Option<LandmarkSet>,
}

impl Frame {
    pub fn face(landmarks: LandmarkSet) -> Self {
        Self {
            timestamp: None,
            landmarks: Some(landmarks),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn at(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Pull-based landmark stream.
pub trait LandmarkSource {
    /// The next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// In-memory source, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: VecDeque<Frame>,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FromIterator<Frame> for VecSource {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl LandmarkSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Xyz(f32, f32, f32),
    Xy(f32, f32),
    Object(Point),
}

impl From<RawPoint> for Point {
    fn from(raw: RawPoint) -> Self {
        match raw {
            RawPoint::Xyz(x, y, z) => Point::with_depth(x, y, z),
            RawPoint::Xy(x, y) => Point::new(x, y),
            RawPoint::Object(p) => p,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Record {
    Stamped {
        t_ms: u64,
        landmarks: Option<Vec<RawPoint>>,
    },
    Bare(Option<Vec<RawPoint>>),
}

fn landmarks_from(raw: Option<Vec<RawPoint>>) -> Option<LandmarkSet> {
    match raw {
        Some(points) if !points.is_empty() => Some(LandmarkSet::new(
            points.into_iter().map(Point::from).collect(),
        )),
        _ => None,
    }
}

/// Replays detector output recorded as JSON lines.
///
/// Each non-blank line is one frame:
/// - `null` or `[]`: no face
/// - an array of points, each `{"x":..,"y":..,"z":..}`, `[x, y]` or `[x, y, z]`
/// - `{"t_ms": 1234, "landmarks": <either of the above>}` to carry a timestamp
pub struct JsonLinesSource<R> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    fn parse(&self, line: &str) -> Result<Frame> {
        let record: Record = serde_json::from_str(line).map_err(|e| Error::InvalidFrame {
            line: self.line_no,
            reason: e.to_string(),
        })?;

        Ok(match record {
            Record::Stamped { t_ms, landmarks } => Frame {
                timestamp: Some(Duration::from_millis(t_ms)),
                landmarks: landmarks_from(landmarks),
            },
            Record::Bare(landmarks) => Frame {
                timestamp: None,
                landmarks: landmarks_from(landmarks),
            },
        })
    }
}

impl<R: BufRead> LandmarkSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return self.parse(line).map(Some);
        }
    }
}

/// Moves a [`ManualClock`] to each frame's recorded timestamp before
/// handing the frame on, so replays are throttled on recording time.
///
/// Frames without a timestamp advance the clock by the frame step, which
/// is zero unless set with [`ClockedSource::with_frame_step`].
pub struct ClockedSource<S> {
    inner: S,
    clock: ManualClock,
    frame_step: Duration,
    started: bool,
}

impl<S: LandmarkSource> ClockedSource<S> {
    pub fn new(inner: S, clock: ManualClock) -> Self {
        Self {
            inner,
            clock,
            frame_step: Duration::ZERO,
            started: false,
        }
    }

    pub fn with_frame_step(mut self, step: Duration) -> Self {
        self.frame_step = step;
        self
    }
}

impl<S: LandmarkSource> LandmarkSource for ClockedSource<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.next_frame()?;
        match frame.as_ref().map(|f| f.timestamp) {
            Some(Some(t)) => self.clock.set(t),
            // The first frame happens at the clock's current time.
            Some(None) if self.started => self.clock.advance(self.frame_step),
            _ => {}
        }
        if frame.is_some() {
            self.started = true;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source(text: &str) -> JsonLinesSource<Cursor<Vec<u8>>> {
        JsonLinesSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn default_detector_options() {
        let options = DetectorOptions::default();
        assert_eq!(options.max_faces, 1);
        assert!(options.refine_landmarks);
        assert_eq!(options.min_detection_confidence, 0.5);
        assert_eq!(options.min_tracking_confidence, 0.5);
        assert_eq!(options.landmark_count(), 478);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn detector_options_validation() {
        let multi = DetectorOptions {
            max_faces: 2,
            ..Default::default()
        };
        assert!(multi.validate().is_err());

        let bad_confidence = DetectorOptions {
            min_tracking_confidence: 1.5,
            ..Default::default()
        };
        assert!(bad_confidence.validate().is_err());

        let unrefined = DetectorOptions {
            refine_landmarks: false,
            ..Default::default()
        };
        assert_eq!(unrefined.landmark_count(), 468);
    }

    #[test]
    fn vec_source_drains_in_order() {
        let mut src: VecSource = vec![
            Frame::empty(),
            Frame::face(LandmarkSet::new(vec![Point::new(0.1, 0.2)])),
        ]
        .into_iter()
        .collect();

        assert_eq!(src.remaining(), 2);
        assert_eq!(src.next_frame().unwrap(), Some(Frame::empty()));
        assert!(src.next_frame().unwrap().unwrap().landmarks.is_some());
        assert_eq!(src.next_frame().unwrap(), None);
    }

    #[test]
    fn parses_all_point_forms() {
        let mut src = source(
            "[[0.1, 0.2], [0.3, 0.4, -0.05], {\"x\": 0.5, \"y\": 0.6}]\n",
        );
        let frame = src.next_frame().unwrap().unwrap();
        let set = frame.landmarks.unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set[0], Point::new(0.1, 0.2));
        assert_eq!(set[1], Point::with_depth(0.3, 0.4, -0.05));
        assert_eq!(set[2], Point::new(0.5, 0.6));
        assert_eq!(frame.timestamp, None);
    }

    #[test]
    fn empty_records_mean_no_face() {
        let mut src = source("null\n\n[]\n{\"t_ms\": 40, \"landmarks\": null}\n");
        assert_eq!(src.next_frame().unwrap(), Some(Frame::empty()));
        assert_eq!(src.next_frame().unwrap(), Some(Frame::empty()));
        assert_eq!(
            src.next_frame().unwrap(),
            Some(Frame::empty().at(Duration::from_millis(40)))
        );
        assert_eq!(src.next_frame().unwrap(), None);
    }

    #[test]
    fn stamped_record() {
        let mut src = source("{\"t_ms\": 16000, \"landmarks\": [[0.5, 0.5]]}\n");
        let frame = src.next_frame().unwrap().unwrap();
        assert_eq!(frame.timestamp, Some(Duration::from_millis(16_000)));
        assert_eq!(frame.landmarks.unwrap().len(), 1);
    }

    #[test]
    fn clocked_source_follows_timestamps() {
        let clock = ManualClock::new();
        let mut src = ClockedSource::new(
            VecSource::new(vec![
                Frame::empty().at(Duration::from_millis(500)),
                Frame::empty(),
                Frame::empty().at(Duration::from_millis(16_000)),
            ]),
            clock.clone(),
        );

        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(16_000));
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn clocked_source_steps_unstamped_frames() {
        let clock = ManualClock::new();
        let mut src = ClockedSource::new(
            VecSource::new(vec![Frame::empty(); 4]),
            clock.clone(),
        )
        .with_frame_step(Duration::from_millis(40));

        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        src.next_frame().unwrap();
        src.next_frame().unwrap();
        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(120));
        src.next_frame().unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(120));
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let mut src = source("null\n\n{not json}\n");
        assert!(src.next_frame().unwrap().is_some());
        match src.next_frame() {
            Err(Error::InvalidFrame { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected InvalidFrame, got {:?}", other),
        }
    }
}
