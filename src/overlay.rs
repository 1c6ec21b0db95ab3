//! Measurement overlay: line descriptors and a simple RGBA rasterizer.
//!
//! The overlay is refreshed on every frame from the unthrottled metrics;
//! only the published summary is rate limited.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::Result;
use crate::landmarks::{LandmarkRole, LandmarkSchema};
use crate::measurement::Metrics;
use crate::types::{LandmarkSet, Point};

pub const JAW_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const HEIGHT_COLOR: Rgba<u8> = Rgba([128, 0, 128, 255]);
pub const MESH_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Label offset above the line midpoint, in pixels.
const LABEL_OFFSET_PX: i32 = 10;
const MESH_DOT_RADIUS: i32 = 1;

/// A labelled segment between two landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementLine {
    pub a: Point,
    pub b: Point,
    pub label: String,
    pub color: Rgba<u8>,
}

/// Build the jaw-width and face-height lines for a frame.
pub fn measurement_lines(
    schema: &LandmarkSchema,
    landmarks: &LandmarkSet,
    metrics: &Metrics,
) -> Result<Vec<MeasurementLine>> {
    Ok(vec![
        MeasurementLine {
            a: schema.point(landmarks, LandmarkRole::JawLeft)?,
            b: schema.point(landmarks, LandmarkRole::JawRight)?,
            label: format!("Jaw: {:.1} cm", metrics.jaw_width_cm),
            color: JAW_COLOR,
        },
        MeasurementLine {
            a: schema.point(landmarks, LandmarkRole::Forehead)?,
            b: schema.point(landmarks, LandmarkRole::Chin)?,
            label: format!("Height: {:.1} cm", metrics.face_height_cm),
            color: HEIGHT_COLOR,
        },
    ])
}

/// Display sink for per-frame geometry.
pub trait Renderer {
    fn render(&mut self, landmarks: &LandmarkSet, lines: &[MeasurementLine]);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _landmarks: &LandmarkSet, _lines: &[MeasurementLine]) {}
}

/// Where a line's label goes on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub color: Rgba<u8>,
}

/// Rasterizes the landmark mesh and measurement lines onto an RGBA canvas.
///
/// Text is not drawn; label positions are exposed through
/// [`ImageOverlay::labels`] for a caller with a font renderer.
pub struct ImageOverlay {
    canvas: RgbaImage,
    labels: Vec<LabelPlacement>,
    frames_rendered: u64,
}

impl ImageOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            labels: Vec::new(),
            frames_rendered: 0,
        }
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn labels(&self) -> &[LabelPlacement] {
        &self.labels
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.canvas.save(path)?;
        Ok(())
    }

    /// Map a normalized point to canvas pixels.
    ///
    /// Coordinates are clamped to one canvas size beyond each edge. NaN maps
    /// off the canvas.
    fn to_pixel(&self, p: &Point) -> (i32, i32) {
        let (w, h) = self.canvas.dimensions();
        (pixel_coord(p.x, w), pixel_coord(p.y, h))
    }
}

fn pixel_coord(normalized: f32, extent: u32) -> i32 {
    let extent = extent as f32;
    if normalized.is_nan() {
        return -(extent as i32) - 1;
    }
    (normalized * extent).round().clamp(-extent, 2.0 * extent) as i32
}

impl Renderer for ImageOverlay {
    fn render(&mut self, landmarks: &LandmarkSet, lines: &[MeasurementLine]) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 255]);
        }
        self.labels.clear();

        for p in &landmarks.points {
            let (x, y) = self.to_pixel(p);
            draw_dot(&mut self.canvas, x, y, MESH_DOT_RADIUS, MESH_COLOR);
        }

        for line in lines {
            let (x0, y0) = self.to_pixel(&line.a);
            let (x1, y1) = self.to_pixel(&line.b);
            draw_segment(&mut self.canvas, (x0, y0), (x1, y1), line.color);

            let (mx, my) = self.to_pixel(&line.a.midpoint(&line.b));
            self.labels.push(LabelPlacement {
                x: mx,
                y: my - LABEL_OFFSET_PX,
                text: line.label.clone(),
                color: line.color,
            });
        }

        self.frames_rendered += 1;
    }
}

/// Set one pixel, ignoring anything outside the canvas.
fn plot(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
        if x < img.width() && y < img.height() {
            img.put_pixel(x, y, color);
        }
    }
}

/// Filled disk for a mesh landmark.
fn draw_dot(img: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    let (cx, cy, r) = (i64::from(cx), i64::from(cy), i64::from(radius));
    for y in cy - r..=cy + r {
        for x in cx - r..=cx + r {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r * r {
                plot(img, x, y, color);
            }
        }
    }
}

/// Bresenham segment between two pixel positions, clipped to the canvas.
///
/// Runs in `i64` so the error term cannot overflow for any `i32` endpoints.
fn draw_segment(img: &mut RgbaImage, from: (i32, i32), to: (i32, i32), color: Rgba<u8>) {
    let (mut x, mut y) = (i64::from(from.0), i64::from(from.1));
    let (x1, y1) = (i64::from(to.0), i64::from(to.1));

    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let step_x = if x < x1 { 1 } else { -1 };
    let step_y = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let doubled = 2 * err;
        if doubled >= dy {
            err += dy;
            x += step_x;
        }
        if doubled <= dx {
            err += dx;
            y += step_y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> LandmarkSet {
        let schema = LandmarkSchema::face_mesh();
        let mut points = vec![Point::new(0.5, 0.5); schema.max_index() + 1];
        points[schema.jaw_left] = Point::new(0.25, 0.5);
        points[schema.jaw_right] = Point::new(0.75, 0.5);
        points[schema.forehead] = Point::new(0.5, 0.25);
        points[schema.chin] = Point::new(0.5, 0.75);
        LandmarkSet::new(points)
    }

    fn metrics() -> Metrics {
        Metrics {
            jaw_width_cm: 18.94,
            face_height_cm: 25.21,
            fat_score: 1.875,
        }
    }

    #[test]
    fn lines_carry_labels_and_colors() {
        let lines = measurement_lines(&LandmarkSchema::face_mesh(), &face(), &metrics()).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].label, "Jaw: 18.9 cm");
        assert_eq!(lines[0].color, JAW_COLOR);
        assert_eq!(lines[0].a, Point::new(0.25, 0.5));
        assert_eq!(lines[1].label, "Height: 25.2 cm");
        assert_eq!(lines[1].color, HEIGHT_COLOR);
        assert_eq!(lines[1].b, Point::new(0.5, 0.75));
    }

    #[test]
    fn lines_need_landmarks() {
        let short = LandmarkSet::new(vec![Point::new(0.5, 0.5); 10]);
        assert!(measurement_lines(&LandmarkSchema::face_mesh(), &short, &metrics()).is_err());
    }

    #[test]
    fn rasterizes_lines_and_labels() {
        let face = face();
        let lines = measurement_lines(&LandmarkSchema::face_mesh(), &face, &metrics()).unwrap();
        let mut overlay = ImageOverlay::new(100, 100);
        overlay.render(&face, &lines);

        // Jaw line runs horizontally through y=50 from x=25 to x=75.
        assert_eq!(*overlay.canvas().get_pixel(30, 50), JAW_COLOR);
        // Height line runs vertically through x=50 from y=25 to y=75.
        assert_eq!(*overlay.canvas().get_pixel(50, 30), HEIGHT_COLOR);
        // Background stays untouched away from the geometry.
        assert_eq!(*overlay.canvas().get_pixel(5, 95), Rgba([0, 0, 0, 255]));

        let labels = overlay.labels();
        assert_eq!(labels.len(), 2);
        assert_eq!((labels[0].x, labels[0].y), (50, 40));
        assert_eq!(labels[0].text, "Jaw: 18.9 cm");
        assert_eq!(overlay.frames_rendered(), 1);
    }

    #[test]
    fn off_canvas_points_are_clipped() {
        let mut img = RgbaImage::new(10, 10);
        draw_segment(&mut img, (-5, -5), (20, 20), JAW_COLOR);
        draw_dot(&mut img, 12, 12, 3, MESH_COLOR);
        assert_eq!(*img.get_pixel(5, 5), JAW_COLOR);
        assert_eq!(*img.get_pixel(9, 9), MESH_COLOR);
    }

    #[test]
    fn extreme_endpoints_do_not_overflow() {
        let mut img = RgbaImage::new(4, 4);
        draw_dot(&mut img, i32::MIN, i32::MAX, 1, MESH_COLOR);
        draw_segment(&mut img, (i32::MIN, 2), (i32::MIN + 3, 2), JAW_COLOR);
        assert!(img.pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn far_landmarks_are_clamped_near_the_canvas() {
        let overlay = ImageOverlay::new(100, 50);
        assert_eq!(overlay.to_pixel(&Point::new(-1e7, 0.5)), (-100, 25));
        assert_eq!(overlay.to_pixel(&Point::new(f32::INFINITY, 1e9)), (200, 100));
        assert_eq!(overlay.to_pixel(&Point::new(f32::NAN, 0.0)), (-101, 0));
    }

    #[test]
    fn renders_frame_with_landmark_far_off_canvas() {
        let schema = LandmarkSchema::face_mesh();
        let mut face = face();
        face.points[schema.jaw_left] = Point::new(-1e7, 0.5);
        face.points[0] = Point::new(f32::NAN, f32::INFINITY);
        let lines = measurement_lines(&schema, &face, &metrics()).unwrap();

        let mut overlay = ImageOverlay::new(100, 100);
        overlay.render(&face, &lines);

        // The jaw line is cut at the left edge and still ends at x=75.
        assert_eq!(*overlay.canvas().get_pixel(0, 50), JAW_COLOR);
        assert_eq!(*overlay.canvas().get_pixel(74, 50), JAW_COLOR);
        assert_eq!(overlay.frames_rendered(), 1);
    }
}
