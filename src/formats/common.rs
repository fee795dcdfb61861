//! Shared coordinate handling for the annotation codecs.
//!
//! All three formats persist integer (or integer-derived) coordinates and
//! share one quirk kept for compatibility with downstream training tools:
//! coordinates that would fall below 1 are clamped up to 1 before being
//! written, so no saved box ever carries a zero-valued edge. The clamp
//! applies to minima (and to every coordinate of lines and points); maxima
//! are written as-is.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Metadata describing the annotated image, as the codecs need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Name of the folder the image lives in.
    pub folder: String,
    /// Image file name, extension included.
    pub filename: String,
    /// Full path to the image, when known.
    pub path: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Color depth (channel count); 1 when unknown.
    pub depth: u32,
}

impl ImageMeta {
    pub fn new(folder: impl Into<String>, filename: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            folder: folder.into(),
            filename: filename.into(),
            path: None,
            width,
            height,
            depth: 1,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Image file name without its extension.
    pub fn base_name(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(base, _)| base)
            .unwrap_or(&self.filename)
    }
}

/// Integer-truncate a coordinate and clamp it to the ≥1 floor.
pub fn clamp_min1(v: f32) -> i32 {
    (v as i32).max(1)
}

/// Integer bounding box `(xmin, ymin, xmax, ymax)` of a point list, with
/// the minima clamped to ≥1.
pub fn points_to_bbox(points: &[Point]) -> (i32, i32, i32, i32) {
    let mut x_min = f32::INFINITY;
    let mut y_min = f32::INFINITY;
    let mut x_max = f32::NEG_INFINITY;
    let mut y_max = f32::NEG_INFINITY;
    for p in points {
        x_min = x_min.min(p.x);
        y_min = y_min.min(p.y);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
    }
    if x_min < 1.0 {
        x_min = 1.0;
    }
    if y_min < 1.0 {
        y_min = 1.0;
    }
    (x_min as i32, y_min as i32, x_max as i32, y_max as i32)
}

/// Polygon/linestrip vertices as clamped integer pairs.
pub fn polygon_points(points: &[Point]) -> Vec<[i32; 2]> {
    points
        .iter()
        .map(|p| [clamp_min1(p.x), clamp_min1(p.y)])
        .collect()
}

/// Circle as the six points the XML dialect stores: center, rim, then the
/// four extremal points of the bounding square (left, top, right, bottom),
/// which exist solely for border-contact detection. Only the derived
/// minima are clamped.
pub fn circle_points(points: &[Point]) -> Vec<[i32; 2]> {
    let (c, rim) = (points[0], points[1]);
    let x1 = c.x as i32;
    let y1 = c.y as i32;
    let x2 = rim.x as i32;
    let y2 = rim.y as i32;
    let r = c.distance_to(rim) as i32;
    let x_min = (x1 - r).max(1);
    let y_min = (y1 - r).max(1);
    let x_max = x1 + r;
    let y_max = y1 + r;
    vec![
        [x1, y1],
        [x2, y2],
        [x_min, y1],
        [x1, y_min],
        [x_max, y1],
        [x1, y_max],
    ]
}

/// Line endpoints, every coordinate clamped.
pub fn line_points(points: &[Point]) -> Vec<[i32; 2]> {
    vec![
        [clamp_min1(points[0].x), clamp_min1(points[0].y)],
        [clamp_min1(points[1].x), clamp_min1(points[1].y)],
    ]
}

/// Single point marker, clamped.
pub fn point_points(points: &[Point]) -> Vec<[i32; 2]> {
    vec![[clamp_min1(points[0].x), clamp_min1(points[0].y)]]
}

/// Rectangle corners in clockwise order starting top-left, as the readers
/// reconstruct them from a bounding box.
pub fn rect_corners(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Vec<Point> {
    vec![
        Point::new(x_min, y_min),
        Point::new(x_max, y_min),
        Point::new(x_max, y_max),
        Point::new(x_min, y_max),
    ]
}

/// Convert an integer bounding box to the normalized YOLO tuple
/// `(x_center, y_center, width, height)`.
pub fn bbox_to_yolo(
    bbox: (i32, i32, i32, i32),
    img_width: u32,
    img_height: u32,
) -> (f32, f32, f32, f32) {
    let (x_min, y_min, x_max, y_max) = bbox;
    let x_center = (x_min + x_max) as f32 / 2.0 / img_width as f32;
    let y_center = (y_min + y_max) as f32 / 2.0 / img_height as f32;
    let w = (x_max - x_min) as f32 / img_width as f32;
    let h = (y_max - y_min) as f32 / img_height as f32;
    (x_center, y_center, w, h)
}

/// Convert a normalized YOLO tuple back to pixel corners
/// `(x_min, y_min, x_max, y_max)`.
pub fn yolo_to_bbox(
    x_center: f32,
    y_center: f32,
    w: f32,
    h: f32,
    img_width: u32,
    img_height: u32,
) -> (f32, f32, f32, f32) {
    let half_w = w * img_width as f32 / 2.0;
    let half_h = h * img_height as f32 / 2.0;
    let cx = x_center * img_width as f32;
    let cy = y_center * img_height as f32;
    (cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_floor() {
        assert_eq!(clamp_min1(0.0), 1);
        assert_eq!(clamp_min1(0.7), 1);
        assert_eq!(clamp_min1(-5.0), 1);
        assert_eq!(clamp_min1(1.0), 1);
        assert_eq!(clamp_min1(37.9), 37);
    }

    #[test]
    fn test_points_to_bbox_clamps_min_only() {
        let points = [Point::new(0.0, 0.4), Point::new(50.2, 40.9)];
        assert_eq!(points_to_bbox(&points), (1, 1, 50, 40));
        let points = [Point::new(10.0, 10.0), Point::new(50.0, 40.0)];
        assert_eq!(points_to_bbox(&points), (10, 10, 50, 40));
    }

    #[test]
    fn test_circle_points_layout() {
        let pts = circle_points(&[Point::new(50.0, 50.0), Point::new(60.0, 50.0)]);
        assert_eq!(
            pts,
            vec![
                [50, 50],
                [60, 50],
                [40, 50],
                [50, 40],
                [60, 50],
                [50, 60],
            ]
        );
        // Near the origin the derived minima clamp
        let pts = circle_points(&[Point::new(5.0, 5.0), Point::new(15.0, 5.0)]);
        assert_eq!(pts[2], [1, 5]);
        assert_eq!(pts[3], [5, 1]);
    }

    #[test]
    fn test_yolo_normalization() {
        let (x, y, w, h) = bbox_to_yolo((10, 10, 50, 50), 100, 100);
        assert_eq!((x, y, w, h), (0.3, 0.3, 0.4, 0.4));
        let (x_min, y_min, x_max, y_max) = yolo_to_bbox(0.3, 0.3, 0.4, 0.4, 100, 100);
        assert!((x_min - 10.0).abs() < 1e-4);
        assert!((y_min - 10.0).abs() < 1e-4);
        assert!((x_max - 50.0).abs() < 1e-4);
        assert!((y_max - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_base_name() {
        let meta = ImageMeta::new("imgs", "photo.final.jpg", 640, 480);
        assert_eq!(meta.base_name(), "photo.final");
        assert_eq!(meta.depth, 1);
    }
}
