//! The polymorphic annotation shape.
//!
//! A [`Shape`] is an ordered list of points whose meaning depends on its
//! [`ShapeKind`]: two corner-defining points out of four for a rectangle,
//! center plus rim point for a circle, endpoints for a line, a single
//! point marker, or a free vertex list for polygons and line strips.
//! Cardinality invariants are enforced at the mutation boundary; invalid
//! mutations are rejected as no-ops rather than surfaced to the caller.

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundaryPath, Point, Rect, distance_to_segment};
use crate::style::{ShapeStyle, VertexMarker};

/// The shape type tag. Matches the on-disk `shape_type` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Polygon,
    Circle,
    Line,
    Point,
    LineStrip,
}

impl ShapeKind {
    /// The on-disk tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Circle => "circle",
            ShapeKind::Line => "line",
            ShapeKind::Point => "point",
            ShapeKind::LineStrip => "linestrip",
        }
    }

    /// Parse an on-disk tag.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rectangle" => Some(ShapeKind::Rectangle),
            "polygon" => Some(ShapeKind::Polygon),
            "circle" => Some(ShapeKind::Circle),
            "line" => Some(ShapeKind::Line),
            "point" => Some(ShapeKind::Point),
            "linestrip" => Some(ShapeKind::LineStrip),
            _ => None,
        }
    }

    /// Maximum number of points, or `None` for open-ended kinds.
    pub fn max_points(&self) -> Option<usize> {
        match self {
            ShapeKind::Rectangle => Some(4),
            ShapeKind::Circle | ShapeKind::Line => Some(2),
            ShapeKind::Point => Some(1),
            ShapeKind::Polygon | ShapeKind::LineStrip => None,
        }
    }

    /// Minimum number of points a closed shape of this kind must have.
    pub fn min_points(&self) -> usize {
        match self {
            ShapeKind::Rectangle => 4,
            ShapeKind::Polygon => 3,
            ShapeKind::Circle | ShapeKind::Line | ShapeKind::LineStrip => 2,
            ShapeKind::Point => 1,
        }
    }

    /// Whether edges of this kind can be hovered and manipulated.
    pub fn has_edges(&self) -> bool {
        matches!(
            self,
            ShapeKind::Rectangle | ShapeKind::Polygon | ShapeKind::LineStrip
        )
    }
}

/// How a highlighted vertex should be emphasized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    /// Cursor is near the vertex (e.g. polygon close snapping).
    NearVertex,
    /// Vertex is about to be dragged.
    MoveVertex,
}

/// Vertex marker geometry handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHandle {
    pub center: Point,
    /// Marker diameter in image coordinates.
    pub size: f32,
    pub marker: VertexMarker,
    pub highlighted: bool,
}

/// A single annotation shape.
#[derive(Debug, Clone)]
pub struct Shape {
    pub kind: ShapeKind,
    pub points: Vec<Point>,
    /// Annotation class name. Assigned when the shape is committed.
    pub label: String,
    /// Optional non-negative group id tying multi-part instances together.
    pub group_id: Option<u32>,
    pub difficult: bool,
    pub selected: bool,
    closed: bool,
    highlight: Option<(usize, HighlightMode)>,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            points: Vec::new(),
            label: String::new(),
            group_id: None,
            difficult: false,
            selected: false,
            closed: false,
            highlight: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark construction finished. Rejected while below the kind's minimum.
    pub fn close(&mut self) {
        if self.points.len() < self.kind.min_points() {
            log::warn!(
                "refusing to close {} with {} points",
                self.kind.as_str(),
                self.points.len()
            );
            return;
        }
        self.closed = true;
    }

    /// Reopen a closed shape (single-step line reset).
    pub fn set_open(&mut self) {
        self.closed = false;
    }

    pub fn reach_max_points(&self) -> bool {
        self.kind
            .max_points()
            .is_some_and(|max| self.points.len() >= max)
    }

    /// Append a point, or close the shape when `p` coincides with the
    /// first point already present (polygon auto-close on click).
    pub fn add_point(&mut self, p: Point) {
        if self.points.first() == Some(&p) {
            self.close();
        } else if self.reach_max_points() {
            log::warn!(
                "ignoring extra point on {} (max {:?})",
                self.kind.as_str(),
                self.kind.max_points()
            );
        } else {
            self.points.push(p);
        }
    }

    /// Remove and return the last point of an open shape.
    pub fn pop_point(&mut self) -> Option<Point> {
        self.points.pop()
    }

    /// Subdivide an edge by inserting `p` before index `i`.
    /// Only polygons and line strips grow new vertices.
    pub fn insert_point(&mut self, i: usize, p: Point) {
        if !matches!(self.kind, ShapeKind::Polygon | ShapeKind::LineStrip) || i > self.points.len()
        {
            log::warn!("cannot insert point into {}", self.kind.as_str());
            return;
        }
        self.points.insert(i, p);
    }

    /// Delete vertex `i`. Rejected for fixed-cardinality kinds and when the
    /// removal would drop a polygon below 3 or a line strip below 2 points.
    pub fn remove_point(&mut self, i: usize) {
        let removable = match self.kind {
            ShapeKind::Polygon => self.points.len() > 3,
            ShapeKind::LineStrip => self.points.len() > 2,
            _ => false,
        };
        if !removable || i >= self.points.len() {
            log::warn!(
                "cannot remove point from {} with {} points",
                self.kind.as_str(),
                self.points.len()
            );
            return;
        }
        self.points.remove(i);
    }

    /// Index of the closest vertex within `epsilon`, if any.
    pub fn nearest_vertex(&self, p: Point, epsilon: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, v) in self.points.iter().enumerate() {
            let d = v.distance_to(p);
            if d <= epsilon && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Index of the closest edge within `epsilon`, if any. Edge `i` is the
    /// segment from `points[i-1]` to `points[i]`, wrapping at zero.
    pub fn nearest_edge(&self, p: Point, epsilon: f32) -> Option<usize> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for i in 0..n {
            let a = self.points[(i + n - 1) % n];
            let b = self.points[i];
            let d = distance_to_segment(p, a, b);
            if d <= epsilon && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Move vertex `i` by `delta`.
    ///
    /// For rectangles the two adjacent corners follow along their shared
    /// axis (which axis goes to which neighbor depends on the index
    /// parity), keeping the quadrilateral axis-aligned.
    pub fn move_vertex_by(&mut self, i: usize, delta: Point) {
        if i >= self.points.len() {
            return;
        }
        self.points[i] = self.points[i] + delta;
        if self.kind == ShapeKind::Rectangle && self.points.len() == 4 {
            let left = (i + 1) % 4;
            let right = (i + 3) % 4;
            let (right_shift, left_shift) = if i % 2 == 0 {
                (Point::new(delta.x, 0.0), Point::new(0.0, delta.y))
            } else {
                (Point::new(0.0, delta.y), Point::new(delta.x, 0.0))
            };
            self.points[right] = self.points[right] + right_shift;
            self.points[left] = self.points[left] + left_shift;
        }
    }

    /// Translate the whole shape by `delta`.
    ///
    /// A circle refuses the move when its center already sits on (or past)
    /// the image border the delta points toward, per axis independently.
    /// Returns whether the translation was applied.
    pub fn move_by(&mut self, delta: Point, bounds: (f32, f32)) -> bool {
        if self.kind == ShapeKind::Circle {
            let Some(center) = self.points.first().copied() else {
                return false;
            };
            if (center.x <= 0.0 && delta.x < 0.0)
                || (center.x >= bounds.0 && delta.x > 0.0)
                || (center.y <= 0.0 && delta.y < 0.0)
                || (center.y >= bounds.1 && delta.y > 0.0)
            {
                return false;
            }
        }
        for p in &mut self.points {
            *p = *p + delta;
        }
        true
    }

    /// The closed boundary used for hit-testing and rendering, or `None`
    /// while the shape has no usable geometry yet.
    pub fn boundary_path(&self) -> Option<BoundaryPath> {
        match self.kind {
            ShapeKind::Rectangle if self.points.len() == 4 => Some(BoundaryPath::Rect(
                Rect::from_corners(self.points[0], self.points[2]),
            )),
            ShapeKind::Rectangle => None,
            ShapeKind::Circle if self.points.len() == 2 => Some(BoundaryPath::Circle {
                center: self.points[0],
                radius: self.points[0].distance_to(self.points[1]),
            }),
            ShapeKind::Circle => None,
            _ => {
                if self.points.is_empty() {
                    None
                } else {
                    Some(BoundaryPath::Polyline(self.points.clone()))
                }
            }
        }
    }

    pub fn contains_point(&self, p: Point) -> bool {
        self.boundary_path().is_some_and(|path| path.contains(p))
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        self.boundary_path().map(|path| path.bounding_rect())
    }

    /// Deep copy with transient highlight state cleared.
    pub fn duplicate(&self) -> Shape {
        let mut copy = self.clone();
        copy.highlight = None;
        copy
    }

    pub fn highlight_vertex(&mut self, i: usize, mode: HighlightMode) {
        self.highlight = Some((i, mode));
    }

    pub fn highlight_clear(&mut self) {
        self.highlight = None;
    }

    pub fn highlighted_vertex(&self) -> Option<(usize, HighlightMode)> {
        self.highlight
    }

    /// Vertex markers for the presentation layer: base diameter from the
    /// style scaled down by the view zoom, with the highlighted vertex
    /// enlarged (round for proximity, square for drag).
    pub fn vertex_handles(&self, style: &ShapeStyle, scale: f32) -> Vec<VertexHandle> {
        let base = style.point_size / scale;
        self.points
            .iter()
            .enumerate()
            .map(|(i, &center)| match self.highlight {
                Some((hi, mode)) if hi == i => {
                    let (factor, marker) = match mode {
                        HighlightMode::NearVertex => (style.near_vertex_scale, VertexMarker::Round),
                        HighlightMode::MoveVertex => {
                            (style.move_vertex_scale, VertexMarker::Square)
                        }
                    };
                    VertexHandle {
                        center,
                        size: base * factor,
                        marker,
                        highlighted: true,
                    }
                }
                _ => VertexHandle {
                    center,
                    size: base,
                    marker: style.point_marker,
                    highlighted: false,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(x1: f32, y1: f32, x2: f32, y2: f32) -> Shape {
        let mut shape = Shape::new(ShapeKind::Rectangle).with_points(vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ]);
        shape.close();
        shape
    }

    #[test]
    fn test_polygon_auto_close_on_first_point() {
        let mut poly = Shape::new(ShapeKind::Polygon);
        poly.add_point(Point::new(0.0, 0.0));
        poly.add_point(Point::new(10.0, 0.0));
        poly.add_point(Point::new(10.0, 10.0));
        poly.add_point(Point::new(0.0, 0.0));
        assert!(poly.is_closed());
        assert_eq!(poly.points.len(), 3);
    }

    #[test]
    fn test_add_point_rejects_past_max() {
        let mut line = Shape::new(ShapeKind::Line);
        line.add_point(Point::new(0.0, 0.0));
        line.add_point(Point::new(5.0, 5.0));
        line.add_point(Point::new(9.0, 9.0));
        assert_eq!(line.points.len(), 2);
    }

    #[test]
    fn test_close_rejects_below_minimum() {
        let mut poly = Shape::new(ShapeKind::Polygon);
        poly.add_point(Point::new(0.0, 0.0));
        poly.add_point(Point::new(10.0, 0.0));
        poly.close();
        assert!(!poly.is_closed());
    }

    #[test]
    fn test_rectangle_vertex_move_stays_axis_aligned() {
        let mut rect = rectangle(10.0, 10.0, 50.0, 40.0);
        rect.move_vertex_by(0, Point::new(-3.0, 7.0));
        let xs: Vec<f32> = rect.points.iter().map(|p| p.x).collect();
        let ys: Vec<f32> = rect.points.iter().map(|p| p.y).collect();
        // Two distinct x values and two distinct y values, paired corners
        assert_eq!(xs[0], xs[3]);
        assert_eq!(xs[1], xs[2]);
        assert_eq!(ys[0], ys[1]);
        assert_eq!(ys[2], ys[3]);
        assert_eq!(rect.points[0], Point::new(7.0, 17.0));
        assert_eq!(rect.points[2], Point::new(50.0, 40.0));
    }

    #[test]
    fn test_rectangle_edge_drag_via_vertex_parity() {
        // Moving vertex 3 along x propagates to vertex 0 (the shared left
        // edge) and leaves the opposite edge alone.
        let mut rect = rectangle(10.0, 10.0, 50.0, 40.0);
        rect.move_vertex_by(3, Point::new(5.0, 0.0));
        assert_eq!(rect.points[0].x, 15.0);
        assert_eq!(rect.points[3].x, 15.0);
        assert_eq!(rect.points[1].x, 50.0);
        assert_eq!(rect.points[2].x, 50.0);
    }

    #[test]
    fn test_remove_point_guards() {
        let mut rect = rectangle(0.0, 0.0, 10.0, 10.0);
        rect.remove_point(0);
        assert_eq!(rect.points.len(), 4);

        let mut poly = Shape::new(ShapeKind::Polygon).with_points(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 10.0),
        ]);
        poly.remove_point(1);
        assert_eq!(poly.points.len(), 3);

        poly.insert_point(1, Point::new(5.0, 0.0));
        assert_eq!(poly.points.len(), 4);
        poly.remove_point(1);
        assert_eq!(poly.points.len(), 3);
    }

    #[test]
    fn test_contains_own_centroid() {
        let rect = rectangle(10.0, 10.0, 50.0, 40.0);
        let center = rect.bounding_rect().unwrap().center();
        assert!(rect.contains_point(center));

        let mut circle = Shape::new(ShapeKind::Circle)
            .with_points(vec![Point::new(30.0, 30.0), Point::new(40.0, 30.0)]);
        circle.close();
        assert!(circle.contains_point(Point::new(30.0, 30.0)));
        assert!(!circle.contains_point(Point::new(45.0, 45.0)));
    }

    #[test]
    fn test_circle_refuses_move_past_border() {
        let mut circle = Shape::new(ShapeKind::Circle)
            .with_points(vec![Point::new(0.0, 50.0), Point::new(10.0, 50.0)]);
        assert!(!circle.move_by(Point::new(-5.0, 0.0), (100.0, 100.0)));
        assert_eq!(circle.points[0], Point::new(0.0, 50.0));
        // Moving away from the border is fine
        assert!(circle.move_by(Point::new(5.0, 0.0), (100.0, 100.0)));
        assert_eq!(circle.points[0], Point::new(5.0, 50.0));
    }

    #[test]
    fn test_nearest_vertex_picks_closest() {
        let rect = rectangle(0.0, 0.0, 10.0, 10.0);
        assert_eq!(rect.nearest_vertex(Point::new(1.0, 1.0), 5.0), Some(0));
        assert_eq!(rect.nearest_vertex(Point::new(9.0, 1.0), 5.0), Some(1));
        assert_eq!(rect.nearest_vertex(Point::new(50.0, 50.0), 5.0), None);
    }

    #[test]
    fn test_nearest_edge_wraps() {
        let rect = rectangle(0.0, 0.0, 10.0, 10.0);
        // Edge 0 is points[3] -> points[0]: the left side
        assert_eq!(rect.nearest_edge(Point::new(0.5, 5.0), 2.0), Some(0));
        // Edge 1 is points[0] -> points[1]: the top side
        assert_eq!(rect.nearest_edge(Point::new(5.0, 0.5), 2.0), Some(1));
        assert_eq!(rect.nearest_edge(Point::new(50.0, 50.0), 2.0), None);
    }

    #[test]
    fn test_duplicate_clears_highlight() {
        let mut rect = rectangle(0.0, 0.0, 10.0, 10.0);
        rect.label = "car".to_string();
        rect.group_id = Some(3);
        rect.highlight_vertex(1, HighlightMode::MoveVertex);
        let copy = rect.duplicate();
        assert_eq!(copy.label, "car");
        assert_eq!(copy.group_id, Some(3));
        assert!(copy.is_closed());
        assert!(copy.highlighted_vertex().is_none());
    }

    #[test]
    fn test_vertex_handles_highlight_sizing() {
        let style = ShapeStyle::default();
        let mut rect = rectangle(0.0, 0.0, 10.0, 10.0);
        rect.highlight_vertex(2, HighlightMode::NearVertex);
        let handles = rect.vertex_handles(&style, 2.0);
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0].size, style.point_size / 2.0);
        assert_eq!(handles[2].size, style.point_size / 2.0 * style.near_vertex_scale);
        assert_eq!(handles[2].marker, VertexMarker::Round);
        assert!(handles[2].highlighted);
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            ShapeKind::Rectangle,
            ShapeKind::Polygon,
            ShapeKind::Circle,
            ShapeKind::Line,
            ShapeKind::Point,
            ShapeKind::LineStrip,
        ] {
            assert_eq!(ShapeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ShapeKind::from_str("blob"), None);
    }
}
