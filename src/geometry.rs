//! Geometry primitives used by the shape model and canvas.
//!
//! Everything here is a plain value type or pure function: 2D points in
//! image coordinates, axis-aligned rectangles, point-to-segment distance,
//! and the closed boundary paths shapes are hit-tested against.

use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A 2D point (or displacement) in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Vector norm, treating the point as a displacement from the origin.
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f32 {
        (*self - other).length()
    }

    fn dot(&self, other: Point) -> f32 {
        self.x * other.x + self.y * other.y
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Distance from `p` to the segment `a`-`b`.
///
/// Uses the clamped-projection formula: if the projection of `p` falls
/// outside the segment, the distance to the nearer endpoint is returned.
/// A zero-length segment yields the distance to the single point.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    if (p - a).dot(ab) < 0.0 {
        return p.distance_to(a);
    }
    if (p - b).dot(-ab) < 0.0 {
        return p.distance_to(b);
    }
    let len = ab.length();
    if len == 0.0 {
        return p.distance_to(a);
    }
    // |cross(b - a, a - p)| / |b - a|
    let ap = a - p;
    (ab.x * ap.y - ab.y * ap.x).abs() / len
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build the rectangle spanned by two opposite corners, in any order.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: (p1.x - p2.x).abs(),
            height: (p1.y - p2.y).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }
}

/// The closed boundary a shape is hit-tested (and rendered) against.
///
/// Rectangles and circles get analytic containment; everything else is a
/// point-to-point path, implicitly closed for the containment test.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryPath {
    Rect(Rect),
    Circle { center: Point, radius: f32 },
    Polyline(Vec<Point>),
}

impl BoundaryPath {
    pub fn contains(&self, p: Point) -> bool {
        match self {
            BoundaryPath::Rect(rect) => rect.contains(p),
            BoundaryPath::Circle { center, radius } => p.distance_to(*center) <= *radius,
            BoundaryPath::Polyline(points) => polyline_contains(points, p),
        }
    }

    pub fn bounding_rect(&self) -> Rect {
        match self {
            BoundaryPath::Rect(rect) => *rect,
            BoundaryPath::Circle { center, radius } => Rect::new(
                center.x - radius,
                center.y - radius,
                2.0 * radius,
                2.0 * radius,
            ),
            BoundaryPath::Polyline(points) => {
                let mut min = Point::new(f32::INFINITY, f32::INFINITY);
                let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
                for p in points {
                    min.x = min.x.min(p.x);
                    min.y = min.y.min(p.y);
                    max.x = max.x.max(p.x);
                    max.y = max.y.max(p.y);
                }
                Rect::from_corners(min, max)
            }
        }
    }
}

/// Even-odd ray-casting containment over an implicitly closed path.
fn polyline_contains(vertices: &[Point], p: Point) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let vi = vertices[i];
        let vj = vertices[j];
        if ((vi.y > p.y) != (vj.y > p.y))
            && (p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
