//! Annotation format codecs.
//!
//! Three independent writer/reader pairs cover the supported on-disk
//! schemas:
//!
//! - **Pascal VOC dialect**: one tab-indented XML file per image ([`voc`])
//! - **YOLO**: one normalized `.txt` per image plus `classes.txt` ([`yolo`])
//! - **CreateML**: a JSON array of per-image entries ([`create_ml`])
//!
//! The codecs operate on [`ShapeData`] descriptors — plain snapshots of the
//! in-memory shapes — so no live state crosses the boundary in either
//! direction. They share the coordinate clamping core in [`common`]: no
//! persisted coordinate is ever below 1.

pub mod common;
pub mod create_ml;
pub mod error;
pub mod voc;
pub mod yolo;

pub use common::ImageMeta;
pub use create_ml::{CreateMlReader, CreateMlWriter};
pub use error::FormatError;
pub use voc::{PascalVocReader, PascalVocWriter, VocContents};
pub use yolo::{YoloReader, YoloWriter};

use crate::geometry::Point;
use crate::shape::{Shape, ShapeKind};

/// A plain, owned snapshot of one shape, as the codecs consume and
/// produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeData {
    pub label: String,
    pub kind: ShapeKind,
    pub points: Vec<Point>,
    pub group_id: Option<u32>,
    pub difficult: bool,
}

impl ShapeData {
    pub fn new(kind: ShapeKind, label: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            kind,
            points,
            group_id: None,
            difficult: false,
        }
    }

    pub fn with_group_id(mut self, group_id: Option<u32>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_difficult(mut self, difficult: bool) -> Self {
        self.difficult = difficult;
        self
    }

    /// Rebuild a closed in-memory shape from this descriptor.
    pub fn into_shape(self) -> Shape {
        let mut shape = Shape::new(self.kind)
            .with_label(self.label)
            .with_points(self.points);
        shape.group_id = self.group_id;
        shape.difficult = self.difficult;
        shape.close();
        shape
    }
}

impl From<&Shape> for ShapeData {
    fn from(shape: &Shape) -> Self {
        Self {
            label: shape.label.clone(),
            kind: shape.kind,
            points: shape.points.clone(),
            group_id: shape.group_id,
            difficult: shape.difficult,
        }
    }
}

/// Options applying to every codec's save path.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Pure mode: saving an empty shape list deletes any existing
    /// annotation file at the target path instead of writing an empty one.
    pub delete_on_empty: bool,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_on_empty(mut self, on: bool) -> Self {
        self.delete_on_empty = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_data_round_trip() {
        let mut shape = Shape::new(ShapeKind::Line)
            .with_label("cable")
            .with_points(vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
        shape.group_id = Some(7);
        shape.close();

        let data = ShapeData::from(&shape);
        assert_eq!(data.label, "cable");
        assert_eq!(data.group_id, Some(7));

        let rebuilt = data.into_shape();
        assert!(rebuilt.is_closed());
        assert_eq!(rebuilt.points, shape.points);
    }
}
