//! YOLO text format support.
//!
//! One `.txt` file per image, one line per box:
//!
//! ```text
//! <class_index> <x_center> <y_center> <width> <height>
//! ```
//!
//! All four values are normalized to `[0, 1]` by the image dimensions.
//! Class indices resolve against an ordered class-name list maintained by
//! the caller and persisted as a sibling `classes.txt`; labels not yet in
//! the list are appended, extending it.
//!
//! Only rectangles are representable. The facade refuses other shape
//! kinds up front rather than dropping them silently.

use std::path::{Path, PathBuf};

use crate::formats::ShapeData;
use crate::formats::common::{ImageMeta, bbox_to_yolo, rect_corners, yolo_to_bbox};
use crate::formats::error::FormatError;
use crate::shape::ShapeKind;

/// File extension for this format.
pub const TXT_EXT: &str = "txt";

/// Name of the sibling class-list file.
pub const CLASSES_FILE: &str = "classes.txt";

struct YoloBox {
    bbox: (i32, i32, i32, i32),
    label: String,
}

/// Accumulates rectangles and writes the label file plus `classes.txt`.
pub struct YoloWriter {
    image: ImageMeta,
    boxes: Vec<YoloBox>,
}

impl YoloWriter {
    pub fn new(image: ImageMeta) -> Self {
        Self {
            image,
            boxes: Vec::new(),
        }
    }

    /// Add a rectangle from its clamped integer bounding box.
    pub fn add_bounding_box(&mut self, bbox: (i32, i32, i32, i32), label: &str) {
        self.boxes.push(YoloBox {
            bbox,
            label: label.to_string(),
        });
    }

    /// Render the label-file body, resolving (and extending) `class_list`.
    pub fn to_label_string(&self, class_list: &mut Vec<String>) -> String {
        let mut lines = String::new();
        for b in &self.boxes {
            let index = class_index(class_list, &b.label);
            let (x, y, w, h) = bbox_to_yolo(b.bbox, self.image.width, self.image.height);
            lines.push_str(&format!("{index} {x} {y} {w} {h}\n"));
        }
        lines
    }

    /// Write the label file at `path` and `classes.txt` next to it.
    pub fn save(&self, path: &Path, class_list: &mut Vec<String>) -> Result<(), FormatError> {
        let body = self.to_label_string(class_list);
        std::fs::write(path, body)?;

        let mut classes = class_list.join("\n");
        classes.push('\n');
        std::fs::write(classes_path(path), classes)?;
        log::info!("wrote {} boxes to {}", self.boxes.len(), path.display());
        Ok(())
    }
}

/// Index of `label` in the ordered class list, appending it when new.
fn class_index(class_list: &mut Vec<String>, label: &str) -> usize {
    match class_list.iter().position(|c| c == label) {
        Some(index) => index,
        None => {
            class_list.push(label.to_string());
            class_list.len() - 1
        }
    }
}

/// Conventional location of the class list next to a label file.
fn classes_path(label_path: &Path) -> PathBuf {
    label_path.with_file_name(CLASSES_FILE)
}

/// Parses YOLO label files back into rectangle descriptors.
pub struct YoloReader;

impl YoloReader {
    /// Parse label lines, denormalizing against the image dimensions.
    /// Lines that do not parse are skipped with a warning.
    pub fn parse_str(content: &str, classes: &[String], image: &ImageMeta) -> Vec<ShapeData> {
        let mut shapes = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let index: usize = match parts.next().and_then(|s| s.parse().ok()) {
                Some(index) => index,
                None => {
                    log::warn!("line {}: bad class index, skipping", line_no + 1);
                    continue;
                }
            };
            let coords: Vec<f32> = parts.filter_map(|s| s.parse().ok()).collect();
            let [x_center, y_center, w, h] = coords[..] else {
                log::warn!("line {}: expected 4 coordinates, skipping", line_no + 1);
                continue;
            };
            let label = classes
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class_{index}"));
            let (x_min, y_min, x_max, y_max) =
                yolo_to_bbox(x_center, y_center, w, h, image.width, image.height);
            shapes.push(ShapeData::new(
                ShapeKind::Rectangle,
                label,
                rect_corners(x_min, y_min, x_max, y_max),
            ));
        }
        shapes
    }

    /// Read the label file at `path` together with its sibling
    /// `classes.txt` (absent class list means generated `class_N` labels).
    pub fn read_file(path: &Path, image: &ImageMeta) -> Result<Vec<ShapeData>, FormatError> {
        let content = std::fs::read_to_string(path)?;
        let classes = match std::fs::read_to_string(classes_path(path)) {
            Ok(text) => text
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            Err(e) => {
                log::warn!("no readable {CLASSES_FILE} next to {}: {e}", path.display());
                Vec::new()
            }
        };
        let shapes = Self::parse_str(&content, &classes, image);
        log::info!("read {} shapes from {}", shapes.len(), path.display());
        Ok(shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ImageMeta {
        ImageMeta::new("images", "test.jpg", 100, 100)
    }

    #[test]
    fn test_line_format_normalization() {
        let mut writer = YoloWriter::new(meta());
        writer.add_bounding_box((10, 10, 50, 50), "person");
        let mut classes = vec!["car".to_string(), "dog".to_string(), "person".to_string()];
        let body = writer.to_label_string(&mut classes);
        assert_eq!(body, "2 0.3 0.3 0.4 0.4\n");
        assert_eq!(classes.len(), 3);
    }

    #[test]
    fn test_unknown_label_extends_class_list() {
        let mut writer = YoloWriter::new(meta());
        writer.add_bounding_box((10, 10, 50, 50), "zebra");
        let mut classes = vec!["car".to_string()];
        let body = writer.to_label_string(&mut classes);
        assert!(body.starts_with("1 "));
        assert_eq!(classes, vec!["car".to_string(), "zebra".to_string()]);
    }

    #[test]
    fn test_parse_round_trip() {
        let classes = vec!["car".to_string(), "person".to_string()];
        let shapes = YoloReader::parse_str("1 0.3 0.3 0.4 0.4\n", &classes, &meta());
        assert_eq!(shapes.len(), 1);
        let shape = &shapes[0];
        assert_eq!(shape.label, "person");
        assert_eq!(shape.kind, ShapeKind::Rectangle);
        assert_eq!(shape.points.len(), 4);
        assert!((shape.points[0].x - 10.0).abs() < 1e-3);
        assert!((shape.points[0].y - 10.0).abs() < 1e-3);
        assert!((shape.points[2].x - 50.0).abs() < 1e-3);
        assert!((shape.points[2].y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_parse_skips_bad_lines() {
        let classes = vec!["car".to_string()];
        let content = "not a line\n0 0.5 0.5\n0 0.5 0.5 0.2 0.2\n";
        let shapes = YoloReader::parse_str(content, &classes, &meta());
        assert_eq!(shapes.len(), 1);
    }

    #[test]
    fn test_missing_class_gets_generated_name() {
        let shapes = YoloReader::parse_str("5 0.5 0.5 0.2 0.2\n", &[], &meta());
        assert_eq!(shapes[0].label, "class_5");
    }

    #[test]
    fn test_save_writes_classes_file() {
        let dir = tempfile::tempdir().unwrap();
        let label_path = dir.path().join("test.txt");
        let mut writer = YoloWriter::new(meta());
        writer.add_bounding_box((10, 10, 50, 50), "car");
        let mut classes = Vec::new();
        writer.save(&label_path, &mut classes).unwrap();

        assert_eq!(
            std::fs::read_to_string(&label_path).unwrap(),
            "0 0.3 0.3 0.4 0.4\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(CLASSES_FILE)).unwrap(),
            "car\n"
        );

        let shapes = YoloReader::read_file(&label_path, &meta()).unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].label, "car");
    }
}
