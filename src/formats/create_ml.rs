//! CreateML JSON format support.
//!
//! A single JSON document holds an array of per-image entries:
//!
//! ```json
//! [
//!   {
//!     "image": "img1.jpg",
//!     "verified": false,
//!     "annotations": [
//!       {
//!         "label": "person",
//!         "coordinates": { "x": 150.0, "y": 150.0, "width": 100.0, "height": 100.0 }
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! Coordinates are center-based pixel values; the reader reverses the
//! same convention, so round-trips are lossless. Saving merges into an
//! existing document, replacing or appending this image's entry.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::formats::ShapeData;
use crate::formats::common::{ImageMeta, rect_corners};
use crate::formats::error::FormatError;
use crate::shape::ShapeKind;

/// File extension for this format.
pub const JSON_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateMlEntry {
    image: String,
    #[serde(default)]
    verified: bool,
    annotations: Vec<CreateMlAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateMlAnnotation {
    label: String,
    coordinates: CreateMlCoordinates,
}

/// Box center plus size, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CreateMlCoordinates {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

/// Accumulates rectangles and writes (or merges into) the JSON document.
pub struct CreateMlWriter {
    image: ImageMeta,
    verified: bool,
    annotations: Vec<CreateMlAnnotation>,
}

impl CreateMlWriter {
    pub fn new(image: ImageMeta) -> Self {
        Self {
            image,
            verified: false,
            annotations: Vec::new(),
        }
    }

    pub fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    /// Add a rectangle from its clamped integer bounding box.
    pub fn add_bounding_box(&mut self, bbox: (i32, i32, i32, i32), label: &str) {
        let (x_min, y_min, x_max, y_max) = bbox;
        let width = (x_max - x_min) as f32;
        let height = (y_max - y_min) as f32;
        self.annotations.push(CreateMlAnnotation {
            label: label.to_string(),
            coordinates: CreateMlCoordinates {
                x: x_min as f32 + width / 2.0,
                y: y_min as f32 + height / 2.0,
                width,
                height,
            },
        });
    }

    fn entry(&self) -> CreateMlEntry {
        CreateMlEntry {
            image: self.image.filename.clone(),
            verified: self.verified,
            annotations: self.annotations.clone(),
        }
    }

    /// Write the document at `path`, replacing this image's entry in an
    /// existing array or appending to it.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let mut entries: Vec<CreateMlEntry> = if path.exists() {
            let existing = std::fs::read_to_string(path)?;
            match serde_json::from_str(&existing) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("replacing unreadable {}: {e}", path.display());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let entry = self.entry();
        match entries.iter_mut().find(|e| e.image == entry.image) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }

        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(path, json)?;
        log::info!(
            "wrote {} annotations for {} to {}",
            self.annotations.len(),
            self.image.filename,
            path.display()
        );
        Ok(())
    }
}

/// Parses CreateML documents back into rectangle descriptors.
pub struct CreateMlReader;

impl CreateMlReader {
    /// Parse the document and extract the entry for `filename`.
    /// Returns `(verified, shapes)`; an absent entry yields no shapes.
    pub fn parse_str(content: &str, filename: &str) -> Result<(bool, Vec<ShapeData>), FormatError> {
        let entries: Vec<CreateMlEntry> = serde_json::from_str(content)?;
        let Some(entry) = entries.iter().find(|e| e.image == filename) else {
            return Ok((false, Vec::new()));
        };
        let shapes = entry
            .annotations
            .iter()
            .map(|ann| {
                let c = &ann.coordinates;
                let x_min = c.x - c.width / 2.0;
                let y_min = c.y - c.height / 2.0;
                ShapeData::new(
                    ShapeKind::Rectangle,
                    ann.label.clone(),
                    rect_corners(x_min, y_min, x_min + c.width, y_min + c.height),
                )
            })
            .collect();
        Ok((entry.verified, shapes))
    }

    /// Read and parse the document at `path`.
    pub fn read_file(path: &Path, filename: &str) -> Result<(bool, Vec<ShapeData>), FormatError> {
        let content = std::fs::read_to_string(path)?;
        let result = Self::parse_str(&content, filename)?;
        log::info!(
            "read {} shapes for {} from {}",
            result.1.len(),
            filename,
            path.display()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ImageMeta {
        ImageMeta::new("images", "test.jpg", 100, 100)
    }

    #[test]
    fn test_center_based_coordinates() {
        let mut writer = CreateMlWriter::new(meta());
        writer.add_bounding_box((10, 10, 50, 50), "person");
        let entry = writer.entry();
        let c = &entry.annotations[0].coordinates;
        assert_eq!((c.x, c.y, c.width, c.height), (30.0, 30.0, 40.0, 40.0));
    }

    #[test]
    fn test_round_trip() {
        let mut writer = CreateMlWriter::new(meta());
        writer.set_verified(true);
        writer.add_bounding_box((10, 10, 50, 50), "person");
        writer.add_bounding_box((20, 30, 60, 90), "car");
        let json = serde_json::to_string_pretty(&vec![writer.entry()]).unwrap();

        let (verified, shapes) = CreateMlReader::parse_str(&json, "test.jpg").unwrap();
        assert!(verified);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].label, "person");
        assert_eq!(shapes[0].points[0].x, 10.0);
        assert_eq!(shapes[1].points[2].y, 90.0);
    }

    #[test]
    fn test_missing_entry_yields_no_shapes() {
        let (verified, shapes) = CreateMlReader::parse_str("[]", "test.jpg").unwrap();
        assert!(!verified);
        assert!(shapes.is_empty());
    }

    #[test]
    fn test_save_merges_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");

        let mut writer = CreateMlWriter::new(ImageMeta::new("images", "a.jpg", 100, 100));
        writer.add_bounding_box((10, 10, 20, 20), "cat");
        writer.save(&path).unwrap();

        let mut writer = CreateMlWriter::new(ImageMeta::new("images", "b.jpg", 100, 100));
        writer.add_bounding_box((30, 30, 40, 40), "dog");
        writer.save(&path).unwrap();

        // Re-saving image a replaces its entry rather than duplicating it
        let mut writer = CreateMlWriter::new(ImageMeta::new("images", "a.jpg", 100, 100));
        writer.add_bounding_box((15, 15, 25, 25), "cat");
        writer.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(entries.len(), 2);

        let (_, shapes) = CreateMlReader::read_file(&path, "a.jpg").unwrap();
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].points[0].x, 15.0);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(CreateMlReader::parse_str("not json", "x.jpg").is_err());
    }
}
