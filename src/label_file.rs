//! Format-dispatch facade over the annotation codecs.
//!
//! The shell deals only with this module: it hands over a snapshot of the
//! shape collection plus image metadata and a target format, and gets the
//! right codec invoked with the coordinate representation that codec
//! expects. Loading goes the other way, including the auto-detection used
//! when an image is opened.

use std::path::Path;

use crate::formats::common::{
    ImageMeta, circle_points, line_points, point_points, points_to_bbox, polygon_points,
};
use crate::formats::create_ml::{CreateMlReader, CreateMlWriter, JSON_EXT};
use crate::formats::error::FormatError;
use crate::formats::voc::{PascalVocReader, PascalVocWriter, XML_EXT};
use crate::formats::yolo::{TXT_EXT, YoloReader, YoloWriter};
use crate::formats::{SaveOptions, ShapeData};
use crate::shape::ShapeKind;

/// The supported annotation file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFileFormat {
    PascalVoc,
    Yolo,
    CreateMl,
}

impl LabelFileFormat {
    pub fn display_name(&self) -> &'static str {
        match self {
            LabelFileFormat::PascalVoc => "PascalVOC",
            LabelFileFormat::Yolo => "YOLO",
            LabelFileFormat::CreateMl => "CreateML",
        }
    }

    /// The file extension this format uses, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            LabelFileFormat::PascalVoc => XML_EXT,
            LabelFileFormat::Yolo => TXT_EXT,
            LabelFileFormat::CreateMl => JSON_EXT,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            XML_EXT => Some(LabelFileFormat::PascalVoc),
            TXT_EXT => Some(LabelFileFormat::Yolo),
            JSON_EXT => Some(LabelFileFormat::CreateMl),
            _ => None,
        }
    }
}

/// A loaded annotation file: the shape snapshot plus session flags.
#[derive(Debug, Clone)]
pub struct LabelFile {
    pub format: LabelFileFormat,
    pub shapes: Vec<ShapeData>,
    pub verified: bool,
}

/// Whether `path` looks like an annotation file (by extension), as
/// opposed to an image to open.
pub fn is_annotation_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(LabelFileFormat::from_extension)
        .is_some()
}

/// Persist `shapes` to `path` in the requested format.
///
/// Under pure mode ([`SaveOptions::delete_on_empty`]) an empty snapshot
/// deletes the existing file instead of writing an empty document.
/// `class_list` is the externally maintained YOLO class ordering; it is
/// extended in place when new labels appear (unused by other formats).
pub fn save_annotation(
    path: &Path,
    format: LabelFileFormat,
    shapes: &[ShapeData],
    image: &ImageMeta,
    verified: bool,
    options: &SaveOptions,
    class_list: &mut Vec<String>,
) -> Result<(), FormatError> {
    if shapes.is_empty() && options.delete_on_empty {
        if path.exists() {
            std::fs::remove_file(path)?;
            log::info!("removed empty annotation {}", path.display());
        }
        return Ok(());
    }

    match format {
        LabelFileFormat::PascalVoc => {
            let mut writer = PascalVocWriter::new(image.clone());
            writer.set_verified(verified);
            for shape in shapes {
                match shape.kind {
                    ShapeKind::Rectangle => writer.add_bounding_box(
                        points_to_bbox(&shape.points),
                        &shape.label,
                        shape.group_id,
                        shape.difficult,
                    ),
                    ShapeKind::Polygon | ShapeKind::LineStrip => writer.add_points(
                        shape.kind,
                        &polygon_points(&shape.points),
                        &shape.label,
                        shape.group_id,
                        shape.difficult,
                    ),
                    ShapeKind::Circle => writer.add_points(
                        shape.kind,
                        &circle_points(&shape.points),
                        &shape.label,
                        shape.group_id,
                        shape.difficult,
                    ),
                    ShapeKind::Line => writer.add_points(
                        shape.kind,
                        &line_points(&shape.points),
                        &shape.label,
                        shape.group_id,
                        shape.difficult,
                    ),
                    ShapeKind::Point => writer.add_points(
                        shape.kind,
                        &point_points(&shape.points),
                        &shape.label,
                        shape.group_id,
                        shape.difficult,
                    ),
                }
            }
            writer.save(path)
        }
        LabelFileFormat::Yolo => {
            let mut writer = YoloWriter::new(image.clone());
            for shape in shapes {
                if shape.kind != ShapeKind::Rectangle {
                    return Err(FormatError::unsupported_shape(
                        shape.kind.as_str(),
                        format.display_name(),
                    ));
                }
                writer.add_bounding_box(points_to_bbox(&shape.points), &shape.label);
            }
            writer.save(path, class_list)
        }
        LabelFileFormat::CreateMl => {
            let mut writer = CreateMlWriter::new(image.clone());
            writer.set_verified(verified);
            for shape in shapes {
                if shape.kind != ShapeKind::Rectangle {
                    return Err(FormatError::unsupported_shape(
                        shape.kind.as_str(),
                        format.display_name(),
                    ));
                }
                writer.add_bounding_box(points_to_bbox(&shape.points), &shape.label);
            }
            writer.save(path)
        }
    }
}

/// Load the annotation file at `path` in the given format.
pub fn load_annotation(
    path: &Path,
    format: LabelFileFormat,
    image: &ImageMeta,
) -> Result<LabelFile, FormatError> {
    match format {
        LabelFileFormat::PascalVoc => {
            let contents = PascalVocReader::read_file(path)?;
            Ok(LabelFile {
                format,
                shapes: contents.shapes,
                verified: contents.verified,
            })
        }
        LabelFileFormat::Yolo => {
            let shapes = YoloReader::read_file(path, image)?;
            Ok(LabelFile {
                format,
                shapes,
                verified: false,
            })
        }
        LabelFileFormat::CreateMl => {
            let (verified, shapes) = CreateMlReader::read_file(path, &image.filename)?;
            Ok(LabelFile {
                format,
                shapes,
                verified,
            })
        }
    }
}

/// Find and load the annotation for `image_path` by convention: a file
/// with the same stem, trying the XML dialect first, then YOLO.
///
/// Returns `Ok(None)` when no annotation file exists. A file that exists
/// but does not parse degrades to an empty shape list (treated as "no
/// prior annotation"); only I/O failures propagate.
pub fn open_annotation(
    image_path: &Path,
    image: &ImageMeta,
) -> Result<Option<LabelFile>, FormatError> {
    for format in [LabelFileFormat::PascalVoc, LabelFileFormat::Yolo] {
        let path = image_path.with_extension(format.extension());
        if !path.exists() {
            continue;
        }
        return match load_annotation(&path, format, image) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_recoverable_parse() => {
                log::warn!("unreadable annotation {}: {e}", path.display());
                Ok(Some(LabelFile {
                    format,
                    shapes: Vec::new(),
                    verified: false,
                }))
            }
            Err(e) => Err(e),
        };
    }
    Ok(None)
}
