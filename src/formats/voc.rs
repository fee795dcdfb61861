//! Pascal-VOC-dialect XML support.
//!
//! One XML file per image, tab-indented, UTF-8. The dialect extends plain
//! Pascal VOC with a `shape_type` tag and per-kind geometry elements:
//!
//! ```xml
//! <annotation verified="yes">
//!     <folder>images</folder>
//!     <filename>img1.jpg</filename>
//!     <path>/data/images/img1.jpg</path>
//!     <source>
//!         <database>Unknown</database>
//!     </source>
//!     <size>
//!         <width>640</width>
//!         <height>480</height>
//!         <depth>3</depth>
//!     </size>
//!     <segmented>0</segmented>
//!     <object>
//!         <name>person</name>
//!         <group_id>none</group_id>
//!         <shape_type>rectangle</shape_type>
//!         <pose>Unspecified</pose>
//!         <truncated>0</truncated>
//!         <difficult>0</difficult>
//!         <bndbox>
//!             <xmin>100</xmin>
//!             <ymin>100</ymin>
//!             <xmax>200</xmax>
//!             <ymax>200</ymax>
//!         </bndbox>
//!     </object>
//! </annotation>
//! ```
//!
//! Polygons and line strips store a flat `(x1,y1)(x2,y2)...` point string;
//! circles store center and rim; lines store their endpoints; points a
//! single coordinate pair. The `truncated` flag records border contact:
//! any relevant coordinate equal to the clamp floor (1) or to the image's
//! far edge.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::formats::ShapeData;
use crate::formats::common::{ImageMeta, rect_corners};
use crate::formats::error::FormatError;
use crate::geometry::Point;
use crate::shape::ShapeKind;

/// File extension for this format.
pub const XML_EXT: &str = "xml";

// ============================================================================
// XML document structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename = "annotation")]
struct XmlAnnotation {
    #[serde(rename = "@verified", default)]
    verified: Option<String>,
    #[serde(default)]
    folder: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    source: XmlSource,
    #[serde(default)]
    size: XmlSize,
    #[serde(default)]
    segmented: u8,
    #[serde(rename = "object", default)]
    objects: Vec<XmlObject>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct XmlSource {
    database: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct XmlSize {
    width: u32,
    height: u32,
    depth: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlObject {
    name: String,
    #[serde(default = "default_group_id")]
    group_id: String,
    /// Missing in files written before shape tagging existed.
    #[serde(default = "default_shape_type")]
    shape_type: String,
    #[serde(default = "default_pose")]
    pose: String,
    #[serde(default)]
    truncated: u8,
    #[serde(default)]
    difficult: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bndbox: Option<XmlBndBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    polygon: Option<XmlPointList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linestrip: Option<XmlPointList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    circle: Option<XmlCircle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<XmlLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    point: Option<XmlPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlBndBox {
    xmin: i32,
    ymin: i32,
    xmax: i32,
    ymax: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlPointList {
    points: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlCircle {
    center_x: i32,
    center_y: i32,
    other_x: i32,
    other_y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlLine {
    first_x: i32,
    first_y: i32,
    last_x: i32,
    last_y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlPoint {
    x: i32,
    y: i32,
}

fn default_group_id() -> String {
    "none".to_string()
}

fn default_shape_type() -> String {
    "rectangle".to_string()
}

fn default_pose() -> String {
    "Unspecified".to_string()
}

// ============================================================================
// Writer
// ============================================================================

/// Accumulates shapes (already converted to clamped integer coordinates)
/// and serializes the XML document.
#[derive(Debug)]
pub struct PascalVocWriter {
    image: ImageMeta,
    database: String,
    verified: bool,
    objects: Vec<XmlObject>,
}

impl PascalVocWriter {
    pub fn new(image: ImageMeta) -> Self {
        Self {
            image,
            database: "Unknown".to_string(),
            verified: false,
            objects: Vec::new(),
        }
    }

    pub fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    fn base_object(
        label: &str,
        group_id: Option<u32>,
        kind: ShapeKind,
        difficult: bool,
        truncated: bool,
    ) -> XmlObject {
        XmlObject {
            name: label.to_string(),
            group_id: group_id.map_or_else(default_group_id, |id| id.to_string()),
            shape_type: kind.as_str().to_string(),
            pose: default_pose(),
            truncated: truncated as u8,
            difficult: difficult as u8,
            bndbox: None,
            polygon: None,
            linestrip: None,
            circle: None,
            line: None,
            point: None,
        }
    }

    /// Add a rectangle from its clamped integer bounding box.
    pub fn add_bounding_box(
        &mut self,
        bbox: (i32, i32, i32, i32),
        label: &str,
        group_id: Option<u32>,
        difficult: bool,
    ) {
        let (x_min, y_min, x_max, y_max) = bbox;
        let (width, height) = (self.image.width as i32, self.image.height as i32);
        let truncated =
            y_max == height || y_min == 1 || x_max == width || x_min == 1;
        let mut object = Self::base_object(label, group_id, ShapeKind::Rectangle, difficult, truncated);
        object.bndbox = Some(XmlBndBox {
            xmin: x_min,
            ymin: y_min,
            xmax: x_max,
            ymax: y_max,
        });
        self.objects.push(object);
    }

    /// Add a non-rectangle shape from its converted integer point list
    /// (see the conversion helpers in [`crate::formats::common`]; circles
    /// expect the six-point layout).
    pub fn add_points(
        &mut self,
        kind: ShapeKind,
        points: &[[i32; 2]],
        label: &str,
        group_id: Option<u32>,
        difficult: bool,
    ) {
        let (width, height) = (self.image.width as i32, self.image.height as i32);
        let touches = |p: &[i32; 2]| p[0] == 1 || p[1] == 1 || p[0] == width || p[1] == height;
        match kind {
            ShapeKind::Polygon | ShapeKind::LineStrip => {
                let truncated = points.iter().any(touches);
                let point_str: String = points
                    .iter()
                    .map(|p| format!("({},{})", p[0], p[1]))
                    .collect();
                let mut object = Self::base_object(label, group_id, kind, difficult, truncated);
                let list = XmlPointList { points: point_str };
                if kind == ShapeKind::Polygon {
                    object.polygon = Some(list);
                } else {
                    object.linestrip = Some(list);
                }
                self.objects.push(object);
            }
            ShapeKind::Circle => {
                // Border contact is judged on the four extremal points.
                let truncated = points[2][0] == 1
                    || points[3][1] == 1
                    || points[4][0] == width
                    || points[5][1] == height;
                let mut object = Self::base_object(label, group_id, kind, difficult, truncated);
                object.circle = Some(XmlCircle {
                    center_x: points[0][0],
                    center_y: points[0][1],
                    other_x: points[1][0],
                    other_y: points[1][1],
                });
                self.objects.push(object);
            }
            ShapeKind::Line => {
                let truncated = points.iter().take(2).any(touches);
                let mut object = Self::base_object(label, group_id, kind, difficult, truncated);
                object.line = Some(XmlLine {
                    first_x: points[0][0],
                    first_y: points[0][1],
                    last_x: points[1][0],
                    last_y: points[1][1],
                });
                self.objects.push(object);
            }
            ShapeKind::Point => {
                let truncated = touches(&points[0]);
                let mut object = Self::base_object(label, group_id, kind, difficult, truncated);
                object.point = Some(XmlPoint {
                    x: points[0][0],
                    y: points[0][1],
                });
                self.objects.push(object);
            }
            ShapeKind::Rectangle => {
                log::warn!("rectangles go through add_bounding_box, not add_points");
            }
        }
    }

    /// Serialize the document, tab-indented with an XML declaration.
    pub fn to_xml_string(&self) -> Result<String, FormatError> {
        // Borrowing view over the accumulated objects, so serialization
        // does not clone them.
        #[derive(Serialize)]
        #[serde(rename = "annotation")]
        struct XmlAnnotationRef<'a> {
            #[serde(rename = "@verified", skip_serializing_if = "Option::is_none")]
            verified: Option<&'a str>,
            folder: &'a str,
            filename: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            path: Option<&'a str>,
            source: XmlSource,
            size: XmlSize,
            segmented: u8,
            #[serde(rename = "object")]
            objects: &'a [XmlObject],
        }
        let view = XmlAnnotationRef {
            verified: self.verified.then_some("yes"),
            folder: &self.image.folder,
            filename: &self.image.filename,
            path: self.image.path.as_deref(),
            source: XmlSource {
                database: self.database.clone(),
            },
            size: XmlSize {
                width: self.image.width,
                height: self.image.height,
                depth: self.image.depth,
            },
            segmented: 0,
            objects: &self.objects,
        };
        let mut body = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut body);
        serializer.indent('\t', 1);
        view.serialize(serializer)?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}"))
    }

    /// Write the document to `path`.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let xml = self.to_xml_string()?;
        std::fs::write(path, xml)?;
        log::info!(
            "wrote {} objects to {}",
            self.objects.len(),
            path.display()
        );
        Ok(())
    }
}

// ============================================================================
// Reader
// ============================================================================

/// What a parsed annotation file contains.
#[derive(Debug, Clone, PartialEq)]
pub struct VocContents {
    pub verified: bool,
    pub shapes: Vec<ShapeData>,
}

/// Parses the XML dialect back into shape descriptors.
pub struct PascalVocReader;

impl PascalVocReader {
    /// Parse annotation XML. Malformed documents return a typed error;
    /// callers decide whether that degrades to "no prior annotation".
    pub fn parse_str(content: &str) -> Result<VocContents, FormatError> {
        let annotation: XmlAnnotation = quick_xml::de::from_str(content)?;
        let verified = annotation.verified.as_deref() == Some("yes");
        let mut shapes = Vec::new();
        for object in &annotation.objects {
            shapes.push(Self::object_to_shape(object)?);
        }
        Ok(VocContents { verified, shapes })
    }

    /// Read and parse the file at `path`.
    pub fn read_file(path: &Path) -> Result<VocContents, FormatError> {
        let content = std::fs::read_to_string(path)?;
        let contents = Self::parse_str(&content)?;
        log::info!(
            "read {} shapes from {}",
            contents.shapes.len(),
            path.display()
        );
        Ok(contents)
    }

    fn object_to_shape(object: &XmlObject) -> Result<ShapeData, FormatError> {
        let kind = ShapeKind::from_str(&object.shape_type)
            .ok_or_else(|| FormatError::parse(format!("unknown shape_type '{}'", object.shape_type)))?;
        let points = match kind {
            ShapeKind::Rectangle => {
                let bndbox = object
                    .bndbox
                    .as_ref()
                    .ok_or_else(|| FormatError::missing_field("bndbox"))?;
                // Corners clockwise from top-left
                rect_corners(
                    bndbox.xmin as f32,
                    bndbox.ymin as f32,
                    bndbox.xmax as f32,
                    bndbox.ymax as f32,
                )
            }
            ShapeKind::Polygon | ShapeKind::LineStrip => {
                let list = if kind == ShapeKind::Polygon {
                    object.polygon.as_ref()
                } else {
                    object.linestrip.as_ref()
                }
                .ok_or_else(|| FormatError::missing_field(kind.as_str()))?;
                parse_point_list(&list.points)?
            }
            ShapeKind::Circle => {
                let circle = object
                    .circle
                    .as_ref()
                    .ok_or_else(|| FormatError::missing_field("circle"))?;
                vec![
                    Point::new(circle.center_x as f32, circle.center_y as f32),
                    Point::new(circle.other_x as f32, circle.other_y as f32),
                ]
            }
            ShapeKind::Line => {
                let line = object
                    .line
                    .as_ref()
                    .ok_or_else(|| FormatError::missing_field("line"))?;
                vec![
                    Point::new(line.first_x as f32, line.first_y as f32),
                    Point::new(line.last_x as f32, line.last_y as f32),
                ]
            }
            ShapeKind::Point => {
                let point = object
                    .point
                    .as_ref()
                    .ok_or_else(|| FormatError::missing_field("point"))?;
                vec![Point::new(point.x as f32, point.y as f32)]
            }
        };

        let group_id = match object.group_id.as_str() {
            "none" => None,
            other => match other.parse::<u32>() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("ignoring unparseable group_id '{other}'");
                    None
                }
            },
        };

        Ok(ShapeData {
            label: object.name.clone(),
            kind,
            points,
            group_id,
            difficult: object.difficult != 0,
        })
    }
}

/// Parse a `(x1,y1)(x2,y2)...` point string.
fn parse_point_list(s: &str) -> Result<Vec<Point>, FormatError> {
    let mut points = Vec::new();
    for chunk in s.split(')') {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        let pair = chunk
            .strip_prefix('(')
            .ok_or_else(|| FormatError::parse(format!("malformed point list '{s}'")))?;
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| FormatError::parse(format!("malformed point '{pair}'")))?;
        let x: i32 = x
            .trim()
            .parse()
            .map_err(|_| FormatError::parse(format!("bad coordinate '{x}'")))?;
        let y: i32 = y
            .trim()
            .parse()
            .map_err(|_| FormatError::parse(format!("bad coordinate '{y}'")))?;
        points.push(Point::new(x as f32, y as f32));
    }
    Ok(points)
}
