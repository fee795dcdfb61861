//! Error types for annotation format operations.

use thiserror::Error;

/// Errors that can occur while reading or writing annotation files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations. Always propagated to the caller;
    /// a failed write is never swallowed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing or serialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    /// Malformed or unexpected content in an annotation file
    #[error("parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
    },

    /// Required field is missing
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// Shape type the target format cannot represent
    #[error("unsupported shape type '{shape}' for format '{format}'")]
    UnsupportedShape {
        /// The shape type that was encountered
        shape: String,
        /// The format that cannot represent it
        format: String,
    },
}

impl FormatError {
    /// Create a parse error with a message.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an unsupported shape error.
    pub fn unsupported_shape(shape: impl Into<String>, format: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            shape: shape.into(),
            format: format.into(),
        }
    }

    /// Whether this error means "the file content was bad" rather than an
    /// I/O failure. Callers may treat bad content as an absent annotation;
    /// I/O errors must surface.
    pub fn is_recoverable_parse(&self) -> bool {
        !matches!(self, FormatError::Io(_))
    }
}
