//! Image reference parsing for the `image` entity field.
//!
//! Persisted records keep the string form (`""`, `local:<id>`, or a
//! verbatim reference); everything inside core works on `ImageRef`.

use serde_json::Value;

/// Marker prefix naming an id in the blob side table.
pub const LOCAL_IMAGE_MARKER: &str = "local:";

/// Where an entity's image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// No image.
    None,
    /// Direct reference used verbatim (URL, relative path, data URL).
    External(String),
    /// Payload stored in the blob side table under this id.
    Local(String),
}

impl ImageRef {
    /// Parses the raw field text.
    ///
    /// Everything after the marker is the blob id, empty included.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => Self::None,
            Some(value) => match value.strip_prefix(LOCAL_IMAGE_MARKER) {
                Some(id) => Self::Local(id.to_string()),
                None => Self::External(value.to_string()),
            },
        }
    }

    /// Parses a JSON field value; non-string values count as no image.
    pub fn from_field(value: Option<&Value>) -> Self {
        Self::parse(value.and_then(Value::as_str))
    }

    pub fn local(id: impl Into<String>) -> Self {
        Self::Local(id.into())
    }

    /// String stored in the record's `image` field, `None` for no image.
    pub fn to_field_text(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::External(reference) => Some(reference.clone()),
            Self::Local(id) => Some(format!("{LOCAL_IMAGE_MARKER}{id}")),
        }
    }
}
