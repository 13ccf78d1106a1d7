//! Entity kinds and the record shape used by merge.
//!
//! # Responsibility
//! - Map each `EntityKind` to its id prefix, storage name and base document.
//! - Provide field accessors and shallow patch semantics for `Record`.
//!
//! # Invariants
//! - `Record::apply_patch` overwrites top-level fields only; nested objects
//!   are replaced, never deep-merged.

use crate::model::image::ImageRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object fields of one entity or one patch.
pub type Fields = Map<String, Value>;

pub const ID_FIELD: &str = "id";
/// Scope field used to partition entities by project.
pub const SCOPE_FIELD: &str = "projectId";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const IMAGE_FIELD: &str = "image";

/// Every entity kind managed by the overlay core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Event,
    /// Timeline entries; the only kind with a user-defined order override.
    Timeline,
    Synopsis,
    /// Foreshadowing threads.
    Foreshadowing,
    /// Character-to-character links via `sourceId`/`targetId`.
    Relationship,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Character,
        EntityKind::Event,
        EntityKind::Timeline,
        EntityKind::Synopsis,
        EntityKind::Foreshadowing,
        EntityKind::Relationship,
    ];

    /// Name used in overlay storage keys (`<name>_created`, ...).
    pub fn storage_name(self) -> &'static str {
        match self {
            Self::Character => "characters",
            Self::Event => "events",
            Self::Timeline => "timeline",
            Self::Synopsis => "synopsis",
            Self::Foreshadowing => "foreshadowing",
            Self::Relationship => "relationships",
        }
    }

    /// Prefix of ids issued for locally created records.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Character => "char",
            Self::Event => "event",
            Self::Timeline => "time",
            Self::Synopsis => "syn",
            Self::Foreshadowing => "fore",
            Self::Relationship => "rel",
        }
    }

    /// Base dataset document holding this kind's collection.
    pub fn document(self) -> &'static str {
        match self {
            Self::Character => "characters.json",
            Self::Event => "events.json",
            Self::Timeline => "timeline.json",
            Self::Synopsis => "synopsis.json",
            Self::Foreshadowing => "foreshadowing.json",
            Self::Relationship => "relationships.json",
        }
    }

    /// Top-level key of the collection inside `document()`.
    pub fn collection_key(self) -> &'static str {
        match self {
            Self::Character => "characters",
            Self::Event => "events",
            Self::Timeline => "timeline",
            Self::Synopsis => "synopses",
            Self::Foreshadowing => "foreshadowing",
            Self::Relationship => "relationships",
        }
    }

    /// Whether records of this kind may point at an inline image blob.
    pub fn has_images(self) -> bool {
        matches!(self, Self::Character | Self::Event)
    }

    /// Whether merged views of this kind honor a saved order override.
    pub fn has_order(self) -> bool {
        matches!(self, Self::Timeline)
    }

    /// Numeric field the base collection is sorted by on load, if any.
    pub fn base_sort_field(self) -> Option<&'static str> {
        match self {
            Self::Timeline | Self::Synopsis => Some("order"),
            _ => None,
        }
    }

    /// Whether `create` keeps a caller-supplied `id` instead of issuing one.
    pub fn accepts_caller_id(self) -> bool {
        matches!(self, Self::Synopsis)
    }

    /// Parses a storage name or snake_case kind name.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| {
            kind.storage_name() == normalized || kind.label() == normalized
        })
    }

    fn label(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Event => "event",
            Self::Timeline => "timeline",
            Self::Synopsis => "synopsis",
            Self::Foreshadowing => "foreshadowing",
            Self::Relationship => "relationship",
        }
    }
}

/// One entity as a JSON object.
///
/// Base documents and local overlays share this shape, so merge never needs
/// to know kind-specific fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Fields);

impl Record {
    pub fn new(fields: Fields) -> Self {
        Self(fields)
    }

    /// Wraps a JSON value; returns `None` for anything but an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field(ID_FIELD)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.str_field(SCOPE_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns true when no scope is requested or `projectId` matches it.
    pub fn in_scope(&self, scope: Option<&str>) -> bool {
        match scope {
            Some(project_id) => self.project_id() == Some(project_id),
            None => true,
        }
    }

    /// Overwrites top-level fields with the ones present in `patch`.
    pub fn apply_patch(&mut self, patch: &Fields) {
        for (field, value) in patch {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// Parsed form of the `image` field.
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::from_field(self.0.get(IMAGE_FIELD))
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn into_fields(self) -> Fields {
        self.0
    }
}

impl From<Fields> for Record {
    fn from(value: Fields) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, Record};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).expect("object literal")
    }

    #[test]
    fn apply_patch_overwrites_top_level_fields_only() {
        let mut base = record(json!({
            "id": "c1",
            "name": "Mira",
            "traits": {"brave": true, "loyal": true}
        }));
        let patch = json!({"traits": {"brave": false}, "age": 31});

        base.apply_patch(patch.as_object().expect("object"));

        assert_eq!(base.str_field("name"), Some("Mira"));
        assert_eq!(base.get("age"), Some(&json!(31)));
        assert_eq!(base.get("traits"), Some(&json!({"brave": false})));
    }

    #[test]
    fn in_scope_matches_project_id_or_everything() {
        let scoped = record(json!({"id": "e1", "projectId": "p1"}));
        let unscoped = record(json!({"id": "e2"}));

        assert!(scoped.in_scope(None));
        assert!(scoped.in_scope(Some("p1")));
        assert!(!scoped.in_scope(Some("p2")));
        assert!(!unscoped.in_scope(Some("p1")));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Record::from_value(json!(["a"])).is_none());
        assert!(Record::from_value(json!("id")).is_none());
    }

    #[test]
    fn kind_parse_accepts_storage_and_singular_names() {
        assert_eq!(EntityKind::parse("characters"), Some(EntityKind::Character));
        assert_eq!(EntityKind::parse(" Relationship "), Some(EntityKind::Relationship));
        assert_eq!(EntityKind::parse("synopsis"), Some(EntityKind::Synopsis));
        assert_eq!(EntityKind::parse("chapters"), None);
    }
}
