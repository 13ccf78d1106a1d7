//! Cached base catalog loader.
//!
//! # Responsibility
//! - Parse each base document at most once per successful fetch.
//! - Slice cached documents into per-kind, per-project record lists.
//!
//! # Invariants
//! - Only successful loads are cached; a failure is retried by the next call.
//! - Collections of kinds with a base sort field are stably sorted by it.

use crate::catalog::source::{CatalogSource, LoadError};
use crate::model::entity::{EntityKind, Record};
use log::{info, warn};
use serde_json::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

const PROJECTS_DOCUMENT: &str = "projects.json";
const SYNOPSIS_TEMPLATES_DOCUMENT: &str = "synopsis_templates.json";

/// Loads base documents through a `CatalogSource` and caches them.
///
/// Single-threaded: the cache uses `RefCell`, so the loader is `!Sync`.
pub struct BaseCatalogLoader {
    source: Box<dyn CatalogSource>,
    cache: RefCell<HashMap<String, Rc<Value>>>,
}

impl BaseCatalogLoader {
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the parsed document, fetching it on first use.
    ///
    /// # Errors
    /// - `LoadError` when the source cannot provide or parse the document.
    pub fn load_document(&self, document: &str) -> Result<Rc<Value>, LoadError> {
        if let Some(cached) = self.cache.borrow().get(document) {
            return Ok(Rc::clone(cached));
        }

        let started_at = Instant::now();
        let parsed = self
            .source
            .fetch(document)
            .and_then(|text| {
                serde_json::from_str::<Value>(&text).map_err(|source| LoadError::Parse {
                    document: document.to_string(),
                    source,
                })
            })
            .map_err(|err| {
                warn!(
                    "event=catalog_load module=catalog status=error source={} document={} duration_ms={} error={}",
                    self.source.describe(),
                    document,
                    started_at.elapsed().as_millis(),
                    err
                );
                err
            })?;

        info!(
            "event=catalog_load module=catalog status=ok source={} document={} duration_ms={}",
            self.source.describe(),
            document,
            started_at.elapsed().as_millis()
        );
        let parsed = Rc::new(parsed);
        self.cache
            .borrow_mut()
            .insert(document.to_string(), Rc::clone(&parsed));
        Ok(parsed)
    }

    /// Returns the full base collection for `kind`.
    ///
    /// A document without the kind's collection key yields an empty list.
    pub fn load(&self, kind: EntityKind) -> Result<Vec<Record>, LoadError> {
        let document = self.load_document(kind.document())?;
        let mut records = records_under(&document, kind.collection_key());
        if let Some(field) = kind.base_sort_field() {
            records.sort_by(|left, right| compare_by_number(left, right, field));
        }
        Ok(records)
    }

    /// Returns base records of `kind` in `scope`, or all of them for `None`.
    ///
    /// Load failures are logged and degrade to an empty collection.
    pub fn get_by_scope(&self, kind: EntityKind, scope: Option<&str>) -> Vec<Record> {
        match self.load(kind) {
            Ok(records) => records
                .into_iter()
                .filter(|record| record.in_scope(scope))
                .collect(),
            Err(err) => {
                warn!(
                    "event=catalog_fallback module=catalog status=error kind={} fallback=empty error_code={}",
                    kind.storage_name(),
                    load_error_code(&err)
                );
                Vec::new()
            }
        }
    }

    /// Returns whether `document` is currently cached.
    pub fn is_cached(&self, document: &str) -> bool {
        self.cache.borrow().contains_key(document)
    }

    /// Drops every cached document.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Relationship type vocabulary (`relationshipTypes`).
    pub fn relationship_types(&self) -> Vec<Value> {
        self.taxonomy(EntityKind::Relationship.document(), "relationshipTypes")
    }

    /// Foreshadowing type vocabulary (`foreshadowingTypes`).
    pub fn foreshadowing_types(&self) -> Vec<Value> {
        self.taxonomy(EntityKind::Foreshadowing.document(), "foreshadowingTypes")
    }

    /// Foreshadowing status vocabulary (`statusTypes`).
    pub fn foreshadowing_status_types(&self) -> Vec<Value> {
        self.taxonomy(EntityKind::Foreshadowing.document(), "statusTypes")
    }

    pub fn projects(&self) -> Vec<Record> {
        self.auxiliary(PROJECTS_DOCUMENT, "projects", None)
    }

    /// First project flagged `active`, else the first project.
    pub fn active_project(&self) -> Option<Record> {
        let projects = self.projects();
        projects
            .iter()
            .find(|project| project.get("active").and_then(Value::as_bool) == Some(true))
            .or_else(|| projects.first())
            .cloned()
    }

    pub fn synopsis_templates(&self, scope: Option<&str>) -> Vec<Record> {
        self.auxiliary(SYNOPSIS_TEMPLATES_DOCUMENT, "templates", scope)
    }

    pub fn preset_synopses(&self, scope: Option<&str>) -> Vec<Record> {
        self.auxiliary(SYNOPSIS_TEMPLATES_DOCUMENT, "presetSynopses", scope)
    }

    fn auxiliary(&self, document: &str, key: &str, scope: Option<&str>) -> Vec<Record> {
        match self.load_document(document) {
            Ok(parsed) => records_under(&parsed, key)
                .into_iter()
                .filter(|record| record.in_scope(scope))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn taxonomy(&self, document: &str, key: &str) -> Vec<Value> {
        self.load_document(document)
            .ok()
            .and_then(|parsed| parsed.get(key).and_then(Value::as_array).cloned())
            .unwrap_or_default()
    }
}

fn records_under(document: &Value, key: &str) -> Vec<Record> {
    let Some(items) = document.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };

    let records = items
        .iter()
        .cloned()
        .filter_map(Record::from_value)
        .collect::<Vec<_>>();
    if records.len() != items.len() {
        warn!(
            "event=catalog_skip module=catalog status=error key={} skipped={}",
            key,
            items.len() - records.len()
        );
    }
    records
}

// Records without a numeric sort field go last, keeping their relative order.
fn compare_by_number(left: &Record, right: &Record, field: &str) -> Ordering {
    let left = left.get(field).and_then(Value::as_f64);
    let right = right.get(field).and_then(Value::as_f64);
    match (left, right) {
        (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn load_error_code(err: &LoadError) -> &'static str {
    match err {
        LoadError::Io { .. } => "catalog_io_failed",
        LoadError::Missing { .. } => "catalog_missing",
        LoadError::Parse { .. } => "catalog_parse_failed",
    }
}
