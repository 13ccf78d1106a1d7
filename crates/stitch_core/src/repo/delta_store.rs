//! Generic created/updated/deleted overlay over one base collection.
//!
//! # Responsibility
//! - Apply create/update/delete for one `EntityKind` without touching the
//!   base dataset.
//! - Compute the merged view: base minus tombstones, patched, then local
//!   creations in creation order.
//!
//! # Invariants
//! - Created records are mutated or removed in place; their ids never
//!   enter `updated` or `deleted`.
//! - `deleted` holds no duplicates, and deleting an id drops its pending
//!   patch.
//! - Patches never change a record's `id`.
//! - Merging the same persisted overlay twice yields identical views.

use crate::catalog::BaseCatalogLoader;
use crate::model::entity::{EntityKind, Fields, Record, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use crate::model::id::{now_timestamp, IdentifierIssuer};
use crate::repo::blob_table::BlobSideTable;
use crate::repo::kv_store::{encode_write, persist_writes, read_json, KvStore, KvWrite};
use crate::repo::order_override::OrderOverride;
use crate::repo::outcome::{StoreResult, WriteAck, WriteOutcome};
use log::info;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Key holding the timeline order override.
pub const TIMELINE_ORDER_KEY: &str = "timeline_order";

/// Storage keys of one kind's overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayKeys {
    pub created: String,
    pub updated: String,
    pub deleted: String,
    /// Present only for kinds with images.
    pub images: Option<String>,
}

impl OverlayKeys {
    /// Builds `<kind>_created`-style keys, optionally prefixed `<namespace>_`.
    pub fn for_kind(kind: EntityKind, namespace: Option<&str>) -> Self {
        let name = kind.storage_name();
        Self {
            created: namespaced(namespace, &format!("{name}_created")),
            updated: namespaced(namespace, &format!("{name}_updated")),
            deleted: namespaced(namespace, &format!("{name}_deleted")),
            images: kind
                .has_images()
                .then(|| namespaced(namespace, &format!("{name}_images"))),
        }
    }
}

/// Key of the timeline order override under `namespace`.
pub fn timeline_order_key(namespace: Option<&str>) -> String {
    namespaced(namespace, TIMELINE_ORDER_KEY)
}

fn namespaced(namespace: Option<&str>, key: &str) -> String {
    match namespace {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}_{key}"),
        _ => key.to_string(),
    }
}

/// Which overlay structures a mutation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dirty {
    pub created: bool,
    pub updated: bool,
    pub deleted: bool,
}

impl Dirty {
    pub fn union(self, other: Dirty) -> Dirty {
        Dirty {
            created: self.created || other.created,
            updated: self.updated || other.updated,
            deleted: self.deleted || other.deleted,
        }
    }

    pub fn is_clean(self) -> bool {
        !(self.created || self.updated || self.deleted)
    }
}

/// In-memory copy of one kind's persisted overlay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Locally authored records, in creation order.
    pub created: Vec<Record>,
    /// Base id -> accumulated patch (with `updatedAt`).
    pub updated: BTreeMap<String, Fields>,
    /// Tombstoned base ids, in deletion order.
    pub deleted: Vec<String>,
}

impl Overlay {
    /// Merges this overlay onto `base`, keeping only records in `scope`.
    ///
    /// `base` is expected to be scoped already; local creations are
    /// filtered here.
    pub fn merge(&self, base: Vec<Record>, scope: Option<&str>) -> Vec<Record> {
        let tombstones = self.deleted.iter().map(String::as_str).collect::<HashSet<_>>();

        let mut merged = base
            .into_iter()
            .filter(|record| record.id().map_or(true, |id| !tombstones.contains(id)))
            .map(|mut record| {
                if let Some(patch) = record.id().and_then(|id| self.updated.get(id)) {
                    record.apply_patch(patch);
                }
                record
            })
            .collect::<Vec<_>>();

        merged.extend(
            self.created
                .iter()
                .filter(|record| record.in_scope(scope))
                .cloned(),
        );
        merged
    }

    pub fn created_index(&self, id: &str) -> Option<usize> {
        self.created.iter().position(|record| record.id() == Some(id))
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.deleted.iter().any(|deleted| deleted == id)
    }

    /// Applies a delete to this overlay and reports what changed.
    pub fn stage_delete(&mut self, id: &str) -> Dirty {
        if let Some(index) = self.created_index(id) {
            self.created.remove(index);
            return Dirty {
                created: true,
                ..Dirty::default()
            };
        }

        let mut dirty = Dirty::default();
        if !self.is_tombstoned(id) {
            self.deleted.push(id.to_string());
            dirty.deleted = true;
        }
        if self.updated.remove(id).is_some() {
            dirty.updated = true;
        }
        dirty
    }
}

/// Overlay store for one entity kind.
///
/// Blob and order extensions are attached by composition; `for_kind`
/// attaches the ones the kind declares.
pub struct DeltaStore<'a> {
    kind: EntityKind,
    keys: OverlayKeys,
    kv: &'a dyn KvStore,
    catalog: &'a BaseCatalogLoader,
    ids: IdentifierIssuer,
    blobs: Option<BlobSideTable<'a>>,
    order: Option<OrderOverride<'a>>,
}

impl<'a> DeltaStore<'a> {
    /// Creates a bare store with no blob or order extension.
    pub fn new(
        kind: EntityKind,
        kv: &'a dyn KvStore,
        catalog: &'a BaseCatalogLoader,
        namespace: Option<&str>,
    ) -> Self {
        Self {
            kind,
            keys: OverlayKeys::for_kind(kind, namespace),
            kv,
            catalog,
            ids: IdentifierIssuer::new(),
            blobs: None,
            order: None,
        }
    }

    /// Creates a store with the extensions `kind` declares.
    pub fn for_kind(
        kind: EntityKind,
        kv: &'a dyn KvStore,
        catalog: &'a BaseCatalogLoader,
        namespace: Option<&str>,
    ) -> Self {
        let mut store = Self::new(kind, kv, catalog, namespace);
        if let Some(images_key) = store.keys.images.clone() {
            store = store.with_blobs(BlobSideTable::new(kv, images_key));
        }
        if kind.has_order() {
            store = store.with_order(OrderOverride::new(kv, timeline_order_key(namespace)));
        }
        store
    }

    pub fn with_blobs(mut self, blobs: BlobSideTable<'a>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn with_order(mut self, order: OrderOverride<'a>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn keys(&self) -> &OverlayKeys {
        &self.keys
    }

    pub fn blobs(&self) -> Option<&BlobSideTable<'a>> {
        self.blobs.as_ref()
    }

    pub fn order(&self) -> Option<&OrderOverride<'a>> {
        self.order.as_ref()
    }

    pub(crate) fn kv(&self) -> &'a dyn KvStore {
        self.kv
    }

    /// Reads the persisted overlay; absent keys are empty.
    pub fn overlay(&self) -> StoreResult<Overlay> {
        Ok(Overlay {
            created: read_json(self.kv, &self.keys.created)?,
            updated: read_json(self.kv, &self.keys.updated)?,
            deleted: read_json(self.kv, &self.keys.deleted)?,
        })
    }

    /// Appends a new locally authored record.
    ///
    /// A fresh id is issued unless the kind accepts caller ids and `data`
    /// carries a non-empty one. `createdAt` is always stamped.
    pub fn create(&self, data: Fields) -> StoreResult<WriteOutcome<Record>> {
        let mut overlay = self.overlay()?;

        let mut record = Record::new(data);
        let caller_id = self
            .kind
            .accepts_caller_id()
            .then(|| record.id().filter(|id| !id.is_empty()).map(str::to_string))
            .flatten();
        let id = caller_id.unwrap_or_else(|| self.ids.next(self.kind.id_prefix()));
        record.set(ID_FIELD, id.as_str());
        record.set(CREATED_AT_FIELD, now_timestamp());

        overlay.created.push(record.clone());
        let ack = self.persist(
            &overlay,
            Dirty {
                created: true,
                ..Dirty::default()
            },
        )?;
        self.log_write("overlay_create", &id, "created", &ack);
        Ok(WriteOutcome::new(record, ack))
    }

    /// Patches a record and returns its merged form.
    ///
    /// Local creations are patched in place. Base ids accumulate the patch
    /// (shallow) in `updated` with a fresh `updatedAt`. The returned record
    /// is `None` when the id surfaces in no merged view: a tombstoned id or
    /// an id unknown to both overlay and base, whose patch stays inert.
    pub fn update(&self, id: &str, patch: Fields) -> StoreResult<WriteOutcome<Option<Record>>> {
        let mut overlay = self.overlay()?;
        let patch = without_id(patch);

        if let Some(index) = overlay.created_index(id) {
            overlay.created[index].apply_patch(&patch);
            let record = overlay.created[index].clone();
            let ack = self.persist(
                &overlay,
                Dirty {
                    created: true,
                    ..Dirty::default()
                },
            )?;
            self.log_write("overlay_update", id, "created", &ack);
            return Ok(WriteOutcome::new(Some(record), ack));
        }

        let entry = overlay.updated.entry(id.to_string()).or_default();
        entry.extend(patch);
        entry.insert(UPDATED_AT_FIELD.to_string(), Value::from(now_timestamp()));

        let merged = self.merged_base_record(&overlay, id);
        let ack = self.persist(
            &overlay,
            Dirty {
                updated: true,
                ..Dirty::default()
            },
        )?;
        self.log_write("overlay_update", id, "base", &ack);
        Ok(WriteOutcome::new(merged, ack))
    }

    /// Removes a record from every merged view.
    ///
    /// Local creations are spliced out; anything else is tombstoned and
    /// its pending patch dropped. Unknown ids succeed. The record's image
    /// blob, if the kind keeps one, is removed first.
    pub fn delete(&self, id: &str) -> StoreResult<WriteOutcome<()>> {
        let mut ack = match &self.blobs {
            Some(blobs) => blobs.delete(id)?,
            None => WriteAck::Durable,
        };

        let mut overlay = self.overlay()?;
        let dirty = overlay.stage_delete(id);
        ack = ack.and(self.persist(&overlay, dirty)?);

        let path = if dirty.created { "created" } else { "base" };
        self.log_write("overlay_delete", id, path, &ack);
        Ok(WriteOutcome::new((), ack))
    }

    /// Returns the merged view, optionally restricted to one project.
    ///
    /// Kinds with an order override apply it when a scope is given.
    pub fn get_merged(&self, scope: Option<&str>) -> StoreResult<Vec<Record>> {
        let overlay = self.overlay()?;
        let base = self.catalog.get_by_scope(self.kind, scope);
        let merged = overlay.merge(base, scope);

        match (&self.order, scope) {
            (Some(order), Some(scope)) => order.apply_order(merged, scope),
            _ => Ok(merged),
        }
    }

    /// Looks an id up in the unscoped merged view.
    pub fn get_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .get_merged(None)?
            .into_iter()
            .find(|record| record.id() == Some(id)))
    }

    /// Drops every overlay structure of this kind, extensions included.
    pub fn clear_all(&self) -> WriteAck {
        let writes = [&self.keys.created, &self.keys.updated, &self.keys.deleted]
            .into_iter()
            .map(|key| KvWrite::Remove { key: key.clone() })
            .collect::<Vec<_>>();
        let mut ack = persist_writes(self.kv, writes);
        if let Some(blobs) = &self.blobs {
            ack = ack.and(blobs.clear());
        }
        if let Some(order) = &self.order {
            ack = ack.and(order.clear());
        }

        info!(
            "event=overlay_clear module=repo status={} kind={}",
            ack_status(&ack),
            self.kind.storage_name()
        );
        ack
    }

    /// Encodes the structures marked in `dirty` as pending writes.
    pub(crate) fn overlay_writes(&self, overlay: &Overlay, dirty: Dirty) -> StoreResult<Vec<KvWrite>> {
        let mut writes = Vec::new();
        if dirty.created {
            writes.push(encode_write(&self.keys.created, &overlay.created)?);
        }
        if dirty.updated {
            writes.push(encode_write(&self.keys.updated, &overlay.updated)?);
        }
        if dirty.deleted {
            writes.push(encode_write(&self.keys.deleted, &overlay.deleted)?);
        }
        Ok(writes)
    }

    fn persist(&self, overlay: &Overlay, dirty: Dirty) -> StoreResult<WriteAck> {
        let writes = self.overlay_writes(overlay, dirty)?;
        Ok(persist_writes(self.kv, writes))
    }

    fn merged_base_record(&self, overlay: &Overlay, id: &str) -> Option<Record> {
        if overlay.is_tombstoned(id) {
            return None;
        }
        let mut record = self
            .catalog
            .get_by_scope(self.kind, None)
            .into_iter()
            .find(|record| record.id() == Some(id))?;
        if let Some(patch) = overlay.updated.get(id) {
            record.apply_patch(patch);
        }
        Some(record)
    }

    fn log_write(&self, event: &str, id: &str, path: &str, ack: &WriteAck) {
        info!(
            "event={event} module=repo status={} kind={} id={id} path={path}",
            ack_status(ack),
            self.kind.storage_name()
        );
    }
}

fn without_id(mut patch: Fields) -> Fields {
    patch.remove(ID_FIELD);
    patch
}

fn ack_status(ack: &WriteAck) -> &'static str {
    if ack.is_durable() {
        "ok"
    } else {
        "not_durable"
    }
}

#[cfg(test)]
mod tests {
    use super::{Overlay, OverlayKeys};
    use crate::model::entity::{EntityKind, Record};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).expect("object literal")
    }

    #[test]
    fn keys_follow_kind_layout_and_namespace() {
        let plain = OverlayKeys::for_kind(EntityKind::Character, None);
        assert_eq!(plain.created, "characters_created");
        assert_eq!(plain.images.as_deref(), Some("characters_images"));

        let namespaced = OverlayKeys::for_kind(EntityKind::Relationship, Some("stitch"));
        assert_eq!(namespaced.deleted, "stitch_relationships_deleted");
        assert_eq!(namespaced.images, None);
    }

    #[test]
    fn merge_filters_patches_then_appends_scoped_creations() {
        let mut overlay = Overlay::default();
        overlay.deleted.push("b2".to_string());
        overlay.updated.insert(
            "b1".to_string(),
            json!({"name": "patched"}).as_object().cloned().unwrap_or_default(),
        );
        overlay.created.push(record(json!({"id": "n1", "projectId": "p1"})));
        overlay.created.push(record(json!({"id": "n2", "projectId": "p2"})));

        let base = vec![
            record(json!({"id": "b1", "projectId": "p1", "name": "orig", "age": 3})),
            record(json!({"id": "b2", "projectId": "p1"})),
        ];
        let merged = overlay.merge(base, Some("p1"));

        let ids = merged.iter().filter_map(Record::id).collect::<Vec<_>>();
        assert_eq!(ids, ["b1", "n1"]);
        assert_eq!(merged[0].str_field("name"), Some("patched"));
        assert_eq!(merged[0].get("age"), Some(&json!(3)));
    }

    #[test]
    fn stage_delete_on_creation_leaves_no_tombstone() {
        let mut overlay = Overlay::default();
        overlay.created.push(record(json!({"id": "n1"})));

        let dirty = overlay.stage_delete("n1");

        assert!(dirty.created && !dirty.deleted && !dirty.updated);
        assert!(overlay.created.is_empty());
        assert!(overlay.deleted.is_empty());
    }

    #[test]
    fn stage_delete_on_base_id_is_idempotent_and_drops_patch() {
        let mut overlay = Overlay::default();
        overlay.updated.insert("b1".to_string(), Default::default());

        let first = overlay.stage_delete("b1");
        let second = overlay.stage_delete("b1");

        assert!(first.deleted && first.updated);
        assert!(second.is_clean());
        assert_eq!(overlay.deleted, ["b1"]);
        assert!(overlay.updated.is_empty());
    }
}
