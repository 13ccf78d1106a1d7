//! Application context holding one overlay store per entity kind.
//!
//! # Responsibility
//! - Construct every `DeltaStore` over one injected key-value store and
//!   base catalog.
//! - Offer the cross-kind use-cases callers need: cascading character
//!   delete, image URL resolution, stats and snapshots.
//!
//! # Invariants
//! - All stores share the same `KvStore`, namespace and catalog.

use crate::catalog::BaseCatalogLoader;
use crate::model::entity::{EntityKind, Record};
use crate::model::image::ImageRef;
use crate::repo::delta_store::DeltaStore;
use crate::repo::kv_store::KvStore;
use crate::repo::outcome::{StoreResult, WriteAck, WriteOutcome};
use crate::service::cascade::CascadeCoordinator;
use crate::service::stats::{foreshadowing_stats, project_stats, ForeshadowingStats, ProjectStats};
use std::collections::BTreeMap;

/// Merged views of every kind for one scope.
pub type Snapshot = BTreeMap<EntityKind, Vec<Record>>;

pub struct NarrativeContext<'a> {
    catalog: &'a BaseCatalogLoader,
    characters: DeltaStore<'a>,
    events: DeltaStore<'a>,
    timeline: DeltaStore<'a>,
    synopses: DeltaStore<'a>,
    foreshadowing: DeltaStore<'a>,
    relationships: DeltaStore<'a>,
}

impl<'a> NarrativeContext<'a> {
    /// Builds stores for every kind; `namespace` prefixes all overlay keys.
    pub fn new(
        kv: &'a dyn KvStore,
        catalog: &'a BaseCatalogLoader,
        namespace: Option<&str>,
    ) -> Self {
        let store = |kind| DeltaStore::for_kind(kind, kv, catalog, namespace);
        Self {
            catalog,
            characters: store(EntityKind::Character),
            events: store(EntityKind::Event),
            timeline: store(EntityKind::Timeline),
            synopses: store(EntityKind::Synopsis),
            foreshadowing: store(EntityKind::Foreshadowing),
            relationships: store(EntityKind::Relationship),
        }
    }

    pub fn catalog(&self) -> &'a BaseCatalogLoader {
        self.catalog
    }

    pub fn store(&self, kind: EntityKind) -> &DeltaStore<'a> {
        match kind {
            EntityKind::Character => &self.characters,
            EntityKind::Event => &self.events,
            EntityKind::Timeline => &self.timeline,
            EntityKind::Synopsis => &self.synopses,
            EntityKind::Foreshadowing => &self.foreshadowing,
            EntityKind::Relationship => &self.relationships,
        }
    }

    pub fn characters(&self) -> &DeltaStore<'a> {
        &self.characters
    }

    pub fn events(&self) -> &DeltaStore<'a> {
        &self.events
    }

    pub fn timeline(&self) -> &DeltaStore<'a> {
        &self.timeline
    }

    pub fn synopses(&self) -> &DeltaStore<'a> {
        &self.synopses
    }

    pub fn foreshadowing(&self) -> &DeltaStore<'a> {
        &self.foreshadowing
    }

    pub fn relationships(&self) -> &DeltaStore<'a> {
        &self.relationships
    }

    pub fn cascade(&self) -> CascadeCoordinator<'_, 'a> {
        CascadeCoordinator::new(&self.characters, &self.relationships)
    }

    /// Deletes a character, fanning out to its relationships when asked.
    pub fn delete_character(
        &self,
        character_id: &str,
        cascade: bool,
    ) -> StoreResult<WriteOutcome<Vec<String>>> {
        self.cascade().delete_with_cascade(character_id, cascade)
    }

    /// Relationships touching `character_id` in the merged view.
    pub fn character_relationships(&self, character_id: &str) -> StoreResult<Vec<Record>> {
        self.cascade().related_relationships(character_id)
    }

    /// Displayable image reference of `record`.
    ///
    /// Kinds without an image table still pass external references through;
    /// their local references resolve to `None`.
    pub fn image_url(&self, kind: EntityKind, record: &Record) -> StoreResult<Option<String>> {
        match (self.store(kind).blobs(), record.image_ref()) {
            (Some(blobs), image) => blobs.resolve_ref(&image),
            (None, ImageRef::External(reference)) => Ok(Some(reference)),
            (None, _) => Ok(None),
        }
    }

    /// Merged views of every kind for `scope`.
    pub fn snapshot(&self, scope: Option<&str>) -> StoreResult<Snapshot> {
        EntityKind::ALL
            .into_iter()
            .map(|kind| -> StoreResult<(EntityKind, Vec<Record>)> {
                Ok((kind, self.store(kind).get_merged(scope)?))
            })
            .collect()
    }

    pub fn project_stats(&self, project_id: &str) -> StoreResult<ProjectStats> {
        let characters = self.characters.get_merged(Some(project_id))?;
        let events = self.events.get_merged(Some(project_id))?;
        Ok(project_stats(&characters, &events))
    }

    pub fn foreshadowing_stats(&self, project_id: Option<&str>) -> StoreResult<ForeshadowingStats> {
        let threads = self.foreshadowing.get_merged(project_id)?;
        Ok(foreshadowing_stats(&threads))
    }

    /// Resets every kind's overlay.
    pub fn clear_all(&self) -> WriteAck {
        EntityKind::ALL
            .into_iter()
            .fold(WriteAck::Durable, |ack, kind| ack.and(self.store(kind).clear_all()))
    }
}
