//! Character deletion with relationship fan-out.
//!
//! # Responsibility
//! - Find relationships touching a character through the merged view.
//! - Delete them through the relationship store, then delete the character.
//!
//! # Invariants
//! - `delete_with_cascade` is not transactional: a failure partway leaves
//!   earlier relationship deletes in place.
//! - `delete_with_cascade_atomic` commits every touched key in one batch.

use crate::model::entity::{EntityKind, Record};
use crate::repo::delta_store::{DeltaStore, Dirty};
use crate::repo::kv_store::commit_writes;
use crate::repo::outcome::{StoreResult, WriteAck, WriteOutcome};
use log::info;

const SOURCE_FIELD: &str = "sourceId";
const TARGET_FIELD: &str = "targetId";

/// Coordinates deletes across the character and relationship stores.
pub struct CascadeCoordinator<'s, 'a> {
    characters: &'s DeltaStore<'a>,
    relationships: &'s DeltaStore<'a>,
}

impl<'s, 'a> CascadeCoordinator<'s, 'a> {
    pub fn new(characters: &'s DeltaStore<'a>, relationships: &'s DeltaStore<'a>) -> Self {
        debug_assert_eq!(characters.kind(), EntityKind::Character);
        debug_assert_eq!(relationships.kind(), EntityKind::Relationship);
        Self {
            characters,
            relationships,
        }
    }

    /// Merged relationships with `character_id` at either endpoint.
    pub fn related_relationships(&self, character_id: &str) -> StoreResult<Vec<Record>> {
        Ok(self
            .relationships
            .get_merged(None)?
            .into_iter()
            .filter(|relationship| touches(relationship, character_id))
            .collect())
    }

    /// Deletes a character, and its relationships when `cascade` is set.
    ///
    /// Returns the ids of the deleted relationships. Each delete is its own
    /// write; an error stops the fan-out without undoing earlier deletes.
    pub fn delete_with_cascade(
        &self,
        character_id: &str,
        cascade: bool,
    ) -> StoreResult<WriteOutcome<Vec<String>>> {
        let mut removed = Vec::new();
        let mut ack = WriteAck::Durable;

        if cascade {
            for relationship in self.related_relationships(character_id)? {
                let Some(id) = relationship.id() else {
                    continue;
                };
                let outcome = self.relationships.delete(id)?;
                ack = ack.and(outcome.ack);
                removed.push(id.to_string());
            }
        }

        let outcome = self.characters.delete(character_id)?;
        ack = ack.and(outcome.ack);

        info!(
            "event=cascade_delete module=service status={} mode=sequential character_id={} cascade={} relationships_removed={}",
            if ack.is_durable() { "ok" } else { "not_durable" },
            character_id,
            cascade,
            removed.len()
        );
        Ok(WriteOutcome::new(removed, ack))
    }

    /// Same result as `delete_with_cascade`, committed as one batch.
    ///
    /// Either every touched key is written or none is; on failure the
    /// returned ids describe what would have been removed.
    pub fn delete_with_cascade_atomic(
        &self,
        character_id: &str,
        cascade: bool,
    ) -> StoreResult<WriteOutcome<Vec<String>>> {
        let mut removed = Vec::new();
        let mut relationship_overlay = self.relationships.overlay()?;
        let mut relationship_dirty = Dirty::default();

        if cascade {
            for relationship in self.related_relationships(character_id)? {
                if let Some(id) = relationship.id() {
                    relationship_dirty =
                        relationship_dirty.union(relationship_overlay.stage_delete(id));
                    removed.push(id.to_string());
                }
            }
        }

        let mut character_overlay = self.characters.overlay()?;
        let character_dirty = character_overlay.stage_delete(character_id);

        let mut writes = self
            .relationships
            .overlay_writes(&relationship_overlay, relationship_dirty)?;
        if let Some(blobs) = self.characters.blobs() {
            writes.extend(blobs.stage_delete(character_id)?);
        }
        writes.extend(
            self.characters
                .overlay_writes(&character_overlay, character_dirty)?,
        );

        let ack = commit_writes(self.characters.kv(), &writes);
        info!(
            "event=cascade_delete module=service status={} mode=atomic character_id={} cascade={} relationships_removed={} keys={}",
            if ack.is_durable() { "ok" } else { "not_durable" },
            character_id,
            cascade,
            removed.len(),
            writes.len()
        );
        Ok(WriteOutcome::new(removed, ack))
    }
}

fn touches(relationship: &Record, character_id: &str) -> bool {
    relationship.str_field(SOURCE_FIELD) == Some(character_id)
        || relationship.str_field(TARGET_FIELD) == Some(character_id)
}
