//! Inline image payloads stored beside, not inside, entity records.
//!
//! # Responsibility
//! - Map entity ids to image payloads (typically data URLs).
//! - Resolve an entity's `image` field through `ImageRef`.
//!
//! # Invariants
//! - No payload size limit is applied here; upload limits belong to the
//!   caller. Only the store quota can reject a payload.

use crate::model::entity::Record;
use crate::model::image::ImageRef;
use crate::repo::kv_store::{encode_write, persist_writes, read_json, KvStore, KvWrite};
use crate::repo::outcome::{StoreResult, WriteAck};
use std::collections::BTreeMap;

type BlobMap = BTreeMap<String, String>;

/// Side table of image payloads for one entity kind.
pub struct BlobSideTable<'a> {
    kv: &'a dyn KvStore,
    key: String,
}

impl<'a> BlobSideTable<'a> {
    pub fn new(kv: &'a dyn KvStore, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stores or replaces the payload for `id`.
    pub fn save(&self, id: &str, payload: impl Into<String>) -> StoreResult<WriteAck> {
        let mut blobs = self.load()?;
        blobs.insert(id.to_string(), payload.into());
        let write = encode_write(&self.key, &blobs)?;
        Ok(persist_writes(self.kv, vec![write]))
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<String>> {
        Ok(self.load()?.remove(id))
    }

    /// Removes the payload for `id`; an absent id writes nothing.
    pub fn delete(&self, id: &str) -> StoreResult<WriteAck> {
        let writes = self.stage_delete(id)?.into_iter().collect();
        Ok(persist_writes(self.kv, writes))
    }

    /// Resolves a record's image to a displayable reference.
    ///
    /// Local references resolve through this table (a missing payload gives
    /// `None`); external ones are returned verbatim.
    pub fn resolve(&self, record: &Record) -> StoreResult<Option<String>> {
        self.resolve_ref(&record.image_ref())
    }

    pub fn resolve_ref(&self, image: &ImageRef) -> StoreResult<Option<String>> {
        match image {
            ImageRef::None => Ok(None),
            ImageRef::External(reference) => Ok(Some(reference.clone())),
            ImageRef::Local(id) => self.get(id),
        }
    }

    /// Drops every payload in this table.
    pub fn clear(&self) -> WriteAck {
        persist_writes(
            self.kv,
            vec![KvWrite::Remove {
                key: self.key.clone(),
            }],
        )
    }

    /// Computes the write that removes `id`, if it is present.
    pub(crate) fn stage_delete(&self, id: &str) -> StoreResult<Option<KvWrite>> {
        let mut blobs = self.load()?;
        if blobs.remove(id).is_none() {
            return Ok(None);
        }
        encode_write(&self.key, &blobs).map(Some)
    }

    fn load(&self) -> StoreResult<BlobMap> {
        read_json(self.kv, &self.key)
    }
}
