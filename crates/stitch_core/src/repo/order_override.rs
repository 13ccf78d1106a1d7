//! User-defined ordering applied on top of merged timeline views.
//!
//! # Invariants
//! - `save_order` replaces the whole sequence of a scope.
//! - Ordered ids sort by their first position in the saved sequence;
//!   everything else follows in its original relative order.

use crate::model::entity::Record;
use crate::repo::kv_store::{encode_write, persist_writes, read_json, KvStore, KvWrite};
use crate::repo::outcome::{StoreResult, WriteAck};
use std::collections::{BTreeMap, HashMap};

type OrderMap = BTreeMap<String, Vec<String>>;

/// Per-scope saved ordering of entity ids.
pub struct OrderOverride<'a> {
    kv: &'a dyn KvStore,
    key: String,
}

impl<'a> OrderOverride<'a> {
    pub fn new(kv: &'a dyn KvStore, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replaces the saved sequence for `scope`.
    pub fn save_order<I, S>(&self, scope: &str, ids_in_order: I) -> StoreResult<WriteAck>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut orders = self.load()?;
        orders.insert(
            scope.to_string(),
            ids_in_order.into_iter().map(Into::into).collect(),
        );
        let write = encode_write(&self.key, &orders)?;
        Ok(persist_writes(self.kv, vec![write]))
    }

    pub fn get_order(&self, scope: &str) -> StoreResult<Option<Vec<String>>> {
        Ok(self.load()?.remove(scope))
    }

    /// Reorders `entities` by the sequence saved for `scope`.
    pub fn apply_order(&self, entities: Vec<Record>, scope: &str) -> StoreResult<Vec<Record>> {
        Ok(match self.get_order(scope)? {
            Some(order) => apply_saved_order(entities, &order),
            None => entities,
        })
    }

    /// Drops the saved sequences of every scope.
    pub fn clear(&self) -> WriteAck {
        persist_writes(
            self.kv,
            vec![KvWrite::Remove {
                key: self.key.clone(),
            }],
        )
    }

    fn load(&self) -> StoreResult<OrderMap> {
        read_json(self.kv, &self.key)
    }
}

/// Stable-sorts `entities` so ids in `order` come first, in that order.
///
/// An empty `order` leaves the input untouched.
pub fn apply_saved_order(mut entities: Vec<Record>, order: &[String]) -> Vec<Record> {
    if order.is_empty() {
        return entities;
    }

    let mut positions = HashMap::with_capacity(order.len());
    for (index, id) in order.iter().enumerate() {
        positions.entry(id.as_str()).or_insert(index);
    }

    // `sort_by_key` is stable, so unordered records keep their relative order.
    entities.sort_by_key(|record| {
        record
            .id()
            .and_then(|id| positions.get(id).copied())
            .unwrap_or(usize::MAX)
    });
    entities
}

#[cfg(test)]
mod tests {
    use super::apply_saved_order;
    use crate::model::entity::Record;
    use serde_json::json;

    fn records(ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .map(|id| Record::from_value(json!({ "id": id })).expect("object literal"))
            .collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(Record::id).collect()
    }

    fn order(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn ordered_ids_lead_and_the_rest_keep_relative_order() {
        let sorted = apply_saved_order(records(&["A", "B", "C", "D"]), &order(&["C", "A"]));
        assert_eq!(ids(&sorted), ["C", "A", "B", "D"]);
    }

    #[test]
    fn unknown_ids_in_saved_order_are_ignored() {
        let sorted = apply_saved_order(records(&["A", "B", "C"]), &order(&["Z", "B"]));
        assert_eq!(ids(&sorted), ["B", "A", "C"]);
    }

    #[test]
    fn duplicated_ids_use_first_position() {
        let sorted = apply_saved_order(records(&["A", "B", "C"]), &order(&["C", "B", "C"]));
        assert_eq!(ids(&sorted), ["C", "B", "A"]);
    }

    #[test]
    fn empty_order_is_identity() {
        let sorted = apply_saved_order(records(&["D", "B", "A"]), &[]);
        assert_eq!(ids(&sorted), ["D", "B", "A"]);
    }

    #[test]
    fn records_without_id_sort_with_unordered_ones() {
        let mut input = records(&["A", "B"]);
        input.insert(0, Record::from_value(json!({"title": "untitled"})).expect("object"));

        let sorted = apply_saved_order(input, &order(&["B"]));
        assert_eq!(sorted[0].id(), Some("B"));
        assert_eq!(sorted[1].str_field("title"), Some("untitled"));
        assert_eq!(sorted[2].id(), Some("A"));
    }
}
