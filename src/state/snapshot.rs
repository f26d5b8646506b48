//! Immutable hub state snapshots.

use super::referrers::ReferrerIndex;
use crate::types::EntityKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Stored fields of one entity. Reference fields hold ids, never copies.
pub type Record = Map<String, Value>;

/// One consistent view of the records and their referrer indices.
///
/// Built from persistent collections: cloning is O(1) and later writes to
/// the clone never show through to holders of the original.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HubState {
    records: im::HashMap<EntityKey, Arc<Record>>,
    referrers: ReferrerIndex,
    stamp: u64,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &EntityKey) -> Option<&Arc<Record>> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn referrers(&self) -> &ReferrerIndex {
        &self.referrers
    }

    /// Incremented once per published mutation.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.records.keys()
    }

    pub(crate) fn put_record(&mut self, key: EntityKey, record: Record) {
        self.records.insert(key, Arc::new(record));
    }

    pub(crate) fn remove_record(&mut self, key: &EntityKey) -> Option<Arc<Record>> {
        self.records.remove(key)
    }

    pub(crate) fn referrers_mut(&mut self) -> &mut ReferrerIndex {
        &mut self.referrers
    }

    pub(crate) fn set_stamp(&mut self, stamp: u64) {
        self.stamp = stamp;
    }
}
