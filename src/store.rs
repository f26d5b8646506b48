//! Main DataHub struct tying all components together.

use crate::error::{HubError, Result};
use crate::facade::{EntityFacade, FacadeConfig};
use crate::gc::{self, GcReport};
use crate::normalize::{Denormalizer, Normalizer};
use crate::schema::{self, SchemaRegistry};
use crate::shape::Shape;
use crate::state::HubState;
use crate::types::{EntityId, EntityKey, HubStats, Referrer, Referrers};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// An entity named either by id or by a raw payload carrying its id.
#[derive(Clone, Debug)]
pub enum EntityRef<'a> {
    Id(EntityId),
    Entity(&'a Value),
}

impl<'a> From<&'a Value> for EntityRef<'a> {
    fn from(value: &'a Value) -> Self {
        EntityRef::Entity(value)
    }
}

impl From<EntityId> for EntityRef<'_> {
    fn from(id: EntityId) -> Self {
        EntityRef::Id(id)
    }
}

impl From<&str> for EntityRef<'_> {
    fn from(id: &str) -> Self {
        EntityRef::Id(EntityId::from(id))
    }
}

macro_rules! entity_ref_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for EntityRef<'_> {
            fn from(id: $t) -> Self {
                EntityRef::Id(EntityId::from(id))
            }
        })*
    };
}

entity_ref_from_int!(i32, i64, u32, u64, usize);

/// The normalized entity cache.
///
/// Provides a unified interface for:
/// - Saving payloads, splitting nested entities into their own records
/// - Reading shapes back out, strictly or leniently
/// - Tagging entities with the referrers that keep them alive
/// - Releasing referrers and collecting what they alone held
///
/// Each mutation runs under one write lock against a private copy of the
/// current snapshot, then publishes the copy. Readers work on whichever
/// snapshot was current when they started.
pub struct DataHub {
    /// Compiled schema, shared with facades.
    registry: Arc<SchemaRegistry>,

    /// Current published snapshot.
    state: RwLock<Arc<HubState>>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,
}

impl DataHub {
    /// Create an empty hub over a compiled schema.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            state: RwLock::new(Arc::new(HubState::new())),
            write_lock: Mutex::new(()),
        }
    }

    /// Create an empty hub over the process-wide schema.
    pub fn with_installed_schema() -> Result<Self> {
        Ok(Self::new(schema::installed()?))
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// The current snapshot. Later writes never affect it.
    pub fn snapshot(&self) -> Arc<HubState> {
        Arc::clone(&self.state.read())
    }

    /// Replace the current state, e.g. with one exported by another process.
    pub fn restore(&self, state: HubState) -> Result<()> {
        for key in state.keys() {
            self.registry.entity(&key.entity_type)?;
        }
        if !state.referrers().is_consistent() {
            return Err(HubError::Serialization(
                "restored referrer indices are inconsistent".into(),
            ));
        }
        // An unheld record could never be collected.
        if let Some(key) = state.keys().find(|key| !state.referrers().is_held(key)) {
            return Err(HubError::Serialization(format!(
                "restored record {key} has no referrer"
            )));
        }

        let _lock = self.write_lock.lock();
        self.publish(state);
        Ok(())
    }

    /// Create a facade bound to one entity type.
    pub fn facade(
        self: &Arc<Self>,
        entity_type: impl Into<String>,
        config: FacadeConfig,
    ) -> Result<EntityFacade> {
        EntityFacade::new(Arc::clone(self), entity_type, config)
    }

    // --- Writes ---

    /// Read the id of a raw candidate entity.
    pub fn extract_id(&self, entity_type: &str, entity: &Value) -> Result<EntityId> {
        self.registry.entity(entity_type)?.extract_id(entity)
    }

    /// Save a payload and everything nested in it.
    ///
    /// Fields absent from the payload keep their stored values unless
    /// `reset` is set. Returns `None` for a null payload.
    pub fn save(
        &self,
        entity_type: &str,
        entity: &Value,
        referrers: impl Into<Referrers>,
        reset: bool,
    ) -> Result<Option<EntityId>> {
        if entity.is_null() {
            return Ok(None);
        }

        let referrers = referrers.into().effective();
        self.mutate(|state| {
            let mut writer = Normalizer::new(&self.registry, state, reset);
            let saved = writer.save(entity_type, entity, &referrers)?;
            debug!(entity_type, written = writer.written(), "saved entity");
            Ok(saved.map(|saved| saved.id))
        })
    }

    /// Save many payloads of one type in a single critical section.
    ///
    /// Null payloads are skipped. On error nothing is published.
    pub fn save_many(
        &self,
        entity_type: &str,
        entities: &[Value],
        referrers: impl Into<Referrers>,
        reset: bool,
    ) -> Result<Vec<EntityId>> {
        let referrers = referrers.into().effective();
        self.mutate(|state| {
            let mut writer = Normalizer::new(&self.registry, state, reset);
            let mut ids = Vec::with_capacity(entities.len());
            for entity in entities {
                if let Some(saved) = writer.save(entity_type, entity, &referrers)? {
                    ids.push(saved.id);
                }
            }
            debug!(entity_type, written = writer.written(), "saved entities");
            Ok(ids)
        })
    }

    /// Extend an entity's lifetime to `referrers` without writing it.
    pub fn add_referrer<'a>(
        &self,
        entity_type: &str,
        target: impl Into<EntityRef<'a>>,
        referrers: impl Into<Referrers>,
    ) -> Result<()> {
        let schema = self.registry.entity(entity_type)?;
        let id = match target.into() {
            EntityRef::Id(id) => id,
            EntityRef::Entity(entity) if entity.is_object() => schema.extract_id(entity)?,
            EntityRef::Entity(raw) => {
                EntityId::from_value(raw).ok_or_else(|| HubError::InvalidId {
                    entity_type: entity_type.to_string(),
                    value: raw.to_string(),
                })?
            }
        };

        let referrers = referrers.into().effective();
        let key = EntityKey::new(entity_type, id);
        self.mutate(|state| {
            state.referrers_mut().link(&key, &referrers);
            Ok(())
        })
    }

    /// Release a referrer, deleting every entity it alone kept alive.
    pub fn release(&self, referrer: &Referrer) -> GcReport {
        if referrer.is_persistent() {
            return GcReport::default();
        }

        let _lock = self.write_lock.lock();
        let mut next = HubState::clone(&self.snapshot());
        let report = gc::collect(&mut next, referrer);
        if report.released {
            self.publish(next);
            debug!(referrer = %referrer, evicted = report.evicted.len(), "released referrer");
        }
        report
    }

    // --- Reads ---

    /// Assemble `shape` of one entity. Read-only; tags nothing.
    pub fn get(
        &self,
        entity_type: &str,
        id: impl Into<EntityId>,
        shape: &Shape,
        strict: bool,
        optional_fields: &[String],
    ) -> Result<Option<Value>> {
        let snapshot = self.snapshot();
        Denormalizer::new(&self.registry, &snapshot, optional_fields).get(
            entity_type,
            &id.into(),
            shape,
            strict,
        )
    }

    /// Every registered field of one entity, non-strict.
    pub fn get_full(&self, entity_type: &str, id: impl Into<EntityId>) -> Result<Option<Value>> {
        self.get(entity_type, id, &Shape::Full, false, &[])
    }

    /// Read a batch and, only if every id resolves, tag all of them.
    ///
    /// Reading and tagging happen in one critical section, so no release
    /// can slip between them.
    pub fn get_many_tagged(
        &self,
        entity_type: &str,
        ids: &[EntityId],
        shape: &Shape,
        strict: bool,
        optional_fields: &[String],
        referrers: impl Into<Referrers>,
    ) -> Result<Option<Vec<Value>>> {
        let referrers = referrers.into().effective();

        let _lock = self.write_lock.lock();
        let current = self.snapshot();
        let reader = Denormalizer::new(&self.registry, &current, optional_fields);

        let mut entities = Vec::with_capacity(ids.len());
        for id in ids {
            match reader.get(entity_type, id, shape, strict)? {
                Some(entity) => entities.push(entity),
                None => return Ok(None),
            }
        }

        if entities.is_empty() {
            return Ok(Some(entities));
        }

        let mut next = HubState::clone(&current);
        for id in ids {
            next.referrers_mut()
                .link(&EntityKey::new(entity_type, id.clone()), &referrers);
        }
        self.publish(next);

        Ok(Some(entities))
    }

    // --- Introspection ---

    pub fn contains(&self, entity_type: &str, id: impl Into<EntityId>) -> bool {
        self.snapshot()
            .contains(&EntityKey::new(entity_type, id.into()))
    }

    /// Referrers currently keeping an entity alive.
    pub fn referrers_of(&self, entity_type: &str, id: impl Into<EntityId>) -> Vec<Referrer> {
        let snapshot = self.snapshot();
        let key = EntityKey::new(entity_type, id.into());
        let mut referrers: Vec<Referrer> = snapshot
            .referrers()
            .referrers_of(&key)
            .map(|held| held.iter().cloned().collect())
            .unwrap_or_default();
        referrers.sort();
        referrers
    }

    pub fn stats(&self) -> HubStats {
        let snapshot = self.snapshot();
        HubStats {
            entities: snapshot.entity_count(),
            referrers: snapshot.referrers().referrer_count(),
            stamp: snapshot.stamp(),
        }
    }

    // --- Internals ---

    /// Apply `f` to a copy of the current state and publish it on success.
    fn mutate<T>(&self, f: impl FnOnce(&mut HubState) -> Result<T>) -> Result<T> {
        let _lock = self.write_lock.lock();
        let mut next = HubState::clone(&self.snapshot());
        let out = f(&mut next)?;
        self.publish(next);
        Ok(out)
    }

    /// Swap in `next`. Callers must hold the write lock.
    fn publish(&self, mut next: HubState) {
        let current = self.state.read().stamp();
        next.set_stamp(current + 1);
        *self.state.write() = Arc::new(next);
    }
}
