//! Normalizing writes.
//!
//! A payload is merged field by field into its stored record, following
//! the registered schema rather than the payload. Nested entities of
//! referenced types are written as records of their own and replaced by
//! their ids.

use crate::error::{HubError, Result};
use crate::schema::{EntitySchema, FieldType, Fields, SchemaRegistry};
use crate::state::{HubState, Record};
use crate::types::{EntityId, EntityKey, Referrer};
use serde_json::Value;
use tracing::trace;

/// Identity of a written entity.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SavedId {
    pub id: EntityId,
    /// The id exactly as the payload carried it.
    pub raw: Value,
}

/// One recursive write into a state being built.
pub(crate) struct Normalizer<'a> {
    registry: &'a SchemaRegistry,
    state: &'a mut HubState,
    reset: bool,
    written: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry, state: &'a mut HubState, reset: bool) -> Self {
        Self {
            registry,
            state,
            reset,
            written: 0,
        }
    }

    /// Number of entity records written so far, nested ones included.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Save `entity` as a `entity_type`. A null payload writes nothing.
    pub fn save(
        &mut self,
        entity_type: &str,
        entity: &Value,
        referrers: &im::HashSet<Referrer>,
    ) -> Result<Option<SavedId>> {
        if entity.is_null() {
            return Ok(None);
        }

        let registry = self.registry;
        let schema = registry.entity(entity_type)?;
        let id = schema.extract_id(entity)?;
        self.write(schema, id, entity, referrers).map(Some)
    }

    fn write(
        &mut self,
        schema: &'a EntitySchema,
        id: EntityId,
        entity: &Value,
        referrers: &im::HashSet<Referrer>,
    ) -> Result<SavedId> {
        let key = EntityKey::new(schema.name.as_str(), id.clone());

        // Nested writes inherit every referrer already holding this entity.
        let consolidated = match self.state.referrers().referrers_of(&key) {
            Some(existing) => referrers.clone().union(existing.clone()),
            None => referrers.clone(),
        };

        let base = if self.reset {
            Record::new()
        } else {
            self.state
                .record(&key)
                .map(|record| Record::clone(record))
                .unwrap_or_default()
        };

        let merged = self.merge(&schema.fields, base, entity, &consolidated)?;
        self.state.put_record(key.clone(), merged);
        self.state.referrers_mut().link(&key, referrers);
        self.written += 1;

        trace!(key = %key, reset = self.reset, "entity written");

        Ok(SavedId {
            id,
            raw: entity.get(&schema.id_field).cloned().unwrap_or(Value::Null),
        })
    }

    /// Merge the declared fields of `source` over `target`.
    ///
    /// Fields absent from `source` keep their stored value; undeclared
    /// fields of `source` are ignored.
    fn merge(
        &mut self,
        fields: &'a Fields,
        target: Record,
        source: &Value,
        referrers: &im::HashSet<Referrer>,
    ) -> Result<Record> {
        let mut target = if self.reset { Record::new() } else { target };
        let Value::Object(source) = source else {
            return Ok(target);
        };

        for (name, field_type) in fields {
            let Some(incoming) = source.get(name) else {
                continue;
            };

            let existing = target.remove(name);
            let value = self.resolve(field_type, existing, incoming, referrers)?;
            target.insert(name.clone(), value);
        }

        Ok(target)
    }

    fn resolve(
        &mut self,
        field_type: &'a FieldType,
        existing: Option<Value>,
        incoming: &Value,
        referrers: &im::HashSet<Referrer>,
    ) -> Result<Value> {
        if incoming.is_null() {
            return Ok(Value::Null);
        }

        match field_type {
            FieldType::Primitive(_) => Ok(incoming.clone()),
            FieldType::Reference(entity_type) => {
                self.resolve_reference(entity_type, existing, incoming, referrers)
            }
            FieldType::Nested(fields) => match incoming {
                Value::Object(_) => {
                    let merged = self.merge(fields, into_record(existing), incoming, referrers)?;
                    Ok(Value::Object(merged))
                }
                other => Ok(other.clone()),
            },
            FieldType::List(element) => {
                // A lone value stands for a one-element list.
                let items = match incoming {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };

                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve(element, None, item, referrers)?);
                }
                Ok(Value::Array(resolved))
            }
        }
    }

    /// Store a referenced entity by id, or inline when it carries no id.
    fn resolve_reference(
        &mut self,
        entity_type: &str,
        existing: Option<Value>,
        incoming: &Value,
        referrers: &im::HashSet<Referrer>,
    ) -> Result<Value> {
        // A scalar is an id that is already normalized.
        if !incoming.is_object() {
            return Ok(incoming.clone());
        }

        let registry = self.registry;
        let schema = registry.entity(entity_type)?;
        match schema.extract_id(incoming) {
            Ok(id) => Ok(self.write(schema, id, incoming, referrers)?.raw),
            Err(HubError::MissingId { .. }) => {
                let merged =
                    self.merge(&schema.fields, into_record(existing), incoming, referrers)?;
                Ok(Value::Object(merged))
            }
            Err(e) => Err(e),
        }
    }
}

fn into_record(value: Option<Value>) -> Record {
    match value {
        Some(Value::Object(record)) => record,
        _ => Record::new(),
    }
}
