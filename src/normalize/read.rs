//! Denormalizing reads.

use crate::error::Result;
use crate::schema::{FieldType, Fields, SchemaRegistry};
use crate::shape::Shape;
use crate::state::{HubState, Record};
use crate::types::{EntityId, EntityKey};
use serde_json::{Map, Value};
use tracing::debug;

/// Reassembles requested shapes from one snapshot. Never mutates.
pub(crate) struct Denormalizer<'a> {
    registry: &'a SchemaRegistry,
    state: &'a HubState,
    optional_fields: &'a [String],
}

impl<'a> Denormalizer<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        state: &'a HubState,
        optional_fields: &'a [String],
    ) -> Self {
        Self {
            registry,
            state,
            optional_fields,
        }
    }

    /// Assemble `shape` of the entity `(entity_type, id)`.
    ///
    /// `None` means the entity is absent or, for a strict read, that some
    /// required field could not be resolved.
    pub fn get(
        &self,
        entity_type: &str,
        id: &EntityId,
        shape: &Shape,
        strict: bool,
    ) -> Result<Option<Value>> {
        let schema = self.registry.entity(entity_type)?;
        let key = EntityKey::new(entity_type, id.clone());
        let Some(record) = self.state.record(&key) else {
            return Ok(None);
        };

        self.assemble(&schema.fields, record, shape, strict)
    }

    fn assemble(
        &self,
        fields: &Fields,
        record: &Record,
        shape: &Shape,
        strict: bool,
    ) -> Result<Option<Value>> {
        let mut result = Map::new();

        match shape {
            Shape::Full => {
                for (name, field_type) in fields {
                    if let Some(value) =
                        self.field(Some(field_type), record.get(name), &Shape::Full, false)?
                    {
                        result.insert(name.clone(), value);
                    }
                }
            }
            Shape::Fields(requested) => {
                for (name, sub_shape) in requested {
                    match self.field(fields.get(name), record.get(name), sub_shape, strict)? {
                        Some(value) => {
                            result.insert(name.clone(), value);
                        }
                        None if strict && !self.is_optional(name) => {
                            debug!(field = %name, "field missing from cache");
                            return Ok(None);
                        }
                        None => {}
                    }
                }
            }
        }

        Ok(Some(Value::Object(result)))
    }

    /// Resolve one stored value. Undeclared fields read back as stored.
    fn field(
        &self,
        field_type: Option<&FieldType>,
        stored: Option<&Value>,
        shape: &Shape,
        strict: bool,
    ) -> Result<Option<Value>> {
        let Some(stored) = stored else {
            return Ok(None);
        };
        if stored.is_null() {
            return Ok(Some(Value::Null));
        }

        match field_type {
            None | Some(FieldType::Primitive(_)) => Ok(Some(stored.clone())),
            Some(FieldType::Reference(entity_type)) => match stored {
                // Stored inline because the payload carried no id.
                Value::Object(inline) => {
                    let fields = self.registry.fields_of(entity_type)?;
                    self.assemble(fields, inline, shape, strict)
                }
                raw => match EntityId::from_value(raw) {
                    Some(id) => self.get(entity_type, &id, shape, strict),
                    None => Ok(None),
                },
            },
            Some(FieldType::Nested(fields)) => match stored {
                Value::Object(inner) => self.assemble(fields, inner, shape, strict),
                other => Ok(Some(other.clone())),
            },
            Some(FieldType::List(element)) => {
                let Value::Array(items) = stored else {
                    return Ok(Some(stored.clone()));
                };

                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    // An unresolved element leaves a hole; the list itself resolved.
                    let value = self.field(Some(&**element), Some(item), shape, strict)?;
                    resolved.push(value.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(resolved)))
            }
        }
    }

    fn is_optional(&self, field: &str) -> bool {
        self.optional_fields.iter().any(|optional| optional == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::schema::{FieldConfig, SchemaConfig, TypeConfig};
    use crate::types::Referrer;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Arc<SchemaRegistry> {
        SchemaRegistry::configure(
            &SchemaConfig::new()
                .entity(
                    "Place",
                    TypeConfig::new()
                        .field("id", FieldConfig::integer().id())
                        .field("name", FieldConfig::string())
                        .field("country", FieldConfig::reference("Country"))
                        .field("tags", FieldConfig::list(FieldConfig::string()))
                        .field("sisters", FieldConfig::list(FieldConfig::reference("Place"))),
                )
                .entity(
                    "Country",
                    TypeConfig::new()
                        .field("id", FieldConfig::integer().id())
                        .field("name", FieldConfig::string())
                        .field("capital", FieldConfig::string()),
                ),
        )
        .unwrap()
    }

    fn seeded(registry: &SchemaRegistry, payloads: &[(&str, Value)]) -> HubState {
        let mut state = HubState::new();
        let referrers = im::HashSet::unit(Referrer::from("nav-A"));
        for (entity_type, payload) in payloads {
            Normalizer::new(registry, &mut state, false)
                .save(entity_type, payload, &referrers)
                .unwrap();
        }
        state
    }

    #[test]
    fn test_full_read_reassembles_references() {
        let registry = registry();
        let state = seeded(
            &registry,
            &[(
                "Place",
                json!({"id": 1, "name": "Paris", "country": {"id": 9, "name": "France"}}),
            )],
        );
        let reader = Denormalizer::new(&registry, &state, &[]);

        let place = reader
            .get("Place", &EntityId::from(1), &Shape::Full, false)
            .unwrap()
            .unwrap();
        assert_eq!(
            place,
            json!({"id": 1, "name": "Paris", "country": {"id": 9, "name": "France"}})
        );
    }

    #[test]
    fn test_subset_shape() {
        let registry = registry();
        let state = seeded(
            &registry,
            &[(
                "Place",
                json!({"id": 1, "name": "Paris", "country": {"id": 9, "name": "France"}}),
            )],
        );
        let reader = Denormalizer::new(&registry, &state, &[]);

        let shape = Shape::of(["name"]).with("country", Shape::of(["name"]));
        let place = reader
            .get("Place", &EntityId::from(1), &shape, true)
            .unwrap()
            .unwrap();
        assert_eq!(place, json!({"name": "Paris", "country": {"name": "France"}}));
    }

    #[test]
    fn test_strict_read_aborts_on_missing_field() {
        let registry = registry();
        let state = seeded(
            &registry,
            &[(
                "Place",
                json!({"id": 1, "name": "Paris", "country": {"id": 9, "name": "France"}}),
            )],
        );
        let shape = Shape::of(["name"]).with("country", Shape::of(["name", "capital"]));

        let strict = Denormalizer::new(&registry, &state, &[]);
        assert_eq!(
            strict.get("Place", &EntityId::from(1), &shape, true).unwrap(),
            None
        );

        let lenient = strict
            .get("Place", &EntityId::from(1), &shape, false)
            .unwrap()
            .unwrap();
        assert_eq!(lenient, json!({"name": "Paris", "country": {"name": "France"}}));

        let optional = ["capital".to_string()];
        let with_optional = Denormalizer::new(&registry, &state, &optional);
        assert!(with_optional
            .get("Place", &EntityId::from(1), &shape, true)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_full_shape_is_never_strict() {
        let registry = registry();
        let state = seeded(&registry, &[("Place", json!({"id": 1, "country": 9}))]);
        let reader = Denormalizer::new(&registry, &state, &[]);

        // Country 9 was never saved: the dangling id drops out.
        let place = reader
            .get("Place", &EntityId::from(1), &Shape::Full, true)
            .unwrap()
            .unwrap();
        assert_eq!(place, json!({"id": 1}));

        let strict = Shape::of(["id", "country"]);
        assert_eq!(
            reader.get("Place", &EntityId::from(1), &strict, true).unwrap(),
            None
        );
    }

    #[test]
    fn test_lists() {
        let registry = registry();
        let state = seeded(
            &registry,
            &[(
                "Place",
                json!({"id": 1, "tags": ["old", "big"], "sisters": [{"id": 2, "name": "Rome"}, 3]}),
            )],
        );
        let reader = Denormalizer::new(&registry, &state, &[]);
        let shape = Shape::of(["tags"]).with("sisters", Shape::of(["name"]));

        let lenient = reader
            .get("Place", &EntityId::from(1), &shape, false)
            .unwrap()
            .unwrap();
        assert_eq!(
            lenient,
            json!({"tags": ["old", "big"], "sisters": [{"name": "Rome"}, null]})
        );

        let strict = reader
            .get("Place", &EntityId::from(1), &shape, true)
            .unwrap()
            .unwrap();
        assert_eq!(strict, lenient);
    }

    #[test]
    fn test_inline_reference_read_back() {
        let registry = registry();
        let state = seeded(
            &registry,
            &[("Place", json!({"id": 1, "country": {"name": "Atlantis"}}))],
        );
        let reader = Denormalizer::new(&registry, &state, &[]);

        let place = reader
            .get("Place", &EntityId::from(1), &Shape::of(["country"]), true)
            .unwrap()
            .unwrap();
        assert_eq!(place, json!({"country": {"name": "Atlantis"}}));
    }

    #[test]
    fn test_absent_entity() {
        let registry = registry();
        let state = HubState::new();
        let reader = Denormalizer::new(&registry, &state, &[]);

        assert_eq!(
            reader.get("Place", &EntityId::from(1), &Shape::Full, false).unwrap(),
            None
        );
        assert!(reader
            .get("Planet", &EntityId::from(1), &Shape::Full, false)
            .is_err());
    }
}
