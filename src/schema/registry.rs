//! Compiled schema registry.

use super::config::{FieldTypeConfig, SchemaConfig, TypeConfig};
use crate::error::{HubError, Result};
use crate::types::{EntityId, KEY_SEPARATOR};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

/// Id field used when a type flags none.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Declared kind of a primitive field. Values are not checked against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Boolean,
    Integer,
    Float,
}

impl PrimitiveKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveKind::String),
            "boolean" => Some(PrimitiveKind::Boolean),
            "integer" => Some(PrimitiveKind::Integer),
            "float" => Some(PrimitiveKind::Float),
            _ => None,
        }
    }
}

/// Field declarations of an entity or inline structure.
pub type Fields = BTreeMap<String, FieldType>;

/// Resolved type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Primitive(PrimitiveKind),
    /// Holds an entity of another registered type, stored by id.
    Reference(String),
    /// Inline structure embedded in the parent record.
    Nested(Fields),
    List(Box<FieldType>),
}

/// Schema of one registered entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    pub name: String,
    pub id_field: String,
    pub fields: Fields,
}

impl EntitySchema {
    /// Read the id of a raw candidate entity.
    ///
    /// Fails with `MissingId` when the id field is absent or null, and with
    /// `InvalidId` when it is neither a string nor a number.
    pub fn extract_id(&self, entity: &Value) -> Result<EntityId> {
        match entity.get(&self.id_field) {
            None | Some(Value::Null) => Err(HubError::MissingId {
                entity_type: self.name.clone(),
                id_field: self.id_field.clone(),
            }),
            Some(raw) => EntityId::from_value(raw).ok_or_else(|| HubError::InvalidId {
                entity_type: self.name.clone(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Immutable mapping from type name to compiled schema.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// Compile a configuration into a registry.
    pub fn configure(config: &SchemaConfig) -> Result<Arc<Self>> {
        let names: BTreeSet<&str> = config.types.keys().map(String::as_str).collect();

        let mut types = BTreeMap::new();
        for (name, type_config) in &config.types {
            validate_type_name(name)?;
            let schema = compile_type(name, type_config, &names)?;
            types.insert(name.clone(), schema);
        }

        Ok(Arc::new(Self { types }))
    }

    pub fn entity(&self, entity_type: &str) -> Result<&EntitySchema> {
        self.types
            .get(entity_type)
            .ok_or_else(|| HubError::UnknownType(entity_type.to_string()))
    }

    pub fn id_field_of(&self, entity_type: &str) -> Result<&str> {
        Ok(&self.entity(entity_type)?.id_field)
    }

    pub fn fields_of(&self, entity_type: &str) -> Result<&Fields> {
        Ok(&self.entity(entity_type)?.fields)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

fn validate_type_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(KEY_SEPARATOR) {
        return Err(HubError::Configuration(format!(
            "invalid type name `{name}`"
        )));
    }
    if PrimitiveKind::parse(name).is_some() {
        return Err(HubError::Configuration(format!(
            "type name `{name}` shadows a primitive"
        )));
    }
    Ok(())
}

fn compile_type(name: &str, config: &TypeConfig, names: &BTreeSet<&str>) -> Result<EntitySchema> {
    let mut fields = Fields::new();
    let mut id_field = None;

    for (field_name, field) in &config.fields {
        let path = format!("{name}.{field_name}");
        fields.insert(
            field_name.clone(),
            compile_field(&field.field_type, names, &path)?,
        );

        if field.is_id_field {
            if let Some(previous) = id_field.replace(field_name.clone()) {
                return Err(HubError::Configuration(format!(
                    "{name}: more than one id field (`{previous}`, `{field_name}`)"
                )));
            }
        }
    }

    let id_field = match id_field {
        Some(field) => field,
        None if fields.contains_key(DEFAULT_ID_FIELD) => DEFAULT_ID_FIELD.to_string(),
        None => {
            return Err(HubError::Configuration(format!(
                "{name}: no id field declared"
            )))
        }
    };

    Ok(EntitySchema {
        name: name.to_string(),
        id_field,
        fields,
    })
}

fn compile_field(
    config: &FieldTypeConfig,
    names: &BTreeSet<&str>,
    path: &str,
) -> Result<FieldType> {
    match config {
        FieldTypeConfig::Named(type_name) => {
            if let Some(kind) = PrimitiveKind::parse(type_name) {
                Ok(FieldType::Primitive(kind))
            } else if names.contains(type_name.as_str()) {
                Ok(FieldType::Reference(type_name.clone()))
            } else {
                Err(HubError::Configuration(format!(
                    "{path}: unknown field type `{type_name}`"
                )))
            }
        }
        FieldTypeConfig::List(inner) => Ok(FieldType::List(Box::new(compile_field(
            inner,
            names,
            &format!("{path}[]"),
        )?))),
        FieldTypeConfig::Object(children) => {
            let mut fields = Fields::new();
            for (child, child_config) in children {
                fields.insert(
                    child.clone(),
                    compile_field(child_config, names, &format!("{path}.{child}"))?,
                );
            }
            Ok(FieldType::Nested(fields))
        }
    }
}

static INSTALLED: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();

/// Configure the process-wide registry. Allowed exactly once.
pub fn install(config: &SchemaConfig) -> Result<Arc<SchemaRegistry>> {
    if INSTALLED.get().is_some() {
        return Err(HubError::AlreadyConfigured);
    }

    let registry = SchemaRegistry::configure(config)?;
    INSTALLED
        .set(Arc::clone(&registry))
        .map_err(|_| HubError::AlreadyConfigured)?;

    tracing::debug!(types = registry.types.len(), "schema registry installed");
    Ok(registry)
}

/// The process-wide registry, once installed.
pub fn installed() -> Result<Arc<SchemaRegistry>> {
    INSTALLED.get().cloned().ok_or(HubError::NotConfigured)
}
