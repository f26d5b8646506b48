//! Declarative schema configuration.
//!
//! The configuration names every entity type and, per type, its fields:
//!
//! ```json
//! {
//!   "Place": {
//!     "id":      { "fieldType": "integer", "isIdField": true },
//!     "name":    { "fieldType": "string" },
//!     "country": { "fieldType": "Country" },
//!     "tags":    { "fieldType": ["string"] },
//!     "geo":     { "fieldType": { "lat": "float", "lng": { "fieldType": "float" } } }
//!   },
//!   "Country": {
//!     "id":   { "fieldType": "integer", "isIdField": true },
//!     "name": { "fieldType": "string" }
//!   }
//! }
//! ```
//!
//! A field type is a primitive name, the name of another configured type,
//! a one-element array (a list of that type), or an object of child fields.

use crate::error::{HubError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Key holding a field's type in the raw form.
const FIELD_TYPE_KEY: &str = "fieldType";

/// Key flagging the id field in the raw form.
const ID_FLAG_KEY: &str = "isIdField";

/// Unresolved field type, as written in configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldTypeConfig {
    /// A primitive name or the name of another entity type.
    Named(String),
    /// A list of values of the inner type.
    List(Box<FieldTypeConfig>),
    /// An inline structure of child fields.
    Object(BTreeMap<String, FieldTypeConfig>),
}

impl FieldTypeConfig {
    fn from_value(value: &Value, path: &str) -> Result<Self> {
        match value {
            Value::String(name) => Ok(FieldTypeConfig::Named(name.clone())),
            Value::Array(items) => match items.as_slice() {
                [inner] => Ok(FieldTypeConfig::List(Box::new(Self::from_value(
                    inner,
                    &format!("{path}[]"),
                )?))),
                _ => Err(HubError::Configuration(format!(
                    "{path}: list field type must have exactly one element type, found {}",
                    items.len()
                ))),
            },
            Value::Object(children) => {
                let mut fields = BTreeMap::new();
                for (name, child) in children {
                    let child_path = format!("{path}.{name}");
                    // Children may be written as `{ "fieldType": .. }` or bare.
                    let child_type = match child.get(FIELD_TYPE_KEY) {
                        Some(inner) if child.is_object() => inner,
                        _ => child,
                    };
                    fields.insert(name.clone(), Self::from_value(child_type, &child_path)?);
                }
                Ok(FieldTypeConfig::Object(fields))
            }
            other => Err(HubError::Configuration(format!(
                "{path}: malformed field type {other}"
            ))),
        }
    }
}

/// Configuration of a single field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldConfig {
    pub field_type: FieldTypeConfig,
    pub is_id_field: bool,
}

impl FieldConfig {
    pub fn new(field_type: FieldTypeConfig) -> Self {
        Self {
            field_type,
            is_id_field: false,
        }
    }

    pub fn string() -> Self {
        Self::named("string")
    }

    pub fn boolean() -> Self {
        Self::named("boolean")
    }

    pub fn integer() -> Self {
        Self::named("integer")
    }

    pub fn float() -> Self {
        Self::named("float")
    }

    /// A field holding an entity of another configured type.
    pub fn reference(entity_type: impl Into<String>) -> Self {
        Self::named(entity_type)
    }

    /// A list whose elements have the type of `element`.
    pub fn list(element: FieldConfig) -> Self {
        Self::new(FieldTypeConfig::List(Box::new(element.field_type)))
    }

    /// An inline structure that is stored inside its parent record.
    pub fn nested<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldConfig)>,
        S: Into<String>,
    {
        Self::new(FieldTypeConfig::Object(
            children
                .into_iter()
                .map(|(name, child)| (name.into(), child.field_type))
                .collect(),
        ))
    }

    /// Mark this field as the type's id field.
    pub fn id(mut self) -> Self {
        self.is_id_field = true;
        self
    }

    fn named(name: impl Into<String>) -> Self {
        Self::new(FieldTypeConfig::Named(name.into()))
    }

    fn from_value(value: &Value, path: &str) -> Result<Self> {
        let Some(field_type) = value.get(FIELD_TYPE_KEY) else {
            return Err(HubError::Configuration(format!(
                "{path}: field config must be an object with `{FIELD_TYPE_KEY}`"
            )));
        };

        let is_id_field = match value.get(ID_FLAG_KEY) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(HubError::Configuration(format!(
                    "{path}: `{ID_FLAG_KEY}` must be a boolean, found {other}"
                )))
            }
        };

        Ok(Self {
            field_type: FieldTypeConfig::from_value(field_type, path)?,
            is_id_field,
        })
    }
}

/// Configuration of one entity type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeConfig {
    pub fields: BTreeMap<String, FieldConfig>,
}

impl TypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.fields.insert(name.into(), config);
        self
    }
}

/// Configuration of every entity type known to the hub.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchemaConfig {
    pub types: BTreeMap<String, TypeConfig>,
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, name: impl Into<String>, config: TypeConfig) -> Self {
        self.types.insert(name.into(), config);
        self
    }

    /// Parse the raw declarative form.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(types) = value else {
            return Err(HubError::Configuration(
                "schema configuration must be an object of types".into(),
            ));
        };

        let mut config = SchemaConfig::new();
        for (type_name, fields) in types {
            let Value::Object(fields) = fields else {
                return Err(HubError::Configuration(format!(
                    "{type_name}: type configuration must be an object of fields"
                )));
            };

            let mut type_config = TypeConfig::new();
            for (field_name, field) in fields {
                let path = format!("{type_name}.{field_name}");
                type_config = type_config.field(field_name, FieldConfig::from_value(field, &path)?);
            }
            config.types.insert(type_name.clone(), type_config);
        }

        Ok(config)
    }

    /// Load the raw declarative form from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let value: Value = serde_json::from_slice(&bytes)?;
        Self::from_value(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_raw_config() {
        let config = SchemaConfig::from_value(&json!({
            "Place": {
                "id": { "fieldType": "integer", "isIdField": true },
                "country": { "fieldType": "Country" },
                "tags": { "fieldType": ["string"] },
                "geo": { "fieldType": { "lat": "float", "lng": { "fieldType": "float" } } }
            },
            "Country": {
                "id": { "fieldType": "integer", "isIdField": true }
            }
        }))
        .unwrap();

        let place = &config.types["Place"];
        assert!(place.fields["id"].is_id_field);
        assert_eq!(
            place.fields["country"].field_type,
            FieldTypeConfig::Named("Country".into())
        );
        assert_eq!(
            place.fields["tags"].field_type,
            FieldTypeConfig::List(Box::new(FieldTypeConfig::Named("string".into())))
        );

        let FieldTypeConfig::Object(geo) = &place.fields["geo"].field_type else {
            panic!("geo should be an inline structure");
        };
        assert_eq!(geo["lng"], FieldTypeConfig::Named("float".into()));
    }

    #[test]
    fn test_builder_matches_raw_form() {
        let built = SchemaConfig::new().entity(
            "Country",
            TypeConfig::new()
                .field("id", FieldConfig::integer().id())
                .field("name", FieldConfig::string()),
        );
        let parsed = SchemaConfig::from_value(&json!({
            "Country": {
                "id": { "fieldType": "integer", "isIdField": true },
                "name": { "fieldType": "string" }
            }
        }))
        .unwrap();

        assert_eq!(built, parsed);
    }

    #[test]
    fn test_malformed_field_types() {
        let empty_list = json!({ "T": { "tags": { "fieldType": [] } } });
        assert!(matches!(
            SchemaConfig::from_value(&empty_list),
            Err(HubError::Configuration(_))
        ));

        let numeric = json!({ "T": { "n": { "fieldType": 3 } } });
        assert!(matches!(
            SchemaConfig::from_value(&numeric),
            Err(HubError::Configuration(_))
        ));

        let bare = json!({ "T": { "n": "string" } });
        assert!(matches!(
            SchemaConfig::from_value(&bare),
            Err(HubError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(
            &path,
            br#"{ "Tag": { "id": { "fieldType": "string", "isIdField": true } } }"#,
        )
        .unwrap();

        let config = SchemaConfig::load(&path).unwrap();
        assert!(config.types["Tag"].fields["id"].is_id_field);

        let missing = SchemaConfig::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(HubError::Io(_))));
    }
}
