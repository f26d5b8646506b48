//! Read shapes.
//!
//! A shape names the fields a read should assemble, recursively for
//! references and inline structures. [`Shape::Full`] asks for every
//! registered field and never makes a read strict.

use crate::error::{HubError, Result};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Shape {
    /// Every registered field, non-strict.
    #[default]
    Full,
    /// Exactly these fields, each with its own sub-shape.
    Fields(BTreeMap<String, Shape>),
}

impl Shape {
    /// Request the named fields with full sub-shapes.
    pub fn of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Shape::Fields(
            fields
                .into_iter()
                .map(|name| (name.into(), Shape::Full))
                .collect(),
        )
    }

    /// Add or replace one requested field.
    pub fn with(self, field: impl Into<String>, shape: Shape) -> Self {
        let mut fields = match self {
            Shape::Full => BTreeMap::new(),
            Shape::Fields(fields) => fields,
        };
        fields.insert(field.into(), shape);
        Shape::Fields(fields)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Shape::Full)
    }

    /// Parse the JSON form: `true`/`null` for a full field, an object for
    /// a sub-shape, `false` to leave a field out.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null | Value::Bool(true) => Ok(Shape::Full),
            Value::Object(entries) => {
                let mut fields = BTreeMap::new();
                for (name, entry) in entries {
                    if matches!(entry, Value::Bool(false)) {
                        continue;
                    }
                    fields.insert(name.clone(), Shape::from_value(entry)?);
                }
                Ok(Shape::Fields(fields))
            }
            other => Err(HubError::Configuration(format!(
                "malformed read shape {other}"
            ))),
        }
    }
}
