//! Per-type facades over the hub.

use crate::error::Result;
use crate::shape::Shape;
use crate::store::DataHub;
use crate::types::{EntityId, Referrers};
use serde_json::Value;
use std::sync::Arc;

/// Read configuration fixed when a facade is built.
#[derive(Clone, Debug, Default)]
pub struct FacadeConfig {
    /// Shape for list and card views.
    pub brief: Shape,
    /// Shape for detail views.
    pub detail: Shape,
    /// Fields a strict read may miss.
    pub optional_fields: Vec<String>,
    /// Whether a missing required field invalidates the read.
    pub strict: bool,
}

impl FacadeConfig {
    pub fn new(brief: Shape, detail: Shape) -> Self {
        Self {
            brief,
            detail,
            ..Default::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn optional<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_fields.extend(fields.into_iter().map(Into::into));
        self
    }
}

/// Which configured shape to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Brief,
    Detail,
}

/// Convenience wrapper bound to one entity type.
///
/// Reads are all-or-nothing: a batch with any unresolved id returns `None`
/// and tags no referrer, so tags always reflect complete reads.
pub struct EntityFacade {
    hub: Arc<DataHub>,
    entity_type: String,
    config: FacadeConfig,
}

impl EntityFacade {
    pub fn new(
        hub: Arc<DataHub>,
        entity_type: impl Into<String>,
        config: FacadeConfig,
    ) -> Result<Self> {
        let entity_type = entity_type.into();
        hub.registry().entity(&entity_type)?;

        Ok(Self {
            hub,
            entity_type,
            config,
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    pub fn save_one(
        &self,
        entity: &Value,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<EntityId>> {
        self.hub.save(&self.entity_type, entity, referrer, false)
    }

    /// Save a list payload. A non-array payload is saved as one entity.
    pub fn save_many(
        &self,
        entities: &Value,
        referrer: impl Into<Referrers>,
    ) -> Result<Vec<EntityId>> {
        let entities = match entities {
            Value::Array(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        self.hub.save_many(&self.entity_type, entities, referrer, false)
    }

    pub fn get_one(
        &self,
        id: impl Into<EntityId>,
        view: View,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Value>> {
        let entities = self.get_many([id], view, referrer)?;
        Ok(entities.and_then(|entities| entities.into_iter().next()))
    }

    pub fn get_many<I, T>(
        &self,
        ids: I,
        view: View,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Vec<Value>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        let ids: Vec<EntityId> = ids.into_iter().map(Into::into).collect();
        self.hub.get_many_tagged(
            &self.entity_type,
            &ids,
            self.shape(view),
            self.config.strict,
            &self.config.optional_fields,
            referrer,
        )
    }

    pub fn get_brief(
        &self,
        id: impl Into<EntityId>,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Value>> {
        self.get_one(id, View::Brief, referrer)
    }

    pub fn get_detail(
        &self,
        id: impl Into<EntityId>,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Value>> {
        self.get_one(id, View::Detail, referrer)
    }

    pub fn get_many_brief<I, T>(
        &self,
        ids: I,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Vec<Value>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        self.get_many(ids, View::Brief, referrer)
    }

    pub fn get_many_detail<I, T>(
        &self,
        ids: I,
        referrer: impl Into<Referrers>,
    ) -> Result<Option<Vec<Value>>>
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        self.get_many(ids, View::Detail, referrer)
    }

    fn shape(&self, view: View) -> &Shape {
        match view {
            View::Brief => &self.config.brief,
            View::Detail => &self.config.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubError;
    use crate::schema::{FieldConfig, SchemaConfig, SchemaRegistry, TypeConfig};
    use crate::types::Referrer;
    use serde_json::json;

    fn hub() -> Arc<DataHub> {
        Arc::new(DataHub::new(
            SchemaRegistry::configure(
                &SchemaConfig::new().entity(
                    "Article",
                    TypeConfig::new()
                        .field("id", FieldConfig::string().id())
                        .field("title", FieldConfig::string())
                        .field("body", FieldConfig::string()),
                ),
            )
            .unwrap(),
        ))
    }

    fn articles(hub: &Arc<DataHub>) -> EntityFacade {
        hub.facade(
            "Article",
            FacadeConfig::new(
                Shape::of(["id", "title"]),
                Shape::of(["id", "title", "body"]),
            )
            .strict(),
        )
        .unwrap()
    }

    #[test]
    fn test_brief_and_detail_views() {
        let hub = hub();
        let articles = articles(&hub);
        articles
            .save_one(&json!({"id": "a1", "title": "Hello"}), "nav-A")
            .unwrap();

        assert_eq!(
            articles.get_brief("a1", "nav-B").unwrap(),
            Some(json!({"id": "a1", "title": "Hello"}))
        );
        // The body was never fetched: the detail view is incomplete.
        assert_eq!(articles.get_detail("a1", "nav-C").unwrap(), None);

        assert!(hub.referrers_of("Article", "a1").contains(&Referrer::from("nav-B")));
        assert!(!hub.referrers_of("Article", "a1").contains(&Referrer::from("nav-C")));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let hub = hub();
        let articles = articles(&hub);
        let saved = articles
            .save_many(
                &json!([{"id": "a1", "title": "One"}, {"id": "a2", "title": "Two"}]),
                "nav-A",
            )
            .unwrap();
        assert_eq!(saved.len(), 2);

        assert_eq!(articles.get_many_brief(["a1", "a3"], "nav-B").unwrap(), None);
        assert_eq!(hub.referrers_of("Article", "a1"), vec![Referrer::from("nav-A")]);

        let both = articles.get_many_brief(["a1", "a2"], "nav-B").unwrap().unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(hub.referrers_of("Article", "a2").len(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let hub = hub();
        let articles = articles(&hub);
        let stamp = hub.stats().stamp;

        let none: [&str; 0] = [];
        assert_eq!(articles.get_many_detail(none, "nav-A").unwrap(), Some(vec![]));
        assert_eq!(hub.stats().stamp, stamp);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let hub = hub();
        assert!(matches!(
            hub.facade("Comment", FacadeConfig::default()),
            Err(HubError::UnknownType(_))
        ));
    }
}
