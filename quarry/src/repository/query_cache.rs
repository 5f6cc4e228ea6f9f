use crate::entity::EntityMeta;
use crate::errors::QuarryResult;
use crate::query::{DerivedQuery, ExplicitQuery};
use dashmap::DashMap;
use std::sync::Arc;

/// Parsed queries of one entity type, shared by every repository handle
/// for that type. A method name or query text is parsed once.
#[derive(Default)]
pub(crate) struct QueryCache {
    derived: DashMap<String, Arc<DerivedQuery>>,
    explicit: DashMap<String, Arc<ExplicitQuery>>,
}

impl QueryCache {
    pub(crate) fn derived(&self, meta: &EntityMeta, name: &str) -> QuarryResult<Arc<DerivedQuery>> {
        if let Some(query) = self.derived.get(name) {
            return Ok(query.clone());
        }
        let query = Arc::new(DerivedQuery::parse_with(meta, name)?);
        self.derived.insert(name.to_string(), query.clone());
        Ok(query)
    }

    pub(crate) fn explicit(&self, text: &str) -> QuarryResult<Arc<ExplicitQuery>> {
        if let Some(query) = self.explicit.get(text) {
            return Ok(query.clone());
        }
        let query = Arc::new(ExplicitQuery::parse(text)?);
        self.explicit.insert(text.to_string(), query.clone());
        Ok(query)
    }

    pub(crate) fn len(&self) -> usize {
        self.derived.len() + self.explicit.len()
    }
}
