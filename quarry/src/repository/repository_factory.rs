use crate::entity::Entity;
use crate::quarry_config::QuarryConfig;
use crate::repository::query_cache::QueryCache;
use crate::repository::Repository;
use dashmap::DashMap;
use std::sync::Arc;

/// Hands out repository handles. Handles for the same entity type share
/// one query cache.
#[derive(Clone, Default)]
pub(crate) struct RepositoryFactory {
    inner: Arc<RepositoryFactoryInner>,
}

impl RepositoryFactory {
    pub(crate) fn new() -> Self {
        RepositoryFactory::default()
    }

    pub(crate) fn repository<T: Entity>(&self, config: &QuarryConfig) -> Repository<T> {
        self.inner.repository(config)
    }

    pub(crate) fn clear(&self) {
        self.inner.caches.clear();
    }
}

#[derive(Default)]
struct RepositoryFactoryInner {
    caches: DashMap<&'static str, Arc<QueryCache>>,
}

impl RepositoryFactoryInner {
    fn repository<T: Entity>(&self, config: &QuarryConfig) -> Repository<T> {
        let queries = self
            .caches
            .entry(T::entity_name())
            .or_insert_with(|| {
                log::debug!("Creating repository for {}", T::entity_name());
                Arc::new(QueryCache::default())
            })
            .clone();
        Repository::new(queries, config.max_page_size())
    }
}
