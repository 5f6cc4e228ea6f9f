use crate::errors::QuarryError;
use crate::errors::QuarryResult;
use crate::quarry::Quarry;
use crate::quarry_config::QuarryConfig;
use crate::store::{Store, StoreProvider};

/// Builds a [Quarry]. A failing setting is remembered and reported by
/// [QuarryBuilder::open].
///
/// ```rust,ignore
/// let quarry = Quarry::builder()
///     .store(InMemoryStore::default())
///     .count_cache_capacity(128)
///     .max_page_size(500)
///     .open()?;
/// ```
#[derive(Default)]
pub struct QuarryBuilder {
    error: Option<QuarryError>,
    config: QuarryConfig,
}

impl QuarryBuilder {
    pub fn new() -> Self {
        QuarryBuilder {
            error: None,
            config: QuarryConfig::new(),
        }
    }

    pub fn store<T: StoreProvider + 'static>(self, store: T) -> Self {
        let store = Store::new(store);
        self.apply(|config| config.set_store(store))
    }

    /// Count-cache entries per unit of work; zero disables the cache.
    pub fn count_cache_capacity(self, capacity: usize) -> Self {
        self.apply(|config| config.set_count_cache_capacity(capacity))
    }

    pub fn flush_before_query(self, flush: bool) -> Self {
        self.apply(|config| config.set_flush_before_query(flush))
    }

    pub fn max_page_size(self, size: u64) -> Self {
        self.apply(|config| config.set_max_page_size(Some(size)))
    }

    pub fn unlimited_page_size(self) -> Self {
        self.apply(|config| config.set_max_page_size(None))
    }

    pub fn open(self) -> QuarryResult<Quarry> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Quarry::new(self.config)
    }

    fn apply<F>(mut self, setting: F) -> Self
    where
        F: FnOnce(&QuarryConfig) -> QuarryResult<()>,
    {
        if self.error.is_none() {
            if let Err(e) = setting(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }
}
