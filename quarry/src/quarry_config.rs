//! Settings shared by every unit of work of a [Quarry](crate::Quarry).

use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::InMemoryStore;
use crate::store::Store;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

pub const DEFAULT_COUNT_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 2000;

#[derive(Clone)]
pub struct QuarryConfig {
    inner: Arc<QuarryConfigInner>,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl QuarryConfig {
    pub fn new() -> Self {
        QuarryConfig {
            inner: Arc::new(QuarryConfigInner::new()),
        }
    }

    /// Entries kept in each unit of work's count cache; zero disables it.
    pub fn count_cache_capacity(&self) -> usize {
        self.inner.count_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn set_count_cache_capacity(&self, capacity: usize) -> QuarryResult<()> {
        self.inner.check_not_configured("count cache capacity")?;
        self.inner
            .count_cache_capacity
            .store(capacity, Ordering::Relaxed);
        Ok(())
    }

    /// Whether staged writes are flushed before every query.
    pub fn flush_before_query(&self) -> bool {
        self.inner.flush_before_query.load(Ordering::Relaxed)
    }

    pub fn set_flush_before_query(&self, flush: bool) -> QuarryResult<()> {
        self.inner.check_not_configured("flush before query")?;
        self.inner.flush_before_query.store(flush, Ordering::Relaxed);
        Ok(())
    }

    /// Largest page size served; bigger requests are capped.
    pub fn max_page_size(&self) -> Option<u64> {
        match self.inner.max_page_size.load(Ordering::Relaxed) {
            0 => None,
            size => Some(size),
        }
    }

    /// Sets the page size cap, `None` for no cap.
    pub fn set_max_page_size(&self, size: Option<u64>) -> QuarryResult<()> {
        self.inner.check_not_configured("max page size")?;
        if size == Some(0) {
            log::error!("Max page size must be positive");
            return Err(QuarryError::new(
                "max page size must be greater than zero",
                ErrorKind::InvalidOperation,
            ));
        }
        self.inner
            .max_page_size
            .store(size.unwrap_or(0), Ordering::Relaxed);
        Ok(())
    }

    pub fn store(&self) -> QuarryResult<Store> {
        self.inner.store.get().cloned().ok_or_else(|| {
            log::error!("No store is configured");
            QuarryError::new("no store is configured", ErrorKind::StoreUnavailable)
        })
    }

    pub fn set_store(&self, store: Store) -> QuarryResult<()> {
        self.inner.check_not_configured("store")?;
        self.inner.store.set(store).map_err(|_| {
            log::error!("Store is already configured");
            QuarryError::new("store is already configured", ErrorKind::InvalidOperation)
        })
    }

    /// Falls back to an in-memory store and freezes the settings.
    pub(crate) fn initialize(&self) -> QuarryResult<()> {
        if self.inner.store.get().is_none() {
            log::debug!("No store configured, using an in-memory store");
            let _ = self.inner.store.set(Store::new(InMemoryStore::default()));
        }
        self.inner.configured.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct QuarryConfigInner {
    configured: AtomicBool,
    count_cache_capacity: AtomicUsize,
    flush_before_query: AtomicBool,
    max_page_size: AtomicU64,
    store: OnceLock<Store>,
}

impl QuarryConfigInner {
    fn new() -> Self {
        QuarryConfigInner {
            configured: AtomicBool::new(false),
            count_cache_capacity: AtomicUsize::new(DEFAULT_COUNT_CACHE_CAPACITY),
            flush_before_query: AtomicBool::new(true),
            max_page_size: AtomicU64::new(DEFAULT_MAX_PAGE_SIZE),
            store: OnceLock::new(),
        }
    }

    fn check_not_configured(&self, setting: &str) -> QuarryResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", setting);
            return Err(QuarryError::new(
                &format!("{} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
