use crate::entity::Entity;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::quarry_builder::QuarryBuilder;
use crate::quarry_config::QuarryConfig;
use crate::repository::{Repository, RepositoryFactory};
use crate::session::UnitOfWork;
use crate::store::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The entry point: a configured store plus the repositories over it.
///
/// `Quarry` is a cheap handle; clones share the same store and query caches.
///
/// ```rust,ignore
/// let quarry = Quarry::builder().max_page_size(500).open()?;
/// let members = quarry.repository::<Member>();
///
/// let saved = quarry.with_unit_of_work(|uow| {
///     members.save(uow, Member::new("member1", 10))
/// })?;
/// ```
#[derive(Clone)]
pub struct Quarry {
    inner: Arc<QuarryInner>,
}

impl Quarry {
    pub fn builder() -> QuarryBuilder {
        QuarryBuilder::new()
    }

    pub(crate) fn new(config: QuarryConfig) -> QuarryResult<Self> {
        config.initialize()?;
        let store = config.store()?;
        log::debug!("Opened quarry");
        Ok(Quarry {
            inner: Arc::new(QuarryInner {
                config,
                store,
                repositories: RepositoryFactory::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// A repository for `T`. Handles for the same type share parsed queries.
    pub fn repository<T: Entity>(&self) -> Repository<T> {
        self.inner.repositories.repository::<T>(&self.inner.config)
    }

    /// A fresh unit of work without a transaction. Writes are staged until
    /// [UnitOfWork::begin] is called.
    pub fn unit_of_work(&self) -> QuarryResult<UnitOfWork> {
        self.inner.check_opened()?;
        let session = self.inner.store.open_session()?;
        Ok(UnitOfWork::new(session, self.inner.config.clone()))
    }

    /// A unit of work with an active transaction.
    pub fn begin(&self) -> QuarryResult<UnitOfWork> {
        let uow = self.unit_of_work()?;
        uow.begin()?;
        Ok(uow)
    }

    /// Runs `func` in a new transaction, committing when it succeeds and
    /// rolling back when it fails.
    pub fn with_unit_of_work<F, R>(&self, func: F) -> QuarryResult<R>
    where
        F: FnOnce(&UnitOfWork) -> QuarryResult<R>,
    {
        let uow = self.begin()?;
        match func(&uow) {
            Ok(result) => {
                uow.commit()?;
                Ok(result)
            }
            Err(error) => {
                log::debug!("Rolling back unit of work {} after error: {}", uow.id(), error);
                if let Err(rollback) = uow.rollback() {
                    log::error!("Rollback of unit of work {} failed: {}", uow.id(), rollback);
                }
                Err(error)
            }
        }
    }

    pub fn config(&self) -> QuarryConfig {
        self.inner.config.clone()
    }

    pub fn store(&self) -> Store {
        self.inner.store.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Closes the store. Open units of work fail from then on.
    pub fn close(&self) -> QuarryResult<()> {
        if self.inner.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        self.inner.repositories.clear();
        log::debug!("Closing quarry");
        self.inner.store.close()
    }
}

struct QuarryInner {
    config: QuarryConfig,
    store: Store,
    repositories: RepositoryFactory,
    closed: AtomicBool,
}

impl QuarryInner {
    fn check_opened(&self) -> QuarryResult<()> {
        if self.closed.load(Ordering::Relaxed) || self.store.is_closed() {
            log::error!("Quarry is closed");
            return Err(QuarryError::new("quarry is closed", ErrorKind::StoreUnavailable));
        }
        Ok(())
    }
}
