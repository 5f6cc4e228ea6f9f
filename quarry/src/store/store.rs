use crate::errors::QuarryResult;
use crate::store::StoreSession;
use std::ops::Deref;
use std::sync::Arc;

/// A store that hands out sessions. The core never manages connections
/// itself; it asks the store for one session per unit of work.
pub trait StoreProvider: Send + Sync {
    fn open_session(&self) -> QuarryResult<StoreSession>;

    fn is_closed(&self) -> bool;

    fn close(&self) -> QuarryResult<()>;
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn StoreProvider>,
}

impl Store {
    pub fn new<T: StoreProvider + 'static>(inner: T) -> Self {
        Store {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Store {
    type Target = Arc<dyn StoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
