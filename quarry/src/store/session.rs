use crate::common::{Record, Value};
use crate::errors::QuarryResult;
use crate::query::{DeleteSpec, QuerySpec, UpdateSpec};
use std::ops::Deref;
use std::sync::Arc;

/// Begin/commit/rollback lifecycle of a store transaction.
pub trait TransactionBoundary {
    fn begin(&self) -> QuarryResult<()>;

    /// Publishes the transaction's writes.
    fn commit(&self) -> QuarryResult<()>;

    /// Discards the transaction's writes.
    fn rollback(&self) -> QuarryResult<()>;

    fn is_active(&self) -> bool;
}

/// One connection-like conversation with a store.
///
/// A unit of work owns exactly one session. Reads made inside an active
/// transaction observe that transaction's writes. Errors raised by the
/// store, including [crate::errors::ErrorKind::StoreUnavailable] and
/// [crate::errors::ErrorKind::OperationTimeout], are returned as they are.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`.
pub trait StoreSessionProvider: TransactionBoundary + Send + Sync {
    /// Rows matching the query after sort, distinct, selection and window.
    /// Joins are resolved by the caller.
    fn execute_query(&self, spec: &QuerySpec) -> QuarryResult<Vec<Record>>;

    /// Number of rows matching the query filter, ignoring sort and window.
    fn execute_count(&self, spec: &QuerySpec) -> QuarryResult<u64>;

    /// Applies every mutation to every matching row, or to none of them.
    fn execute_update(&self, spec: &UpdateSpec) -> QuarryResult<u64>;

    fn execute_delete(&self, spec: &DeleteSpec) -> QuarryResult<u64>;

    /// Inserts or replaces the record stored under `key`.
    fn persist(&self, entity: &str, key: &Value, record: &Record) -> QuarryResult<()>;

    fn remove(&self, entity: &str, key: &Value) -> QuarryResult<()>;

    /// Next value of the entity's identity sequence. Sequences are not
    /// transactional.
    fn next_id(&self, entity: &str) -> QuarryResult<i64>;

    /// Pushes buffered writes to the store.
    fn flush(&self) -> QuarryResult<()>;

    /// Drops anything the session cached from earlier reads.
    fn clear(&self) -> QuarryResult<()>;

    /// Ends the session, rolling back an active transaction.
    fn close(&self) -> QuarryResult<()>;
}

#[derive(Clone)]
pub struct StoreSession {
    inner: Arc<dyn StoreSessionProvider>,
}

impl StoreSession {
    pub fn new<T: StoreSessionProvider + 'static>(inner: T) -> Self {
        StoreSession {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for StoreSession {
    type Target = Arc<dyn StoreSessionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
