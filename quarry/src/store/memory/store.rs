use crate::common::{Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::store::memory::table::Table;
use crate::store::memory::{InMemorySession, InMemoryStoreConfig};
use crate::store::{StoreProvider, StoreSession};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A store that keeps every entity table in memory.
///
/// Tables are persistent maps, so a transaction can take a snapshot of a
/// table in constant time and work on it privately until commit.
///
/// For testing failure handling, [InMemoryStore::inject_fault] makes every
/// subsequent store call fail with the given error kind.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new(config: InMemoryStoreConfig) -> InMemoryStore {
        InMemoryStore {
            inner: Arc::new(InMemoryStoreInner::new(config)),
        }
    }

    /// Makes every later store call fail with `kind`, or restores normal
    /// operation with `None`.
    pub fn inject_fault(&self, kind: Option<ErrorKind>) {
        log::debug!("Setting in-memory store fault to {:?}", kind);
        *self.inner.fault.write() = kind;
    }

    /// Number of committed rows of an entity.
    pub fn row_count(&self, entity: &str) -> usize {
        self.inner
            .tables
            .get(entity)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// The committed row stored under `key`.
    pub fn committed(&self, entity: &str, key: &Value) -> Option<Record> {
        self.inner
            .tables
            .get(entity)
            .and_then(|table| table.get(key).cloned())
    }

    pub(crate) fn config(&self) -> &InMemoryStoreConfig {
        &self.inner.config
    }

    pub(crate) fn check_available(&self) -> QuarryResult<()> {
        if self.inner.closed.load(Ordering::Relaxed) {
            log::error!("In-memory store is closed");
            return Err(QuarryError::new(
                "store is closed",
                ErrorKind::StoreUnavailable,
            ));
        }
        if let Some(kind) = self.inner.fault.read().clone() {
            log::error!("In-memory store failing with {}", kind);
            return Err(QuarryError::new(
                &format!("store failure: {}", kind),
                kind,
            ));
        }
        Ok(())
    }

    /// The committed state of a table. Cloning is constant time.
    pub(crate) fn snapshot(&self, entity: &str) -> Table {
        self.inner
            .tables
            .get(entity)
            .map(|table| table.clone())
            .unwrap_or_default()
    }

    /// Serializes writers; fails with a timeout if the lock stays busy.
    pub(crate) fn write_lock(&self) -> QuarryResult<MutexGuard<'_, ()>> {
        let timeout = self.inner.config.get_lock_timeout();
        self.inner.write_lock.try_lock_for(timeout).ok_or_else(|| {
            log::error!("Timed out after {:?} waiting for the store write lock", timeout);
            QuarryError::new(
                &format!("timed out after {:?} waiting for the store write lock", timeout),
                ErrorKind::OperationTimeout,
            )
        })
    }

    /// Replaces a whole table. Callers hold the write lock.
    pub(crate) fn publish_table(&self, entity: &str, table: Table) {
        self.inner.tables.insert(entity.to_string(), table);
    }

    /// Writes or deletes single rows. Callers hold the write lock.
    pub(crate) fn publish_rows(&self, entity: &str, rows: Vec<(Value, Option<Record>)>) {
        let mut table = self.inner.tables.entry(entity.to_string()).or_default();
        for (key, row) in rows {
            match row {
                Some(record) => {
                    table.insert(key, record);
                }
                None => {
                    table.remove(&key);
                }
            }
        }
    }

    pub(crate) fn next_id(&self, entity: &str) -> i64 {
        let start = self.inner.config.get_sequence_start();
        let mut sequence = self
            .inner
            .sequences
            .entry(entity.to_string())
            .or_insert(start - 1);
        *sequence += 1;
        *sequence
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new(InMemoryStoreConfig::default())
    }
}

impl StoreProvider for InMemoryStore {
    fn open_session(&self) -> QuarryResult<StoreSession> {
        self.check_available()?;
        Ok(StoreSession::new(InMemorySession::new(self.clone())))
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    fn close(&self) -> QuarryResult<()> {
        if self.inner.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        log::debug!("Closing in-memory store");
        self.inner.tables.clear();
        self.inner.sequences.clear();
        Ok(())
    }
}

struct InMemoryStoreInner {
    config: InMemoryStoreConfig,
    tables: DashMap<String, Table>,
    sequences: DashMap<String, i64>,
    fault: RwLock<Option<ErrorKind>>,
    write_lock: Mutex<()>,
    closed: AtomicBool,
}

impl InMemoryStoreInner {
    fn new(config: InMemoryStoreConfig) -> InMemoryStoreInner {
        InMemoryStoreInner {
            config,
            tables: DashMap::new(),
            sequences: DashMap::new(),
            fault: RwLock::new(None),
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }
}
