use crate::common::{Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::query::{DeleteSpec, QuerySpec, UpdateSpec};
use crate::store::memory::table::{apply_mutations, matching, select, Table};
use crate::store::memory::InMemoryStore;
use crate::store::{StoreSessionProvider, TransactionBoundary};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

/// A session on an [InMemoryStore].
///
/// Without a transaction every write is published at once. Inside a
/// transaction the session reads and writes private snapshots of the
/// tables it touches; commit publishes the rows it wrote, rollback
/// drops the snapshots.
pub struct InMemorySession {
    id: String,
    store: InMemoryStore,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    transaction: Option<Transaction>,
    closed: bool,
}

#[derive(Default)]
struct Transaction {
    tables: HashMap<String, Table>,
    written: HashMap<String, BTreeSet<Value>>,
}

impl Transaction {
    fn table(&mut self, store: &InMemoryStore, entity: &str) -> &mut Table {
        self.tables
            .entry(entity.to_string())
            .or_insert_with(|| store.snapshot(entity))
    }

    fn mark_written(&mut self, entity: &str, keys: impl IntoIterator<Item = Value>) {
        self.written
            .entry(entity.to_string())
            .or_default()
            .extend(keys);
    }
}

impl InMemorySession {
    pub fn new(store: InMemoryStore) -> InMemorySession {
        let id = uuid::Uuid::new_v4().to_string();
        log::debug!("Opening in-memory session {}", id);
        InMemorySession {
            id,
            store,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn check_open(&self, state: &SessionState) -> QuarryResult<()> {
        if state.closed {
            log::error!("Session {} is closed", self.id);
            return Err(QuarryError::new(
                &format!("session {} is closed", self.id),
                ErrorKind::InvalidOperation,
            ));
        }
        self.store.check_available()
    }

    /// Current view of a table: the transaction snapshot when one is
    /// active, the committed table otherwise.
    fn read_table(&self, state: &mut SessionState, entity: &str) -> Table {
        match state.transaction.as_mut() {
            Some(transaction) => transaction.table(&self.store, entity).clone(),
            None => self.store.snapshot(entity),
        }
    }

    /// Applies `change` to a copy of the table and keeps the copy only if
    /// the change succeeds. Returns the keys written by the change.
    fn write_table<F>(&self, state: &mut SessionState, entity: &str, change: F) -> QuarryResult<usize>
    where
        F: FnOnce(&mut Table) -> QuarryResult<Vec<Value>>,
    {
        match state.transaction.as_mut() {
            Some(transaction) => {
                let mut copy = transaction.table(&self.store, entity).clone();
                let keys = change(&mut copy)?;
                let affected = keys.len();
                transaction.tables.insert(entity.to_string(), copy);
                transaction.mark_written(entity, keys);
                Ok(affected)
            }
            None => {
                let _guard = self.store.write_lock()?;
                let mut copy = self.store.snapshot(entity);
                let keys = change(&mut copy)?;
                self.store.publish_table(entity, copy);
                Ok(keys.len())
            }
        }
    }
}

impl TransactionBoundary for InMemorySession {
    fn begin(&self) -> QuarryResult<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        if state.transaction.is_some() {
            log::error!("Session {} already has an active transaction", self.id);
            return Err(QuarryError::new(
                "a transaction is already active",
                ErrorKind::TransactionError,
            ));
        }
        log::debug!("Session {} began a transaction", self.id);
        state.transaction = Some(Transaction::default());
        Ok(())
    }

    fn commit(&self) -> QuarryResult<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        let transaction = state.transaction.take().ok_or_else(|| {
            log::error!("Session {} has no active transaction to commit", self.id);
            QuarryError::new("no active transaction to commit", ErrorKind::TransactionError)
        })?;

        let _guard = self.store.write_lock()?;
        for (entity, keys) in transaction.written {
            let table = transaction.tables.get(&entity).cloned().unwrap_or_default();
            let rows = keys
                .into_iter()
                .map(|key| {
                    let row = table.get(&key).cloned();
                    (key, row)
                })
                .collect();
            self.store.publish_rows(&entity, rows);
        }
        log::debug!("Session {} committed", self.id);
        Ok(())
    }

    fn rollback(&self) -> QuarryResult<()> {
        let mut state = self.state.lock();
        if state.transaction.take().is_some() {
            log::debug!("Session {} rolled back", self.id);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.state.lock().transaction.is_some()
    }
}

impl StoreSessionProvider for InMemorySession {
    fn execute_query(&self, spec: &QuerySpec) -> QuarryResult<Vec<Record>> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        let table = self.read_table(&mut state, spec.entity());
        let rows = select(&table, spec)?;
        log::debug!("Session {} ran {} -> {} row(s)", self.id, spec, rows.len());
        Ok(rows)
    }

    fn execute_count(&self, spec: &QuerySpec) -> QuarryResult<u64> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        let table = self.read_table(&mut state, spec.entity());
        if spec.is_distinct() {
            return Ok(select(&table, &spec.unwindowed_entities())?.len() as u64);
        }
        Ok(matching(&table, spec.filter())?.len() as u64)
    }

    fn execute_update(&self, spec: &UpdateSpec) -> QuarryResult<u64> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        let affected = self.write_table(&mut state, spec.entity(), |table| {
            let keys: Vec<Value> = matching(table, spec.filter())?
                .into_iter()
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                if let Some(row) = table.get_mut(key) {
                    apply_mutations(row, spec.mutations())?;
                }
            }
            Ok(keys)
        })?;
        log::debug!("Session {} ran {} -> {} row(s)", self.id, spec, affected);
        Ok(affected as u64)
    }

    fn execute_delete(&self, spec: &DeleteSpec) -> QuarryResult<u64> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        let affected = self.write_table(&mut state, spec.entity(), |table| {
            let keys: Vec<Value> = matching(table, spec.filter())?
                .into_iter()
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                table.remove(key);
            }
            Ok(keys)
        })?;
        log::debug!("Session {} ran {} -> {} row(s)", self.id, spec, affected);
        Ok(affected as u64)
    }

    fn persist(&self, entity: &str, key: &Value, record: &Record) -> QuarryResult<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        self.write_table(&mut state, entity, |table| {
            table.insert(key.clone(), record.clone());
            Ok(vec![key.clone()])
        })?;
        Ok(())
    }

    fn remove(&self, entity: &str, key: &Value) -> QuarryResult<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;
        self.write_table(&mut state, entity, |table| {
            table.remove(key);
            Ok(vec![key.clone()])
        })?;
        Ok(())
    }

    fn next_id(&self, entity: &str) -> QuarryResult<i64> {
        let state = self.state.lock();
        self.check_open(&state)?;
        Ok(self.store.next_id(entity))
    }

    fn flush(&self) -> QuarryResult<()> {
        let state = self.state.lock();
        self.check_open(&state)
    }

    fn clear(&self) -> QuarryResult<()> {
        let mut state = self.state.lock();
        if let Some(transaction) = state.transaction.as_mut() {
            let written = &transaction.written;
            transaction.tables.retain(|entity, _| written.contains_key(entity));
        }
        Ok(())
    }

    fn close(&self) -> QuarryResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        if state.transaction.take().is_some() {
            log::debug!("Session {} closed with an active transaction, rolled back", self.id);
        }
        state.closed = true;
        Ok(())
    }
}
