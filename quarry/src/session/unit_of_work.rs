use crate::common::{mapping_error, Convertible, Record, Sort, SortOrder, Value};
use crate::entity::{entity_key, Entity, EntityMeta, EntityState, FetchType, IdStrategy, Relation};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::field;
use crate::mapper::entities;
use crate::quarry_config::QuarryConfig;
use crate::query::{DeleteSpec, QuerySpec, Selection, UpdateSpec};
use crate::session::ModifyingOptions;
use crate::store::StoreSession;
use indexmap::IndexMap;
use itertools::Itertools;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

/// Eager relations are followed this many levels deep.
const MAX_EAGER_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntityKey {
    entity: String,
    key: Value,
}

impl EntityKey {
    fn new(entity: &str, key: Value) -> Self {
        EntityKey {
            entity: entity.to_string(),
            key,
        }
    }
}

struct ManagedEntry {
    record: Record,
    state: EntityState,
}

#[derive(Debug, Clone)]
enum PendingAction {
    Persist(EntityKey),
    Remove(EntityKey),
}

impl PendingAction {
    fn target(&self) -> &EntityKey {
        match self {
            PendingAction::Persist(key) | PendingAction::Remove(key) => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CountKey {
    entity: String,
    query: String,
    joined: bool,
}

struct ContextState {
    managed: IndexMap<EntityKey, ManagedEntry>,
    pending: Vec<PendingAction>,
    count_cache: Option<LruCache<CountKey, u64>>,
    closed: bool,
}

impl ContextState {
    /// Drops cached counts over `entity` and every cached count that
    /// involves a join, since a join result depends on other tables.
    fn invalidate_counts(&mut self, entity: &str) {
        if let Some(cache) = self.count_cache.as_mut() {
            let stale = cache
                .iter()
                .filter(|(key, _)| key.entity == entity || key.joined)
                .map(|(key, _)| key.clone())
                .collect_vec();
            for key in stale {
                cache.pop(&key);
            }
        }
    }

    fn has_unflushed(&self, entity: &str) -> bool {
        self.pending.iter().any(|action| action.target().entity == entity)
    }

    fn detach_all(&mut self) {
        self.managed.clear();
        self.pending.clear();
        if let Some(cache) = self.count_cache.as_mut() {
            cache.clear();
        }
    }
}

/// An explicit persistence context, passed to every repository call.
///
/// A unit of work keeps an identity map of the entities it has loaded or
/// saved and an ordered list of staged writes. Staged writes reach the
/// store on [UnitOfWork::flush], which runs automatically before queries
/// so reads observe earlier writes of the same unit of work. Without an
/// active transaction nothing is flushed and staged entities are served
/// from the identity map.
///
/// A query row whose identity is already managed is answered with the
/// managed copy. After a set-based update this copy can be stale until
/// [UnitOfWork::refresh] or [UnitOfWork::clear].
///
/// Commit and rollback end the unit of work. Dropping one that is still
/// open rolls it back.
///
/// ```rust,ignore
/// let uow = quarry.begin()?;
/// let mut member = Member::new("member1", 10);
/// members.save(&uow, &mut member)?;
/// uow.commit()?;
/// ```
pub struct UnitOfWork {
    id: String,
    session: StoreSession,
    config: QuarryConfig,
    state: Mutex<ContextState>,
}

impl UnitOfWork {
    pub(crate) fn new(session: StoreSession, config: QuarryConfig) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let count_cache = NonZeroUsize::new(config.count_cache_capacity()).map(LruCache::new);
        log::debug!("Opening unit of work {}", id);
        UnitOfWork {
            id,
            session,
            config,
            state: Mutex::new(ContextState {
                managed: IndexMap::new(),
                pending: Vec::new(),
                count_cache,
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Starts the store transaction this unit of work flushes into.
    pub fn begin(&self) -> QuarryResult<()> {
        self.check_open()?;
        self.session.begin()
    }

    /// Writes staged actions to the store, in the order they were staged.
    /// A logged no-op while no transaction is active.
    pub fn flush(&self) -> QuarryResult<()> {
        self.check_open()?;
        if !self.session.is_active() {
            let staged = self.state.lock().pending.len();
            if staged > 0 {
                log::debug!(
                    "Unit of work {} has no active transaction, keeping {} staged action(s)",
                    self.id,
                    staged
                );
            }
            return Ok(());
        }

        let actions = {
            let state = self.state.lock();
            state
                .pending
                .iter()
                .map(|action| {
                    let record = match action {
                        PendingAction::Persist(key) => {
                            state.managed.get(key).map(|entry| entry.record.clone())
                        }
                        PendingAction::Remove(_) => None,
                    };
                    (action.clone(), record)
                })
                .collect_vec()
        };
        if actions.is_empty() {
            return Ok(());
        }

        for (action, record) in &actions {
            match (action, record) {
                (PendingAction::Persist(key), Some(record)) => {
                    self.session.persist(&key.entity, &key.key, record)?
                }
                // detached after staging
                (PendingAction::Persist(_), None) => {}
                (PendingAction::Remove(key), _) => self.session.remove(&key.entity, &key.key)?,
            }
        }
        self.session.flush()?;

        let mut state = self.state.lock();
        let flushed = actions.len().min(state.pending.len());
        state.pending.drain(..flushed);
        log::debug!("Unit of work {} flushed {} action(s)", self.id, flushed);
        Ok(())
    }

    /// Detaches every managed entity and discards staged actions.
    pub fn clear(&self) -> QuarryResult<()> {
        self.check_open()?;
        let discarded = {
            let mut state = self.state.lock();
            let discarded = state.pending.len();
            state.detach_all();
            discarded
        };
        log::debug!(
            "Unit of work {} cleared, {} staged action(s) discarded",
            self.id,
            discarded
        );
        self.session.clear()
    }

    /// Flushes, commits the transaction and ends the unit of work. If the
    /// flush fails the transaction is rolled back.
    pub fn commit(&self) -> QuarryResult<()> {
        self.check_open()?;
        self.require_transaction("commit")?;
        if let Err(error) = self.flush() {
            log::error!("Flush before commit failed in {}: {}", self.id, error);
            self.rollback()?;
            return Err(error);
        }
        self.session.commit()?;
        log::debug!("Unit of work {} committed", self.id);
        self.finish()
    }

    /// Discards the transaction and ends the unit of work.
    pub fn rollback(&self) -> QuarryResult<()> {
        self.check_open()?;
        self.session.rollback()?;
        log::debug!("Unit of work {} rolled back", self.id);
        self.finish()
    }

    /// Ends the unit of work, rolling back an active transaction.
    pub fn close(&self) -> QuarryResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        if self.session.is_active() {
            log::debug!("Unit of work {} closed with an active transaction", self.id);
            self.session.rollback()?;
        }
        self.finish()
    }

    fn finish(&self) -> QuarryResult<()> {
        {
            let mut state = self.state.lock();
            state.detach_all();
            state.closed = true;
        }
        self.session.close()
    }

    /// Stages an insert of a transient entity or an update of one with an
    /// identity. A generated identity is assigned here.
    pub fn persist<T: Entity>(&self, entity: &mut T) -> QuarryResult<()> {
        self.check_open()?;
        let meta = T::meta();
        let key = match entity_key(entity)? {
            Some(key) => key,
            None => self.assign_id(entity, &meta)?,
        };
        let record = to_record(entity)?;

        let target = EntityKey::new(meta.name(), key);
        let mut state = self.state.lock();
        if state
            .managed
            .get(&target)
            .is_some_and(|entry| entry.state == EntityState::Removed)
        {
            log::error!("Cannot save removed {} {} in {}", meta.name(), target.key, self.id);
            return Err(QuarryError::new(
                &format!("{} {} was removed in this unit of work", meta.name(), target.key),
                ErrorKind::InvalidOperation,
            ));
        }
        let previous = state.managed.insert(
            target.clone(),
            ManagedEntry {
                record,
                state: EntityState::Persistent,
            },
        );
        log::debug!(
            "{} {} {} in unit of work {}",
            if previous.is_some() { "Updated" } else { "Staged" },
            meta.name(),
            target.key,
            self.id
        );
        state.pending.push(PendingAction::Persist(target));
        state.invalidate_counts(meta.name());
        Ok(())
    }

    fn assign_id<T: Entity>(&self, entity: &mut T, meta: &EntityMeta) -> QuarryResult<Value> {
        match meta.id_strategy() {
            IdStrategy::Generated => {
                let next = self.session.next_id(meta.name())?;
                entity.set_id(T::Id::from_value(&Value::I64(next))?);
                entity_key(entity)?.ok_or_else(|| not_identifiable(meta.name(), "save"))
            }
            IdStrategy::Assigned => Err(not_identifiable(meta.name(), "save")),
        }
    }

    /// Stages a delete. The entity stays in the identity map as removed.
    pub fn remove<T: Entity>(&self, entity: &T) -> QuarryResult<()> {
        self.check_open()?;
        let meta = T::meta();
        let key = entity_key(entity)?.ok_or_else(|| not_identifiable(meta.name(), "delete"))?;
        let record = to_record(entity)?;

        let target = EntityKey::new(meta.name(), key);
        let mut state = self.state.lock();
        match state.managed.get_mut(&target) {
            Some(entry) => entry.state = EntityState::Removed,
            None => {
                state.managed.insert(
                    target.clone(),
                    ManagedEntry {
                        record,
                        state: EntityState::Removed,
                    },
                );
            }
        }
        log::debug!("Removed {} {} in unit of work {}", meta.name(), target.key, self.id);
        state.pending.push(PendingAction::Remove(target));
        state.invalidate_counts(meta.name());
        Ok(())
    }

    pub fn find<T: Entity>(&self, id: &T::Id) -> QuarryResult<Option<T>> {
        let key = id.to_value()?;
        if key.is_null() {
            return Ok(None);
        }
        self.find_by_key(&key)
    }

    /// Looks in the identity map first, then in the store.
    pub fn find_by_key<T: Entity>(&self, key: &Value) -> QuarryResult<Option<T>> {
        self.check_open()?;
        let meta = T::meta();
        let managed = {
            let state = self.state.lock();
            state
                .managed
                .get(&EntityKey::new(meta.name(), key.clone()))
                .map(|entry| (entry.record.clone(), entry.state))
        };

        let rows = match managed {
            Some((_, EntityState::Removed)) => return Ok(None),
            Some((record, _)) => self.resolve_eager(vec![record], &meta, 0)?,
            None => {
                let spec = QuerySpec::new(meta.name())
                    .with_filter(field(meta.id_field()).eq(key.clone()));
                self.fetch_records(&spec, &meta)?
            }
        };
        Ok(entities::<T>(rows)?.into_iter().next())
    }

    pub fn state_of<T: Entity>(&self, entity: &T) -> QuarryResult<EntityState> {
        let meta = T::meta();
        let state = match entity_key(entity)? {
            None => EntityState::Transient,
            Some(key) => self
                .state
                .lock()
                .managed
                .get(&EntityKey::new(meta.name(), key))
                .map(|entry| entry.state)
                .unwrap_or(EntityState::Detached),
        };
        Ok(state)
    }

    /// Whether the entity is managed and not removed.
    pub fn contains<T: Entity>(&self, entity: &T) -> QuarryResult<bool> {
        Ok(self.state_of(entity)? == EntityState::Persistent)
    }

    /// Stops tracking the entity. Its staged actions are dropped.
    pub fn detach<T: Entity>(&self, entity: &T) -> QuarryResult<()> {
        if let Some(key) = entity_key(entity)? {
            let target = EntityKey::new(T::entity_name(), key);
            let mut state = self.state.lock();
            state.managed.shift_remove(&target);
            state.pending.retain(|action| action.target() != &target);
        }
        Ok(())
    }

    /// Reloads the entity from the store, replacing both the managed copy
    /// and the caller's value.
    pub fn refresh<T: Entity>(&self, entity: &mut T) -> QuarryResult<()> {
        self.check_open()?;
        let meta = T::meta();
        let key = entity_key(entity)?.ok_or_else(|| not_identifiable(meta.name(), "refresh"))?;
        let spec =
            QuerySpec::new(meta.name()).with_filter(field(meta.id_field()).eq(key.clone()));
        let row = self
            .session
            .execute_query(&spec)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                log::error!("Cannot refresh {} {}: not in the store", meta.name(), key);
                QuarryError::new(
                    &format!("{} {} no longer exists in the store", meta.name(), key),
                    ErrorKind::NotFound,
                )
            })?;

        self.state.lock().managed.insert(
            EntityKey::new(meta.name(), key),
            ManagedEntry {
                record: row.clone(),
                state: EntityState::Persistent,
            },
        );
        let resolved = self.resolve_eager(vec![row], &meta, 0)?;
        if let Some(record) = resolved.into_iter().next() {
            *entity = T::from_value(&Value::Record(record))?;
        }
        Ok(())
    }

    /// Runs a query and returns its rows: managed records for entity
    /// selections, plain projected records otherwise.
    pub(crate) fn fetch_records(&self, spec: &QuerySpec, meta: &EntityMeta) -> QuarryResult<Vec<Record>> {
        self.check_open()?;
        self.auto_flush()?;
        self.load_rows(spec, meta, 0)
    }

    /// Counts the rows `spec` selects, ignoring sort and window. Counts are
    /// cached until the entity is written.
    pub(crate) fn count_records(&self, spec: &QuerySpec, meta: &EntityMeta) -> QuarryResult<u64> {
        self.check_open()?;
        self.auto_flush()?;

        let unwindowed = spec
            .clone()
            .with_offset(0)
            .with_limit(None)
            .with_sort(Sort::unsorted());
        let key = CountKey {
            entity: meta.name().to_string(),
            query: unwindowed.to_string(),
            joined: !spec.joins().is_empty(),
        };

        let cached = {
            let mut state = self.state.lock();
            state
                .count_cache
                .as_mut()
                .and_then(|cache| cache.get(&key).copied())
        };
        if let Some(count) = cached {
            log::debug!("Count cache hit for {}", key.query);
            return Ok(count);
        }

        let count = if self.needs_post_processing(spec, meta) {
            let unwindowed = match unwindowed.selection() {
                Selection::Count => unwindowed.with_selection(Selection::Entities),
                _ => unwindowed,
            };
            self.load_rows(&unwindowed, meta, 0)?.len() as u64
        } else {
            self.session.execute_count(&spec.for_count())?
        };

        if let Some(cache) = self.state.lock().count_cache.as_mut() {
            cache.put(key, count);
        }
        Ok(count)
    }

    /// Runs a set-based update. Managed entities are not touched.
    pub(crate) fn execute_update(&self, spec: &UpdateSpec, options: ModifyingOptions) -> QuarryResult<u64> {
        self.check_open()?;
        self.require_transaction("bulk update")?;
        if options.is_flush_automatically() {
            self.flush()?;
        }
        let affected = self.session.execute_update(spec)?;
        log::debug!(
            "{} affected {} row(s) in unit of work {}",
            spec,
            affected,
            self.id
        );
        self.after_modifying(spec.entity(), options)?;
        Ok(affected)
    }

    /// Runs a set-based delete. Managed entities are not touched.
    pub(crate) fn execute_delete(&self, spec: &DeleteSpec, options: ModifyingOptions) -> QuarryResult<u64> {
        self.check_open()?;
        self.require_transaction("bulk delete")?;
        if options.is_flush_automatically() {
            self.flush()?;
        }
        let affected = self.session.execute_delete(spec)?;
        log::debug!(
            "{} affected {} row(s) in unit of work {}",
            spec,
            affected,
            self.id
        );
        self.after_modifying(spec.entity(), options)?;
        Ok(affected)
    }

    fn after_modifying(&self, entity: &str, options: ModifyingOptions) -> QuarryResult<()> {
        self.state.lock().invalidate_counts(entity);
        if options.is_clear_automatically() {
            self.clear()?;
        }
        Ok(())
    }

    fn check_open(&self) -> QuarryResult<()> {
        if self.state.lock().closed {
            log::error!("Unit of work {} is closed", self.id);
            return Err(QuarryError::new(
                &format!("unit of work {} is closed", self.id),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn require_transaction(&self, operation: &str) -> QuarryResult<()> {
        if self.session.is_active() {
            return Ok(());
        }
        log::error!("{} requires an active transaction in {}", operation, self.id);
        Err(QuarryError::new(
            &format!("{} requires an active transaction", operation),
            ErrorKind::TransactionError,
        ))
    }

    fn auto_flush(&self) -> QuarryResult<()> {
        if self.config.flush_before_query() {
            self.flush()?;
        }
        Ok(())
    }

    /// Projections, inner joins and unflushed writes need the full row set
    /// here before the window can be applied.
    fn needs_post_processing(&self, spec: &QuerySpec, meta: &EntityMeta) -> bool {
        let projecting = matches!(spec.selection(), Selection::Fields(_));
        projecting
            || spec.joins().iter().any(|join| !join.is_left())
            || self.state.lock().has_unflushed(meta.name())
    }

    fn load_rows(&self, spec: &QuerySpec, meta: &EntityMeta, depth: usize) -> QuarryResult<Vec<Record>> {
        let projecting = matches!(spec.selection(), Selection::Fields(_));
        let post = self.needs_post_processing(spec, meta);
        let store_spec = if post {
            spec.unwindowed_entities()
        } else {
            spec.clone().with_selection(Selection::Entities)
        };

        let mut rows = self.session.execute_query(&store_spec)?;
        if !projecting {
            let (attached, staged) = self.attach(rows, meta, spec)?;
            rows = attached;
            if staged {
                let order = if spec.sort().is_unsorted() {
                    Sort::by(SortOrder::Ascending, &[meta.id_field()])
                } else {
                    spec.sort().clone()
                };
                rows.sort_by(|a, b| order.compare(a, b));
            }
        }

        for join in spec.joins() {
            let relation = meta.relation(join.relation()).ok_or_else(|| {
                log::error!("Unknown relation {} on {}", join.relation(), meta.name());
                QuarryError::new(
                    &format!("entity {} has no relation {}", meta.name(), join.relation()),
                    ErrorKind::QueryDerivationError,
                )
            })?;
            let embed = join.is_fetch() || projecting;
            rows = self.join_relation(rows, relation, embed, !join.is_left(), depth)?;
        }
        if !projecting {
            rows = self.resolve_eager(rows, meta, depth)?;
        }

        if !post {
            return Ok(rows);
        }
        let rows = match spec.selection() {
            Selection::Fields(paths) => rows.iter().map(|row| row.select(paths)).collect_vec(),
            _ => rows,
        };
        let rows = if spec.is_distinct() {
            rows.into_iter().unique().collect_vec()
        } else {
            rows
        };
        let offset = usize::try_from(spec.offset()).unwrap_or(usize::MAX);
        let limit = spec
            .limit()
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    /// Puts store rows through the identity map. Returns the rows and
    /// whether unflushed writes of the entity were applied, in which case
    /// the store's order no longer holds.
    ///
    /// While writes are unflushed the store has filtered its own copy of
    /// each row, so managed copies are checked against the filter again and
    /// staged entities missing from the store are added.
    fn attach(&self, rows: Vec<Record>, meta: &EntityMeta, spec: &QuerySpec) -> QuarryResult<(Vec<Record>, bool)> {
        let mut state = self.state.lock();
        let staged = state.has_unflushed(meta.name());
        let mut seen = HashSet::new();
        let mut attached = Vec::with_capacity(rows.len());

        for row in rows {
            let key = row.get(meta.id_field());
            if key.is_null() {
                attached.push(row);
                continue;
            }
            let target = EntityKey::new(meta.name(), key);
            match state.managed.get(&target) {
                Some(entry) if entry.state == EntityState::Removed => {}
                Some(entry) => {
                    if !staged || spec.filter().apply(&entry.record)? {
                        attached.push(entry.record.clone());
                    }
                }
                None => {
                    state.managed.insert(
                        target.clone(),
                        ManagedEntry {
                            record: row.clone(),
                            state: EntityState::Persistent,
                        },
                    );
                    attached.push(row);
                }
            }
            seen.insert(target);
        }

        if staged {
            for (target, entry) in state.managed.iter() {
                if target.entity == meta.name()
                    && entry.state == EntityState::Persistent
                    && !seen.contains(target)
                    && spec.filter().apply(&entry.record)?
                {
                    attached.push(entry.record.clone());
                }
            }
        }
        Ok((attached, staged))
    }

    /// Loads the targets of `relation` for all rows in one query. With
    /// `embed` the target record replaces the stored key; with `inner`
    /// rows without a target are dropped.
    fn join_relation(
        &self,
        rows: Vec<Record>,
        relation: &Relation,
        embed: bool,
        inner: bool,
        depth: usize,
    ) -> QuarryResult<Vec<Record>> {
        let target = relation.target();
        let keys = rows
            .iter()
            .map(|row| row.get(relation.field()))
            .filter(|key| !key.is_null() && !key.is_record())
            .unique()
            .collect_vec();

        let targets: HashMap<Value, Record> = if keys.is_empty() {
            HashMap::new()
        } else {
            let spec = QuerySpec::new(target.name())
                .with_filter(field(target.id_field()).in_list(keys));
            self.load_rows(&spec, &target, depth + 1)?
                .into_iter()
                .map(|record| (record.get(target.id_field()), record))
                .collect()
        };

        let joined = rows
            .into_iter()
            .filter_map(|mut row| {
                let resolved = match row.get(relation.field()) {
                    Value::Null => false,
                    Value::Record(_) => true,
                    key => match targets.get(&key) {
                        Some(record) => {
                            if embed {
                                row.put(relation.field(), record.clone());
                            }
                            true
                        }
                        None => false,
                    },
                };
                (resolved || !inner).then_some(row)
            })
            .collect();
        Ok(joined)
    }

    fn resolve_eager(&self, rows: Vec<Record>, meta: &EntityMeta, depth: usize) -> QuarryResult<Vec<Record>> {
        if depth >= MAX_EAGER_DEPTH {
            return Ok(rows);
        }
        let mut rows = rows;
        for relation in meta.relations() {
            if relation.fetch() == FetchType::Eager {
                rows = self.join_relation(rows, relation, true, false, depth)?;
            }
        }
        Ok(rows)
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::error!("Failed to close unit of work {}: {}", self.id, error);
        }
    }
}

fn to_record<T: Entity>(entity: &T) -> QuarryResult<Record> {
    match entity.to_value()? {
        Value::Record(record) => Ok(record),
        other => Err(mapping_error(&other, "record")),
    }
}

fn not_identifiable(entity: &str, operation: &str) -> QuarryError {
    log::error!("Cannot {} {} without an identity", operation, entity);
    QuarryError::new(
        &format!("cannot {} {} without an identity", operation, entity),
        ErrorKind::NotIdentifiable,
    )
}
