use crate::common::{Convertible, Sort, Value};
use crate::entity::{Entity, EntityMeta};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::{field, Filter};
use crate::mapper::entities;
use crate::paging::{Page, PageRequest, Paginator, Slice};
use crate::query::{
    validate_root_field, DeleteSpec, DerivedQuery, FieldMutation, QueryBuilder, QuerySpec,
    Selection, UpdateSpec,
};
use crate::repository::query_cache::QueryCache;
use crate::repository::{Invocation, QuerySource};
use crate::session::{ModifyingOptions, UnitOfWork};
use std::marker::PhantomData;
use std::sync::Arc;

/// The data-access façade for one entity type.
///
/// A repository holds no persistence state of its own. Every call takes the
/// [UnitOfWork] it runs in, so reads see the writes staged in that unit of
/// work and writes reach the store when it flushes or commits.
///
/// # Examples
///
/// ```rust,ignore
/// let members = quarry.repository::<Member>();
/// quarry.with_unit_of_work(|uow| {
///     let member = members.save(uow, Member::new("member1", 10))?;
///     let found = members.find_by_id(uow, &member.id.unwrap())?;
///     assert_eq!(found, Some(member));
///
///     let older = members
///         .derived(uow, "find_by_username_and_age_greater_than")?
///         .arg("member1")
///         .arg(5)
///         .list()?;
///     Ok(())
/// })?;
/// ```
pub struct Repository<T: Entity> {
    inner: Arc<RepositoryInner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

pub(crate) struct RepositoryInner {
    meta: EntityMeta,
    paginator: Paginator,
    queries: Arc<QueryCache>,
}

impl<T: Entity> Repository<T> {
    pub(crate) fn new(queries: Arc<QueryCache>, max_page_size: Option<u64>) -> Self {
        let meta = T::meta();
        let paginator = Paginator::new(meta.id_field(), max_page_size);
        Repository {
            inner: Arc::new(RepositoryInner {
                meta,
                paginator,
                queries,
            }),
            _marker: PhantomData,
        }
    }

    pub fn meta(&self) -> &EntityMeta {
        &self.inner.meta
    }

    /// Inserts a transient entity or updates one that has an identity.
    /// Returns the entity with its identity populated.
    pub fn save(&self, uow: &UnitOfWork, entity: T) -> QuarryResult<T> {
        let mut entity = entity;
        uow.persist(&mut entity)?;
        Ok(entity)
    }

    pub fn save_all(&self, uow: &UnitOfWork, entities: Vec<T>) -> QuarryResult<Vec<T>> {
        entities
            .into_iter()
            .map(|entity| self.save(uow, entity))
            .collect()
    }

    /// An absent identity is `Ok(None)`, never an error.
    pub fn find_by_id(&self, uow: &UnitOfWork, id: &T::Id) -> QuarryResult<Option<T>> {
        uow.find::<T>(id)
    }

    pub fn exists_by_id(&self, uow: &UnitOfWork, id: &T::Id) -> QuarryResult<bool> {
        Ok(self.find_by_id(uow, id)?.is_some())
    }

    pub fn find_all(&self, uow: &UnitOfWork) -> QuarryResult<Vec<T>> {
        self.find_with(uow, &self.spec())
    }

    pub fn find_all_sorted(&self, uow: &UnitOfWork, sort: Sort) -> QuarryResult<Vec<T>> {
        self.validate_sort(&sort)?;
        self.find_with(uow, &self.spec().with_sort(sort))
    }

    pub fn find_all_paged(&self, uow: &UnitOfWork, request: &PageRequest) -> QuarryResult<Page<T>> {
        self.page(uow, &self.spec(), request)
    }

    /// Loads the entities with the given identities in one query. Missing
    /// identities are skipped.
    pub fn find_all_by_ids(&self, uow: &UnitOfWork, ids: &[T::Id]) -> QuarryResult<Vec<T>> {
        let keys = ids
            .iter()
            .map(|id| id.to_value())
            .collect::<QuarryResult<Vec<Value>>>()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let filter = field(self.meta().id_field()).in_list(keys);
        self.find(uow, filter)
    }

    pub fn count(&self, uow: &UnitOfWork) -> QuarryResult<u64> {
        uow.count_records(&self.spec(), self.meta())
    }

    pub fn delete(&self, uow: &UnitOfWork, entity: &T) -> QuarryResult<()> {
        uow.remove(entity)
    }

    /// Returns whether an entity with that identity existed.
    pub fn delete_by_id(&self, uow: &UnitOfWork, id: &T::Id) -> QuarryResult<bool> {
        match self.find_by_id(uow, id)? {
            Some(entity) => {
                uow.remove(&entity)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every entity one by one through the unit of work.
    pub fn delete_all(&self, uow: &UnitOfWork) -> QuarryResult<u64> {
        let all = self.find_all(uow)?;
        for entity in &all {
            uow.remove(entity)?;
        }
        Ok(all.len() as u64)
    }

    /// Applies `mutations` to every row matching `filter` in one set-based
    /// statement and returns the number of rows changed.
    ///
    /// Entities already loaded into `uow` are not updated and read stale
    /// until refreshed, or until the unit of work is cleared through
    /// [ModifyingOptions::clear_automatically]. The statement fails as a
    /// whole; no partial count is reported.
    pub fn bulk_update(
        &self,
        uow: &UnitOfWork,
        filter: Filter,
        mutations: Vec<FieldMutation>,
        options: ModifyingOptions,
    ) -> QuarryResult<u64> {
        self.validate_filter(&filter)?;
        for mutation in &mutations {
            validate_root_field(self.meta(), mutation.field())?;
            if mutation.field() == self.meta().id_field() {
                log::error!("Bulk update of identity field {}", mutation.field());
                return Err(QuarryError::new(
                    &format!("the identity field {} cannot be updated", mutation.field()),
                    ErrorKind::InvalidOperation,
                ));
            }
        }
        if mutations.is_empty() {
            return Err(QuarryError::new(
                "a bulk update needs at least one mutation",
                ErrorKind::InvalidOperation,
            ));
        }
        let spec = UpdateSpec::new(self.meta().name(), filter, mutations);
        uow.execute_update(&spec, options)
    }

    /// Deletes every row matching `filter` in one set-based statement.
    /// Managed entities are not marked removed.
    pub fn bulk_delete(&self, uow: &UnitOfWork, filter: Filter, options: ModifyingOptions) -> QuarryResult<u64> {
        self.validate_filter(&filter)?;
        let spec = DeleteSpec::new(self.meta().name(), filter);
        uow.execute_delete(&spec, options)
    }

    pub fn find(&self, uow: &UnitOfWork, filter: Filter) -> QuarryResult<Vec<T>> {
        self.validate_filter(&filter)?;
        self.find_with(uow, &self.spec().with_filter(filter))
    }

    /// Runs a prepared query over whole entities.
    pub fn find_with(&self, uow: &UnitOfWork, spec: &QuerySpec) -> QuarryResult<Vec<T>> {
        self.check_entity_query(spec)?;
        entities(uow.fetch_records(spec, self.meta())?)
    }

    /// One page of `spec`, with the total number of matches.
    pub fn page(&self, uow: &UnitOfWork, spec: &QuerySpec, request: &PageRequest) -> QuarryResult<Page<T>> {
        self.check_entity_query(spec)?;
        self.validate_sort(request.sort())?;
        let paginator = &self.inner.paginator;
        let request = paginator.effective(request);
        let window = paginator.page_window(spec, &request);
        let content = entities(uow.fetch_records(&window, self.meta())?)?;
        paginator.assemble_page(content, request, || uow.count_records(spec, self.meta()))
    }

    /// One page of `spec` without counting the matches.
    pub fn slice(&self, uow: &UnitOfWork, spec: &QuerySpec, request: &PageRequest) -> QuarryResult<Slice<T>> {
        self.check_entity_query(spec)?;
        self.validate_sort(request.sort())?;
        let paginator = &self.inner.paginator;
        let request = paginator.effective(request);
        let window = paginator.slice_window(spec, &request);
        let content = entities(uow.fetch_records(&window, self.meta())?)?;
        Ok(paginator.assemble_slice(content, request))
    }

    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::for_meta(self.meta().clone())
    }

    /// Prepares a query derived from a method name such as
    /// `find_by_username_and_age_greater_than`. Arguments are bound with
    /// [Invocation::arg] in predicate order.
    pub fn derived<'a>(&'a self, uow: &'a UnitOfWork, name: &str) -> QuarryResult<Invocation<'a, T>> {
        let query = self.derived_query(name)?;
        Ok(Invocation::new(self, uow, QuerySource::Derived(query)))
    }

    /// Prepares an explicit query. Parameters are bound with
    /// [Invocation::param].
    pub fn query<'a>(&'a self, uow: &'a UnitOfWork, text: &str) -> QuarryResult<Invocation<'a, T>> {
        let query = self.inner.queries.explicit(text)?;
        Ok(Invocation::new(self, uow, QuerySource::Explicit(query)))
    }

    /// The parsed form of a derived method name, from the cache when the
    /// name was used before.
    pub fn derived_query(&self, name: &str) -> QuarryResult<Arc<DerivedQuery>> {
        self.inner.queries.derived(self.meta(), name)
    }

    pub(crate) fn paginator(&self) -> &Paginator {
        &self.inner.paginator
    }

    pub(crate) fn cached_queries(&self) -> usize {
        self.inner.queries.len()
    }

    pub(crate) fn validate_sort(&self, sort: &Sort) -> QuarryResult<()> {
        for order in sort.orders() {
            validate_root_field(self.meta(), order.field())?;
        }
        Ok(())
    }

    pub(crate) fn check_entity_query(&self, spec: &QuerySpec) -> QuarryResult<()> {
        if spec.entity() != self.meta().name() {
            log::error!(
                "Query over {} run through the {} repository",
                spec.entity(),
                self.meta().name()
            );
            return Err(QuarryError::new(
                &format!(
                    "query over {} cannot run in the repository of {}",
                    spec.entity(),
                    self.meta().name()
                ),
                ErrorKind::InvalidOperation,
            ));
        }
        if *spec.selection() != Selection::Entities {
            log::error!("Query {} does not select entities", spec);
            return Err(QuarryError::new(
                &format!("query {} does not select whole entities", spec),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn validate_filter(&self, filter: &Filter) -> QuarryResult<()> {
        for name in filter.field_names() {
            validate_root_field(self.meta(), &name)?;
        }
        Ok(())
    }

    fn spec(&self) -> QuerySpec {
        QuerySpec::new(self.meta().name())
    }
}
