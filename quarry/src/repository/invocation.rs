use crate::common::{Convertible, Record, Value};
use crate::entity::Entity;
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::mapper::{self, QueryResult, ResultShape};
use crate::paging::{Page, PageRequest, Slice};
use crate::query::{DerivedQuery, ExplicitQuery, Parameters, QuerySpec, Selection, Statement, Subject};
use crate::repository::Repository;
use crate::session::{ModifyingOptions, UnitOfWork};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum QuerySource {
    Derived(Arc<DerivedQuery>),
    Explicit(Arc<ExplicitQuery>),
}

impl QuerySource {
    fn describe(&self) -> &str {
        match self {
            QuerySource::Derived(query) => query.name(),
            QuerySource::Explicit(query) => query.text(),
        }
    }
}

/// One execution of a derived or explicit query.
///
/// Bind the arguments, then pick the result shape:
///
/// ```rust,ignore
/// let member = members
///     .query(&uow, "select m from Member m where m.username = :name")?
///     .param("name", "member1")
///     .unique()?;
///
/// let names: Vec<String> = members
///     .query(&uow, "select m.username from Member m")?
///     .scalars()?;
/// ```
pub struct Invocation<'a, T: Entity> {
    repository: &'a Repository<T>,
    uow: &'a UnitOfWork,
    source: QuerySource,
    args: Vec<Value>,
    params: Parameters,
}

impl<'a, T: Entity> Invocation<'a, T> {
    pub(crate) fn new(repository: &'a Repository<T>, uow: &'a UnitOfWork, source: QuerySource) -> Self {
        Invocation {
            repository,
            uow,
            source,
            args: Vec::new(),
            params: Parameters::new(),
        }
    }

    /// Appends a positional argument of a derived query.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args(mut self, values: Vec<Value>) -> Self {
        self.args.extend(values);
        self
    }

    /// Binds a named parameter of an explicit query.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// The result shape a method with this query would naturally return.
    pub fn natural_shape(&self) -> QuarryResult<ResultShape> {
        let shape = match &self.source {
            QuerySource::Derived(query) => query.result_shape(),
            QuerySource::Explicit(query) if query.is_modifying() => ResultShape::Affected,
            QuerySource::Explicit(_) => match self.query_spec()?.selection() {
                Selection::Count => ResultShape::Count,
                _ => ResultShape::List,
            },
        };
        Ok(shape)
    }

    /// Binds the arguments and returns the executable statement.
    pub fn statement(&self) -> QuarryResult<Statement> {
        match &self.source {
            QuerySource::Derived(query) => {
                if !self.params.is_empty() {
                    return Err(self.binding_error("takes positional arguments, not named parameters"));
                }
                Ok(Statement::Query(query.bind(&self.args)?))
            }
            QuerySource::Explicit(query) => {
                if !self.args.is_empty() {
                    return Err(self.binding_error("takes named parameters, not positional arguments"));
                }
                query.bind(self.repository.meta(), &self.params)
            }
        }
    }

    pub fn list(self) -> QuarryResult<Vec<T>> {
        let spec = self.entity_spec()?;
        self.repository.find_with(self.uow, &spec)
    }

    /// Exactly one result.
    pub fn unique(self) -> QuarryResult<T> {
        let name = self.source.describe().to_string();
        mapper::unique(self.list()?, &name)
    }

    /// Zero or one result.
    pub fn optional(self) -> QuarryResult<Option<T>> {
        let name = self.source.describe().to_string();
        mapper::optional(self.list()?, &name)
    }

    pub fn first(self) -> QuarryResult<Option<T>> {
        let spec = self.entity_spec()?;
        let spec = spec.with_limit(Some(1));
        Ok(mapper::first(self.repository.find_with(self.uow, &spec)?))
    }

    /// Number of matching rows, ignoring order and window.
    pub fn count(self) -> QuarryResult<u64> {
        let spec = self.query_spec()?;
        self.uow.count_records(&spec, self.repository.meta())
    }

    pub fn exists(self) -> QuarryResult<bool> {
        let spec = self.query_spec()?;
        let spec = match spec.selection() {
            Selection::Count => spec.with_selection(Selection::Entities),
            _ => spec,
        };
        let first = spec.with_limit(Some(1));
        Ok(!self.uow.fetch_records(&first, self.repository.meta())?.is_empty())
    }

    pub fn page(self, request: &PageRequest) -> QuarryResult<Page<T>> {
        let spec = self.entity_spec()?;
        self.repository.page(self.uow, &spec, request)
    }

    pub fn slice(self, request: &PageRequest) -> QuarryResult<Slice<T>> {
        let spec = self.entity_spec()?;
        self.repository.slice(self.uow, &spec, request)
    }

    /// Values of a single-column projection, such as
    /// `select m.username from Member m`.
    pub fn scalars<S: Convertible>(self) -> QuarryResult<Vec<S>> {
        let spec = self.query_spec()?;
        let path = match spec.selection() {
            Selection::Fields(paths) if paths.len() == 1 => paths[0].clone(),
            _ => {
                return Err(self.shape_error("must select exactly one field for scalar results"))
            }
        };
        let rows = self.uow.fetch_records(&spec, self.repository.meta())?;
        mapper::scalars(&rows, &path)
    }

    /// Transforms each projected row with `transform`. Rows are read from
    /// the store; no relationship outside the query's joins is loaded.
    pub fn project<P, F>(self, transform: F) -> QuarryResult<Vec<P>>
    where
        F: FnMut(&Record) -> QuarryResult<P>,
    {
        let rows = self.projected_rows()?;
        mapper::project(&rows, transform)
    }

    /// Converts each projected row into a DTO. A path such as `team.name`
    /// fills the DTO field `team_name`.
    pub fn project_into<P: Convertible>(self) -> QuarryResult<Vec<P>> {
        let rows = self.projected_rows()?;
        mapper::project_into(&rows)
    }

    /// Runs a modifying query and returns the number of affected rows.
    ///
    /// Explicit `update` and `delete` statements run set-based and need an
    /// active transaction. A derived `delete_by_...` loads the matching
    /// entities and removes them through the unit of work.
    pub fn execute_update(self, options: ModifyingOptions) -> QuarryResult<u64> {
        if let QuerySource::Derived(query) = &self.source {
            if query.subject() == Subject::Delete {
                let spec = self.entity_spec()?;
                let doomed = self.repository.find_with(self.uow, &spec)?;
                for entity in &doomed {
                    self.uow.remove(entity)?;
                }
                return Ok(doomed.len() as u64);
            }
        }

        match self.statement()? {
            Statement::Update(update) => {
                for mutation in update.mutations() {
                    if mutation.field() == self.repository.meta().id_field() {
                        return Err(self.shape_error("cannot update the identity field"));
                    }
                }
                self.uow.execute_update(&update, options)
            }
            Statement::Delete(delete) => self.uow.execute_delete(&delete, options),
            Statement::Query(_) => Err(self.shape_error("is not a modifying query")),
        }
    }

    /// Executes the query in its natural result shape.
    pub fn fetch(self) -> QuarryResult<QueryResult<T>> {
        let shape = self.natural_shape()?;
        self.fetch_as(shape)
    }

    /// Executes the query in the requested result shape. Pages and slices
    /// need a request; use [Invocation::page] and [Invocation::slice].
    pub fn fetch_as(self, shape: ResultShape) -> QuarryResult<QueryResult<T>> {
        let result = match shape {
            ResultShape::Single => QueryResult::Single(self.unique()?),
            ResultShape::Optional => QueryResult::Optional(self.optional()?),
            ResultShape::List => QueryResult::List(self.list()?),
            ResultShape::Count => QueryResult::Count(self.count()?),
            ResultShape::Exists => QueryResult::Exists(self.exists()?),
            ResultShape::Affected => {
                QueryResult::Affected(self.execute_update(ModifyingOptions::default())?)
            }
            ResultShape::Page | ResultShape::Slice => {
                return Err(self.shape_error("needs a page request for paged results"))
            }
        };
        Ok(result)
    }

    fn query_spec(&self) -> QuarryResult<QuerySpec> {
        match self.statement()? {
            Statement::Query(spec) => Ok(spec),
            _ => Err(self.shape_error("is a modifying query; use execute_update")),
        }
    }

    fn entity_spec(&self) -> QuarryResult<QuerySpec> {
        let spec = self.query_spec()?;
        if *spec.selection() != Selection::Entities {
            return Err(self.shape_error("does not select whole entities; use count, scalars or project"));
        }
        Ok(spec)
    }

    fn projected_rows(&self) -> QuarryResult<Vec<Record>> {
        let spec = self.query_spec()?;
        if *spec.selection() == Selection::Count {
            return Err(self.shape_error("is a count query; use count"));
        }
        self.uow.fetch_records(&spec, self.repository.meta())
    }

    fn binding_error(&self, reason: &str) -> QuarryError {
        log::error!("Query {} {}", self.source.describe(), reason);
        QuarryError::new(
            &format!("query {} {}", self.source.describe(), reason),
            ErrorKind::ParameterBindingError,
        )
    }

    fn shape_error(&self, reason: &str) -> QuarryError {
        log::error!("Query {} {}", self.source.describe(), reason);
        QuarryError::new(
            &format!("query {} {}", self.source.describe(), reason),
            ErrorKind::InvalidOperation,
        )
    }
}
