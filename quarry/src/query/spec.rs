use crate::common::{Sort, Value};
use crate::filter::{all, Filter};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// What a query returns per matching row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Whole entity records.
    Entities,
    /// Only the listed field paths, keyed by path.
    Fields(Vec<String>),
    /// The number of matching rows.
    Count,
}

/// A relationship traversed by a query.
///
/// A fetch join embeds the target record into each result so the entity's
/// reference arrives resolved. A plain join keeps only rows whose
/// relationship is present (a left join keeps all rows) and makes target
/// fields available to projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    relation: String,
    alias: Option<String>,
    fetch: bool,
    left: bool,
}

impl Join {
    pub fn fetch(relation: &str) -> Self {
        Join {
            relation: relation.to_string(),
            alias: None,
            fetch: true,
            left: false,
        }
    }

    pub fn inner(relation: &str) -> Self {
        Join {
            relation: relation.to_string(),
            alias: None,
            fetch: false,
            left: false,
        }
    }

    pub fn left(relation: &str) -> Self {
        Join {
            relation: relation.to_string(),
            alias: None,
            fetch: false,
            left: true,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_fetch(mut self, fetch: bool) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_left(mut self, left: bool) -> Self {
        self.left = left;
        self
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_fetch(&self) -> bool {
        self.fetch
    }

    pub fn is_left(&self) -> bool {
        self.left
    }
}

/// A fully described read query. Building one has no side effects; it is
/// executed by a unit of work against its store session.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    entity: String,
    filter: Filter,
    sort: Sort,
    offset: u64,
    limit: Option<u64>,
    distinct: bool,
    selection: Selection,
    joins: Vec<Join>,
}

impl QuerySpec {
    pub fn new(entity: &str) -> Self {
        QuerySpec {
            entity: entity.to_string(),
            filter: all(),
            sort: Sort::unsorted(),
            offset: 0,
            limit: None,
            distinct: false,
            selection: Selection::Entities,
            joins: Vec::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_joins(mut self, joins: Vec<Join>) -> Self {
        self.joins = joins;
        self
    }

    /// The same rows, counted: sort and window are dropped.
    pub fn for_count(&self) -> QuerySpec {
        QuerySpec {
            entity: self.entity.clone(),
            filter: self.filter.clone(),
            sort: Sort::unsorted(),
            offset: 0,
            limit: None,
            distinct: self.distinct,
            selection: Selection::Count,
            joins: self.joins.clone(),
        }
    }

    /// The same rows as whole records with no window, used when projection
    /// or distinct has to happen above the store.
    pub(crate) fn unwindowed_entities(&self) -> QuerySpec {
        QuerySpec {
            offset: 0,
            limit: None,
            selection: Selection::Entities,
            ..self.clone()
        }
    }

    pub fn has_window(&self) -> bool {
        self.offset > 0 || self.limit.is_some()
    }
}

impl Display for QuerySpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "select ")?;
        if self.distinct {
            write!(f, "distinct ")?;
        }
        match &self.selection {
            Selection::Entities => write!(f, "*")?,
            Selection::Fields(paths) => write!(f, "{}", paths.iter().join(", "))?,
            Selection::Count => write!(f, "count(*)")?,
        }
        write!(f, " from {} where {}", self.entity, self.filter)?;
        for join in &self.joins {
            write!(
                f,
                " {}join{} {}",
                if join.left { "left " } else { "" },
                if join.fetch { " fetch" } else { "" },
                join.relation
            )?;
        }
        if !self.sort.is_unsorted() {
            write!(f, " order by {}", self.sort)?;
        }
        if self.offset > 0 {
            write!(f, " offset {}", self.offset)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {}", limit)?;
        }
        Ok(())
    }
}

/// One change applied by a set-based update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldMutation {
    Set { field: String, value: Value },
    /// Adds a (possibly negative) numeric delta to the current value.
    Increment { field: String, delta: Value },
}

impl FieldMutation {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        FieldMutation::Set {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn increment(field: &str, delta: impl Into<Value>) -> Self {
        FieldMutation::Increment {
            field: field.to_string(),
            delta: delta.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            FieldMutation::Set { field, .. } => field,
            FieldMutation::Increment { field, .. } => field,
        }
    }
}

impl Display for FieldMutation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldMutation::Set { field, value } => write!(f, "{} = {}", field, value),
            FieldMutation::Increment { field, delta } => {
                write!(f, "{} = {} + {}", field, field, delta)
            }
        }
    }
}

/// A set-based update over every row matching the filter.
#[derive(Debug, Clone)]
pub struct UpdateSpec {
    entity: String,
    filter: Filter,
    mutations: Vec<FieldMutation>,
}

impl UpdateSpec {
    pub fn new(entity: &str, filter: Filter, mutations: Vec<FieldMutation>) -> Self {
        UpdateSpec {
            entity: entity.to_string(),
            filter,
            mutations,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn mutations(&self) -> &[FieldMutation] {
        &self.mutations
    }
}

impl Display for UpdateSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "update {} set {} where {}",
            self.entity,
            self.mutations.iter().join(", "),
            self.filter
        )
    }
}

/// A set-based delete of every row matching the filter.
#[derive(Debug, Clone)]
pub struct DeleteSpec {
    entity: String,
    filter: Filter,
}

impl DeleteSpec {
    pub fn new(entity: &str, filter: Filter) -> Self {
        DeleteSpec {
            entity: entity.to_string(),
            filter,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

impl Display for DeleteSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "delete from {} where {}", self.entity, self.filter)
    }
}

/// A bound statement ready for execution.
#[derive(Debug, Clone)]
pub enum Statement {
    Query(QuerySpec),
    Update(UpdateSpec),
    Delete(DeleteSpec),
}
