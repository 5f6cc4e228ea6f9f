use crate::common::{Order, Sort, SortOrder};
use crate::entity::{Entity, EntityMeta};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::Filter;
use crate::query::{Join, QuerySpec, Selection};

/// Typed, string-free construction of a [QuerySpec].
///
/// Field names are checked against the entity when the query is built, so a
/// misspelt field fails at [QueryBuilder::build] rather than matching
/// nothing at execution time.
///
/// ```rust,ignore
/// let spec = QueryBuilder::for_entity::<Member>()
///     .filter(field("age").gt(15))
///     .order_by("username", SortOrder::Ascending)
///     .fetch("team")
///     .limit(10)
///     .build()?;
/// ```
pub struct QueryBuilder {
    meta: EntityMeta,
    spec: QuerySpec,
    orders: Vec<Order>,
}

impl QueryBuilder {
    pub fn for_entity<T: Entity>() -> Self {
        QueryBuilder::for_meta(T::meta())
    }

    pub fn for_meta(meta: EntityMeta) -> Self {
        let spec = QuerySpec::new(meta.name());
        QueryBuilder {
            meta,
            spec,
            orders: Vec::new(),
        }
    }

    /// Adds a condition; repeated calls are combined with AND.
    pub fn filter(mut self, filter: Filter) -> Self {
        let combined = self.spec.filter().and(filter);
        self.spec = self.spec.with_filter(combined);
        self
    }

    pub fn order_by(mut self, field: &str, order: SortOrder) -> Self {
        self.orders.push(Order::new(field, order));
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.orders.extend(sort.orders().iter().cloned());
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec = self.spec.with_offset(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec = self.spec.with_limit(Some(limit));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.spec = self.spec.with_distinct(true);
        self
    }

    /// Projects the given field paths instead of whole entities.
    pub fn select(mut self, paths: &[&str]) -> Self {
        let paths = paths.iter().map(|p| p.to_string()).collect();
        self.spec = self.spec.with_selection(Selection::Fields(paths));
        self
    }

    pub fn count(mut self) -> Self {
        self.spec = self.spec.with_selection(Selection::Count);
        self
    }

    /// Loads the relationship together with each result.
    pub fn fetch(mut self, relation: &str) -> Self {
        self.spec = self.spec.with_join(Join::fetch(relation));
        self
    }

    /// Keeps only results whose relationship is present.
    pub fn join(mut self, relation: &str) -> Self {
        self.spec = self.spec.with_join(Join::inner(relation));
        self
    }

    pub fn left_join(mut self, relation: &str) -> Self {
        self.spec = self.spec.with_join(Join::left(relation));
        self
    }

    pub fn build(self) -> QuarryResult<QuerySpec> {
        let meta = &self.meta;

        for join in self.spec.joins() {
            if meta.relation(join.relation()).is_none() {
                log::error!("Unknown relation {} on {}", join.relation(), meta.name());
                return Err(QuarryError::new(
                    &format!("entity {} has no relation {}", meta.name(), join.relation()),
                    ErrorKind::QueryDerivationError,
                ));
            }
        }

        for field in self.spec.filter().field_names() {
            validate_root_field(meta, &field)?;
        }
        for order in &self.orders {
            validate_root_field(meta, order.field())?;
        }
        if let Selection::Fields(paths) = self.spec.selection() {
            for path in paths {
                validate_projection(meta, &self.spec, path)?;
            }
        }

        let sort = Sort::from_orders(self.orders);
        Ok(self.spec.with_sort(sort))
    }
}

/// Filters and sorts apply to the root entity's own fields.
pub(crate) fn validate_root_field(meta: &EntityMeta, field: &str) -> QuarryResult<()> {
    if meta.has_field(field) {
        return Ok(());
    }
    log::error!("Unknown field {} on {}", field, meta.name());
    Err(QuarryError::new(
        &format!("entity {} has no field {}", meta.name(), field),
        ErrorKind::QueryDerivationError,
    ))
}

/// Projections may reach into joined relationships.
pub(crate) fn validate_projection(meta: &EntityMeta, spec: &QuerySpec, path: &str) -> QuarryResult<()> {
    if let Some((head, _)) = path.split_once('.') {
        if !spec.joins().iter().any(|j| j.relation() == head) {
            log::error!("Projection {} needs a join on {}", path, head);
            return Err(QuarryError::new(
                &format!("relation {} must be joined to project {}", head, path),
                ErrorKind::QueryDerivationError,
            ));
        }
    }
    meta.validate_path(path)
}
