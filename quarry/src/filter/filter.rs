use crate::common::Record;
use crate::errors::QuarryResult;
use crate::filter::{AllFilter, AndFilter, NotFilter, OrFilter};
use std::any::Any;
use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::sync::Arc;

/// Trait for implementing predicates over records.
///
/// A `FilterProvider` is inert: it only describes a condition. The store
/// evaluates it through [FilterProvider::apply] while executing a query, and
/// the unit of work uses its rendered form as a cache key.
pub trait FilterProvider: Any + Send + Sync + Display {
    /// Returns whether the record satisfies the condition.
    fn apply(&self, record: &Record) -> QuarryResult<bool>;

    /// Field paths this filter reads. Used to validate queries against an
    /// entity's declared fields.
    fn field_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// A composable, cheaply clonable predicate.
///
/// ```rust,ignore
/// use quarry::filter::field;
///
/// let filter = field("username").eq("member1").and(field("age").gt(15));
/// assert_eq!(filter.to_string(), "((username == \"member1\") && (age > 15))");
/// ```
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter {
            inner: Arc::new(inner),
        }
    }

    /// Combines this filter with another using logical AND.
    ///
    /// Combining with [all] returns the other side unchanged.
    pub fn and(&self, filter: Filter) -> Self {
        if is_all_filter(self) {
            return filter;
        }
        if is_all_filter(&filter) {
            return self.clone();
        }
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    /// Combines this filter with another using logical OR.
    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    /// Negates this filter.
    pub fn not(&self) -> Self {
        Filter::new(NotFilter::new(self.clone()))
    }
}

impl Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter({})", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for Filter {
    fn default() -> Self {
        all()
    }
}

/// Creates a filter that matches every record.
pub fn all() -> Filter {
    Filter::new(AllFilter {})
}

/// Creates a filter that matches when every given filter matches.
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::new(AndFilter::new(filters))
}

/// Creates a filter that matches when any given filter matches.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::new(OrFilter::new(filters))
}

/// Creates a filter that matches when the given filter does not.
pub fn not(filter: Filter) -> Filter {
    Filter::new(NotFilter::new(filter))
}

pub fn is_all_filter(filter: &Filter) -> bool {
    filter.as_any().downcast_ref::<AllFilter>().is_some()
}
