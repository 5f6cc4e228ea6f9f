//! Shapes raw query rows into what the caller asked for.

use crate::common::{Convertible, Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::paging::{Page, Slice};

/// The return shape requested from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Exactly one row.
    Single,
    /// Zero or one row.
    Optional,
    List,
    Count,
    Exists,
    Page,
    Slice,
    /// Rows affected by a modifying statement.
    Affected,
}

/// A query result in one of the [ResultShape]s.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Single(T),
    Optional(Option<T>),
    List(Vec<T>),
    Count(u64),
    Exists(bool),
    Page(Page<T>),
    Slice(Slice<T>),
    Affected(u64),
}

impl<T> QueryResult<T> {
    pub fn shape(&self) -> ResultShape {
        match self {
            QueryResult::Single(_) => ResultShape::Single,
            QueryResult::Optional(_) => ResultShape::Optional,
            QueryResult::List(_) => ResultShape::List,
            QueryResult::Count(_) => ResultShape::Count,
            QueryResult::Exists(_) => ResultShape::Exists,
            QueryResult::Page(_) => ResultShape::Page,
            QueryResult::Slice(_) => ResultShape::Slice,
            QueryResult::Affected(_) => ResultShape::Affected,
        }
    }

    /// Every entity carried by the result, in order.
    pub fn into_list(self) -> Vec<T> {
        match self {
            QueryResult::Single(value) => vec![value],
            QueryResult::Optional(value) => value.into_iter().collect(),
            QueryResult::List(values) => values,
            QueryResult::Page(page) => page.into_content(),
            QueryResult::Slice(slice) => slice.into_content(),
            QueryResult::Count(_) | QueryResult::Exists(_) | QueryResult::Affected(_) => Vec::new(),
        }
    }

    /// The numeric outcome of count and modifying queries.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            QueryResult::Count(count) | QueryResult::Affected(count) => Some(*count),
            _ => None,
        }
    }
}

/// Exactly one row: none is [ErrorKind::NotFound], more is
/// [ErrorKind::AmbiguousResult].
pub fn unique<T>(rows: Vec<T>, query: &str) -> QuarryResult<T> {
    let found = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), found) {
        (Some(row), 1) => Ok(row),
        (None, _) => {
            log::error!("No result for {}", query);
            Err(QuarryError::new(
                &format!("no result found for {}", query),
                ErrorKind::NotFound,
            ))
        }
        (Some(_), _) => Err(ambiguous(query, found)),
    }
}

/// Zero or one row: more is [ErrorKind::AmbiguousResult].
pub fn optional<T>(rows: Vec<T>, query: &str) -> QuarryResult<Option<T>> {
    if rows.len() > 1 {
        return Err(ambiguous(query, rows.len()));
    }
    Ok(rows.into_iter().next())
}

pub fn first<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}

fn ambiguous(query: &str, found: usize) -> QuarryError {
    log::error!("Expected a unique result for {} but found {}", query, found);
    QuarryError::new(
        &format!("query {} returned {} results where one was expected", query, found),
        ErrorKind::AmbiguousResult,
    )
}

/// Converts entity records.
pub fn entities<T: Convertible>(records: Vec<Record>) -> QuarryResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| T::from_value(&Value::Record(record)))
        .collect()
}

/// Reads one field path of every row as a typed value.
pub fn scalars<S: Convertible>(rows: &[Record], path: &str) -> QuarryResult<Vec<S>> {
    rows.iter().map(|row| S::from_value(&row.get(path))).collect()
}

/// Applies a caller-supplied transform to every row.
pub fn project<P, F>(rows: &[Record], mut transform: F) -> QuarryResult<Vec<P>>
where
    F: FnMut(&Record) -> QuarryResult<P>,
{
    rows.iter().map(|row| transform(row)).collect()
}

/// Converts each row into a DTO. A projected path such as `team.name`
/// becomes the DTO field `team_name`.
pub fn project_into<P: Convertible>(rows: &[Record]) -> QuarryResult<Vec<P>> {
    project(rows, |row| {
        let flattened: Record = row
            .iter()
            .map(|(key, value)| (key.replace('.', "_"), value.clone()))
            .collect();
        P::from_value(&Value::Record(flattened))
    })
}
