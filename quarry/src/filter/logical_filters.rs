use crate::common::Record;
use crate::errors::QuarryResult;
use crate::filter::{Filter, FilterProvider};
use itertools::Itertools;
use std::any::Any;
use std::fmt::Display;

pub(crate) struct AndFilter {
    filters: Vec<Filter>,
}

impl AndFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        AndFilter { filters }
    }
}

impl Display for AndFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.filters.iter().join(" && "))
    }
}

impl FilterProvider for AndFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        for filter in &self.filters {
            if !filter.apply(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn field_names(&self) -> Vec<String> {
        self.filters.iter().flat_map(|f| f.field_names()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct OrFilter {
    filters: Vec<Filter>,
}

impl OrFilter {
    pub(crate) fn new(filters: Vec<Filter>) -> Self {
        OrFilter { filters }
    }
}

impl Display for OrFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.filters.iter().join(" || "))
    }
}

impl FilterProvider for OrFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        for filter in &self.filters {
            if filter.apply(record)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_names(&self) -> Vec<String> {
        self.filters.iter().flat_map(|f| f.field_names()).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct NotFilter {
    filter: Filter,
}

impl NotFilter {
    pub(crate) fn new(filter: Filter) -> Self {
        NotFilter { filter }
    }
}

impl Display for NotFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!({})", self.filter)
    }
}

impl FilterProvider for NotFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        Ok(!self.filter.apply(record)?)
    }

    fn field_names(&self) -> Vec<String> {
        self.filter.field_names()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
