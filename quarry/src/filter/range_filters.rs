use crate::common::{Record, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::filter::FilterProvider;
use itertools::Itertools;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

impl ComparisonMode {
    fn symbol(&self) -> &'static str {
        match self {
            ComparisonMode::Greater => ">",
            ComparisonMode::GreaterEqual => ">=",
            ComparisonMode::Lesser => "<",
            ComparisonMode::LesserEqual => "<=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonMode::Greater => ordering == Ordering::Greater,
            ComparisonMode::GreaterEqual => ordering != Ordering::Less,
            ComparisonMode::Lesser => ordering == Ordering::Less,
            ComparisonMode::LesserEqual => ordering != Ordering::Greater,
        }
    }
}

fn compare_field(field_name: &str, actual: &Value, expected: &Value) -> QuarryResult<Option<Ordering>> {
    if actual.is_null() || expected.is_null() {
        return Ok(None);
    }
    match actual.compare(expected) {
        Some(ordering) => Ok(Some(ordering)),
        None => {
            log::error!(
                "Cannot compare field {} of type {} with {}",
                field_name,
                actual.type_name(),
                expected.type_name()
            );
            Err(QuarryError::new(
                &format!(
                    "cannot compare field {} ({}) with {} ({})",
                    field_name,
                    actual.type_name(),
                    expected,
                    expected.type_name()
                ),
                ErrorKind::FilterError,
            ))
        }
    }
}

/// Ordered comparison of a field against a value. Null fields never match.
pub(crate) struct ComparisonFilter {
    field_name: String,
    field_value: Value,
    mode: ComparisonMode,
}

impl ComparisonFilter {
    pub(crate) fn new(field_name: String, field_value: Value, mode: ComparisonMode) -> Self {
        ComparisonFilter {
            field_name,
            field_value,
            mode,
        }
    }
}

impl Display for ComparisonFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.field_name, self.mode.symbol(), self.field_value)
    }
}

impl FilterProvider for ComparisonFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        let actual = record.get(&self.field_name);
        let ordering = compare_field(&self.field_name, &actual, &self.field_value)?;
        Ok(ordering.map(|o| self.mode.accepts(o)).unwrap_or(false))
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Inclusive range check, `lower <= field <= upper`.
pub(crate) struct BetweenFilter {
    field_name: String,
    lower: Value,
    upper: Value,
}

impl BetweenFilter {
    pub(crate) fn new(field_name: String, lower: Value, upper: Value) -> Self {
        BetweenFilter {
            field_name,
            lower,
            upper,
        }
    }
}

impl Display for BetweenFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({} between {} and {})",
            self.field_name, self.lower, self.upper
        )
    }
}

impl FilterProvider for BetweenFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        let actual = record.get(&self.field_name);
        let lower = compare_field(&self.field_name, &actual, &self.lower)?;
        let upper = compare_field(&self.field_name, &actual, &self.upper)?;
        Ok(matches!(
            (lower, upper),
            (Some(l), Some(u)) if l != Ordering::Less && u != Ordering::Greater
        ))
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Membership test against a list of values.
pub(crate) struct InFilter {
    field_name: String,
    field_values: Vec<Value>,
    negated: bool,
}

impl InFilter {
    pub(crate) fn new(field_name: String, field_values: Vec<Value>, negated: bool) -> Self {
        InFilter {
            field_name,
            field_values,
            negated,
        }
    }
}

impl Display for InFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = if self.negated { "not in" } else { "in" };
        write!(
            f,
            "({} {} [{}])",
            self.field_name,
            keyword,
            self.field_values.iter().join(", ")
        )
    }
}

impl FilterProvider for InFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        let actual = record.get(&self.field_name);
        if actual.is_null() {
            return Ok(false);
        }
        let found = self.field_values.iter().any(|v| *v == actual);
        Ok(found != self.negated)
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
