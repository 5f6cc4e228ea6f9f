use crate::common::{Record, Value};
use crate::errors::QuarryResult;
use crate::filter::FilterProvider;
use std::any::Any;
use std::fmt::Display;

/// Matches every record.
pub(crate) struct AllFilter {}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "all")
    }
}

impl FilterProvider for AllFilter {
    fn apply(&self, _record: &Record) -> QuarryResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches records whose field equals the value.
///
/// Comparing against `Value::Null` matches absent or null fields, which is
/// how a derived `find_by_team(None)` behaves.
pub(crate) struct EqualsFilter {
    field_name: String,
    field_value: Value,
}

impl EqualsFilter {
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        EqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for EqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for EqualsFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        Ok(record.get(&self.field_name) == self.field_value)
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches records whose field differs from the value. Null fields never
/// match a non-null value, following SQL three-valued logic.
pub(crate) struct NotEqualsFilter {
    field_name: String,
    field_value: Value,
}

impl NotEqualsFilter {
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        NotEqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for NotEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for NotEqualsFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        let value = record.get(&self.field_name);
        if self.field_value.is_null() {
            return Ok(!value.is_null());
        }
        Ok(!value.is_null() && value != self.field_value)
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `is null` / `is not null`.
pub(crate) struct NullFilter {
    field_name: String,
    negated: bool,
}

impl NullFilter {
    pub(crate) fn new(field_name: String, negated: bool) -> Self {
        NullFilter {
            field_name,
            negated,
        }
    }
}

impl Display for NullFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "({} is not null)", self.field_name)
        } else {
            write!(f, "({} is null)", self.field_name)
        }
    }
}

impl FilterProvider for NullFilter {
    fn apply(&self, record: &Record) -> QuarryResult<bool> {
        let is_null = record.get(&self.field_name).is_null();
        Ok(is_null != self.negated)
    }

    fn field_names(&self) -> Vec<String> {
        vec![self.field_name.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
