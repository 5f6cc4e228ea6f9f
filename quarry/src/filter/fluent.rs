use crate::common::Value;
use crate::filter::{
    BetweenFilter, ComparisonFilter, ComparisonMode, EqualsFilter, Filter, InFilter,
    NotEqualsFilter, NullFilter,
};

/// Starts a fluent filter on the given field path.
///
/// ```rust,ignore
/// let filter = field("age").gt(15);
/// ```
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

/// Builds single-field filters. Each method consumes the builder and
/// returns a finished [Filter].
pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(EqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(NotEqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn gt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::Greater,
        ))
    }

    #[inline]
    pub fn gte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::GreaterEqual,
        ))
    }

    #[inline]
    pub fn lt<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::Lesser,
        ))
    }

    #[inline]
    pub fn lte<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(ComparisonFilter::new(
            self.field_name,
            value.into(),
            ComparisonMode::LesserEqual,
        ))
    }

    /// Inclusive on both ends.
    pub fn between<T: Into<Value>>(self, lower: T, upper: T) -> Filter {
        Filter::new(BetweenFilter::new(
            self.field_name,
            lower.into(),
            upper.into(),
        ))
    }

    pub fn in_list<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::new(InFilter::new(
            self.field_name,
            values.into_iter().map(Into::into).collect(),
            false,
        ))
    }

    pub fn not_in<T: Into<Value>>(self, values: Vec<T>) -> Filter {
        Filter::new(InFilter::new(
            self.field_name,
            values.into_iter().map(Into::into).collect(),
            true,
        ))
    }

    pub fn is_null(self) -> Filter {
        Filter::new(NullFilter::new(self.field_name, false))
    }

    pub fn is_not_null(self) -> Filter {
        Filter::new(NullFilter::new(self.field_name, true))
    }
}
