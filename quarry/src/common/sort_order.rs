use crate::common::Record;
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Specifies the direction for sorting records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    /// Smallest first, nulls first
    Ascending,
    /// Largest first, nulls last
    Descending,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "asc"),
            SortOrder::Descending => write!(f, "desc"),
        }
    }
}

/// A single sort key: a field path and its direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    field: String,
    direction: SortOrder,
}

impl Order {
    pub fn new(field: &str, direction: SortOrder) -> Self {
        Order {
            field: field.to_string(),
            direction,
        }
    }

    pub fn asc(field: &str) -> Self {
        Order::new(field, SortOrder::Ascending)
    }

    pub fn desc(field: &str) -> Self {
        Order::new(field, SortOrder::Descending)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortOrder {
        self.direction
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// An ordered list of sort keys. Earlier keys take precedence.
///
/// ```rust,ignore
/// let sort = Sort::by(SortOrder::Descending, &["age"]).and(Sort::by(SortOrder::Ascending, &["username"]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Sort { orders: Vec::new() }
    }

    pub fn by(direction: SortOrder, fields: &[&str]) -> Self {
        Sort {
            orders: fields.iter().map(|f| Order::new(f, direction)).collect(),
        }
    }

    pub fn from_orders(orders: Vec<Order>) -> Self {
        Sort { orders }
    }

    /// Appends the keys of `other` that are not already present.
    pub fn and(mut self, other: Sort) -> Self {
        for order in other.orders {
            if !self.contains(order.field()) {
                self.orders.push(order);
            }
        }
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.orders.iter().any(|o| o.field == field)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    /// Compares two records key by key; later keys only break ties.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.orders
            .iter()
            .map(|order| {
                let ordering = a.get(&order.field).cmp(&b.get(&order.field));
                match order.direction {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.orders.is_empty() {
            write!(f, "unsorted")
        } else {
            write!(f, "{}", self.orders.iter().join(", "))
        }
    }
}
