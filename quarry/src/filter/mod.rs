//! Predicates for selecting records.
//!
//! Filters are built with the fluent API and combined with logical
//! operators. They are inert values: nothing is evaluated until a store
//! executes the query that carries them.
//!
//! ```rust,ignore
//! use quarry::filter::{field, all};
//!
//! let filter = field("username").eq("member1").and(field("age").gt(15));
//! let everything = all();
//! ```
//!
//! # Supported Operators
//!
//! - **Equality**: `eq`, `ne`
//! - **Comparison**: `gt`, `gte`, `lt`, `lte`, `between`
//! - **Membership**: `in_list`, `not_in`
//! - **Nullness**: `is_null`, `is_not_null`
//! - **Logical**: `and`, `or`, `not`
//! - **Special**: `all`

mod basic_filters;
mod filter;
mod fluent;
mod logical_filters;
mod range_filters;

pub(crate) use basic_filters::*;
pub use filter::*;
pub use fluent::*;
pub(crate) use logical_filters::*;
pub(crate) use range_filters::*;
