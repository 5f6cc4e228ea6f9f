//! Query descriptions and the three ways to produce them.
//!
//! - [QueryBuilder] assembles a [QuerySpec] from typed calls.
//! - [DerivedQuery] reads the query out of a method name such as
//!   `find_by_username_and_age_greater_than`.
//! - [ExplicitQuery] parses a JPQL-like statement with named parameters.
//!
//! All of them end as a [Statement], which a unit of work executes.

mod builder;
mod derived;
pub mod explicit;
mod spec;

pub use builder::*;
pub use derived::*;
pub use explicit::{ExplicitQuery, Parameters};
pub use spec::*;
