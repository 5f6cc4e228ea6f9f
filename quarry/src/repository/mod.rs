//! Repository façades over entity types.
//!
//! A [Repository] combines CRUD operations, paging and query execution for
//! one entity type. Repositories are cheap handles obtained from
//! [crate::Quarry::repository]; every call takes the
//! [crate::session::UnitOfWork] it runs in.
//!
//! Queries come in three forms:
//! - a [crate::query::QuerySpec], usually built with [Repository::query_builder]
//! - a method name such as `find_by_username_and_age_greater_than`, through
//!   [Repository::derived]
//! - an explicit query string with named parameters, through [Repository::query]
//!
//! Derived and explicit queries are parsed once per entity type and cached.

mod invocation;
mod query_cache;
mod repository;
mod repository_factory;

pub use invocation::Invocation;
pub(crate) use invocation::QuerySource;
pub use repository::*;
pub(crate) use repository_factory::*;
