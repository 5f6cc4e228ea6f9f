//! # Quarry - a generic repository layer
//!
//! Quarry maps entity types onto a store through one repository per type.
//! A repository offers CRUD operations, paging, set-based updates and two
//! ways of querying by convention:
//!
//! - **Derived queries**: a method name such as
//!   `find_by_username_and_age_greater_than` is parsed against the entity's
//!   fields into a query.
//! - **Explicit queries**: a small JPQL-like language with named
//!   parameters, joins and projections.
//!
//! All work happens inside an explicit [session::UnitOfWork]. It keeps an
//! identity map of loaded entities, stages writes and flushes them before
//! queries, so reads observe earlier writes of the same unit of work.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry::Quarry;
//! use quarry::paging::PageRequest;
//! use quarry_derive::{Convertible, Entity};
//!
//! #[derive(Debug, Clone, Default, Convertible, Entity)]
//! #[entity(name = "member", id(field = "id"))]
//! pub struct Member {
//!     pub id: Option<i64>,
//!     pub username: String,
//!     pub age: i32,
//! }
//!
//! let quarry = Quarry::builder().open()?;
//! let members = quarry.repository::<Member>();
//!
//! quarry.with_unit_of_work(|uow| {
//!     members.save(uow, Member { id: None, username: "member1".into(), age: 10 })?;
//!     let page = members.find_all_paged(uow, &PageRequest::of(0, 10)?)?;
//!     assert_eq!(page.total_elements(), 1);
//!     Ok(())
//! })?;
//! ```
//!
//! ## Stores
//!
//! The store is a collaborator behind [store::StoreProvider] and
//! [store::StoreSessionProvider]. [store::memory::InMemoryStore] is the
//! bundled implementation and the default.

pub mod common;
pub mod entity;
pub mod errors;
pub mod filter;
pub mod mapper;
pub mod paging;
pub mod quarry;
pub mod quarry_builder;
pub mod quarry_config;
pub mod query;
pub mod repository;
pub mod session;
pub mod store;

pub use crate::quarry::Quarry;
pub use quarry_builder::QuarryBuilder;
pub use quarry_config::QuarryConfig;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
