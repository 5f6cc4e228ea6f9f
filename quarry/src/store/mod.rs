//! Contracts of the store the repository layer runs on, and an in-memory
//! implementation of them.

pub mod memory;
mod session;
mod store;

pub use session::*;
pub use store::*;
