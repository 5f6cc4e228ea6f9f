//! Page requests, page and slice results, and the engine that windows
//! queries for them.

mod page;
mod page_request;
mod paginator;

pub use page::*;
pub use page_request::*;
pub use paginator::*;
