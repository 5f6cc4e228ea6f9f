mod config;
mod session;
mod store;
mod table;

pub use config::*;
pub use session::*;
pub use store::*;
