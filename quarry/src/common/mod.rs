mod convertible;
mod record;
mod sort_order;
mod value;

pub use convertible::*;
pub use record::*;
pub use sort_order::*;
pub use value::*;
