mod modifying_options;
mod unit_of_work;

pub use modifying_options::*;
pub use unit_of_work::*;
