mod entity;
mod reference;
mod state;

#[cfg(test)]
pub(crate) mod test_entities;

pub use entity::*;
pub use reference::*;
pub use state::*;
