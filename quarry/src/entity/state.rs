use std::fmt::{Display, Formatter};

/// Lifecycle state of an entity relative to one unit of work.
///
/// ```text
/// Transient --save--> Persistent --delete--> Removed
///                         |
///       detach / clear / commit / rollback
///                         v
///                      Detached --save--> Persistent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// No identity yet; unknown to the store.
    Transient,
    /// Tracked by the unit of work's identity map.
    Persistent,
    /// Has an identity but is not tracked by this unit of work.
    Detached,
    /// Scheduled for deletion; terminal within the unit of work.
    Removed,
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::Transient => write!(f, "transient"),
            EntityState::Persistent => write!(f, "persistent"),
            EntityState::Detached => write!(f, "detached"),
            EntityState::Removed => write!(f, "removed"),
        }
    }
}
