use crate::common::{Convertible, Value};
use crate::entity::{entity_key, Entity};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};
use crate::session::UnitOfWork;

/// An explicit handle to a related entity.
///
/// A reference never fetches on its own. Reading a lazy relationship means
/// calling [Reference::load] with the unit of work that should perform the
/// fetch; queries with a fetch join, or relations declared eager, arrive
/// already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T: Entity> {
    /// No related entity.
    Null,
    /// Only the identity of the related entity is known.
    Unresolved(Value),
    /// The related entity has been loaded.
    Resolved(Box<T>),
}

impl<T: Entity> Default for Reference<T> {
    fn default() -> Self {
        Reference::Null
    }
}

impl<T: Entity> Reference<T> {
    pub fn to(entity: T) -> Self {
        Reference::Resolved(Box::new(entity))
    }

    pub fn from_key(key: impl Into<Value>) -> Self {
        let key = key.into();
        if key.is_null() {
            Reference::Null
        } else {
            Reference::Unresolved(key)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Reference::Null)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    /// The related entity if it is already loaded.
    pub fn get(&self) -> Option<&T> {
        match self {
            Reference::Resolved(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Reference::Resolved(entity) => Some(entity),
            _ => None,
        }
    }

    /// The identity of the related entity, whether loaded or not.
    pub fn key(&self) -> QuarryResult<Option<Value>> {
        match self {
            Reference::Null => Ok(None),
            Reference::Unresolved(key) => Ok(Some(key.clone())),
            Reference::Resolved(entity) => entity_key(entity.as_ref()),
        }
    }

    /// Loads the related entity through `uow` if it is not loaded yet.
    ///
    /// A key that points at no stored entity is a `NotFound` error.
    pub fn load(&mut self, uow: &UnitOfWork) -> QuarryResult<Option<&T>> {
        if let Reference::Unresolved(key) = self {
            let key = key.clone();
            match uow.find_by_key::<T>(&key)? {
                Some(entity) => *self = Reference::Resolved(Box::new(entity)),
                None => {
                    log::error!("Dangling reference to {} with key {}", T::entity_name(), key);
                    return Err(QuarryError::new(
                        &format!("no {} with id {}", T::entity_name(), key),
                        ErrorKind::NotFound,
                    ));
                }
            }
        }
        Ok(self.get())
    }
}

impl<T: Entity> Convertible for Reference<T> {
    fn to_value(&self) -> QuarryResult<Value> {
        match self {
            Reference::Null => Ok(Value::Null),
            Reference::Unresolved(key) => Ok(key.clone()),
            Reference::Resolved(entity) => match entity_key(entity.as_ref())? {
                Some(key) => Ok(key),
                None => {
                    log::error!("Reference to transient {} cannot be stored", T::entity_name());
                    Err(QuarryError::new(
                        &format!(
                            "reference to a transient {} must be saved first",
                            T::entity_name()
                        ),
                        ErrorKind::ObjectMappingError,
                    ))
                }
            },
        }
    }

    fn from_value(value: &Value) -> QuarryResult<Self> {
        match value {
            Value::Null => Ok(Reference::Null),
            Value::Record(_) => Ok(Reference::Resolved(Box::new(T::from_value(value)?))),
            key => Ok(Reference::Unresolved(key.clone())),
        }
    }
}
