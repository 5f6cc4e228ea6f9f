use crate::common::{Convertible, Value};
use crate::errors::{ErrorKind, QuarryError, QuarryResult};

/// How an entity obtains its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// The store hands out the next value of a per-entity sequence on save.
    Generated,
    /// The caller sets the identity before saving.
    Assigned,
}

/// Whether a relationship is loaded together with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchType {
    /// Loaded in the same round of queries as the owner.
    Eager,
    /// Loaded only on an explicit [crate::entity::Reference::load] or a fetch join.
    Lazy,
}

/// A to-one relationship from an owning field to a target entity.
///
/// The owning record stores the target's identity under `field`.
#[derive(Debug, Clone)]
pub struct Relation {
    field: &'static str,
    target: fn() -> EntityMeta,
    fetch: FetchType,
}

impl Relation {
    pub fn new(field: &'static str, target: fn() -> EntityMeta, fetch: FetchType) -> Self {
        Relation {
            field,
            target,
            fetch,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn target(&self) -> EntityMeta {
        (self.target)()
    }

    pub fn fetch(&self) -> FetchType {
        self.fetch
    }
}

/// Type-erased description of an entity, used wherever the concrete type
/// is not known: query parsing, join resolution and the identity map.
#[derive(Debug, Clone)]
pub struct EntityMeta {
    name: &'static str,
    id_field: &'static str,
    id_strategy: IdStrategy,
    fields: &'static [&'static str],
    relations: Vec<Relation>,
}

impl EntityMeta {
    pub fn new(
        name: &'static str,
        id_field: &'static str,
        id_strategy: IdStrategy,
        fields: &'static [&'static str],
        relations: Vec<Relation>,
    ) -> Self {
        EntityMeta {
            name,
            id_field,
            id_strategy,
            fields,
            relations,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id_field(&self) -> &'static str {
        self.id_field
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn has_field(&self, field: &str) -> bool {
        field == self.id_field || self.fields.contains(&field)
    }

    pub fn relation(&self, field: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.field == field)
    }

    /// Entity names match case-insensitively so `from Member m` finds `member`.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Validates a field path: a declared field, or `relation.field` where
    /// the relation is declared and the target declares the field.
    pub fn validate_path(&self, path: &str) -> QuarryResult<()> {
        if self.has_field(path) {
            return Ok(());
        }

        if let Some((head, rest)) = path.split_once('.') {
            if let Some(relation) = self.relation(head) {
                return relation.target().validate_path(rest);
            }
        }

        log::error!("Unknown field {} on entity {}", path, self.name);
        Err(QuarryError::new(
            &format!("entity {} has no field {}", self.name, path),
            ErrorKind::QueryDerivationError,
        ))
    }
}

/// A persistable type with an identity.
///
/// Implement it with `#[derive(Entity)]` from `quarry_derive`:
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Default, Convertible, Entity)]
/// #[entity(name = "member", id(field = "id"))]
/// pub struct Member {
///     pub id: Option<i64>,
///     pub username: String,
///     pub age: i32,
///     pub team: Reference<Team>,
/// }
/// ```
pub trait Entity: Convertible + Clone + Send + Sync + 'static {
    type Id: Convertible + Clone + Send + Sync + 'static;

    fn entity_name() -> &'static str;

    fn id_field() -> &'static str;

    fn id_strategy() -> IdStrategy {
        IdStrategy::Generated
    }

    /// Every persistent field name, including the identity and foreign keys.
    fn fields() -> &'static [&'static str];

    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    /// The current identity, `None` while transient.
    fn id(&self) -> Option<Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    fn meta() -> EntityMeta {
        EntityMeta::new(
            Self::entity_name(),
            Self::id_field(),
            Self::id_strategy(),
            Self::fields(),
            Self::relations(),
        )
    }
}

/// The identity of an entity as a store key, `None` while transient.
pub fn entity_key<T: Entity>(entity: &T) -> QuarryResult<Option<Value>> {
    match entity.id() {
        Some(id) => {
            let key = id.to_value()?;
            Ok(if key.is_null() { None } else { Some(key) })
        }
        None => Ok(None),
    }
}
