use crate::entity::{Entity, EntityClass};
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Handle for a session factory (one persistence unit).
///
/// Two handles are equal only if they refer to the same factory instance.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    id: Uuid,
    name: String,
}

impl SessionFactory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for SessionFactory {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SessionFactory {}

impl fmt::Display for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Knows which types are persistence-enabled domain classes.
pub trait MappingContext: Send + Sync {
    fn is_domain_class(&self, class: &EntityClass) -> bool;
}

/// Registry of mapped entity types
#[derive(Debug, Default, Clone)]
pub struct EntityMappings {
    types: HashSet<TypeId>,
}

impl EntityMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as a mapped domain class
    pub fn register<T: Entity>(&mut self) -> &mut Self {
        self.types.insert(TypeId::of::<T>());
        self
    }

    pub fn with<T: Entity>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl MappingContext for EntityMappings {
    fn is_domain_class(&self, class: &EntityClass) -> bool {
        self.types.contains(&class.type_id())
    }
}

/// The persistence unit an interceptor belongs to.
pub struct Datastore {
    session_factory: Arc<SessionFactory>,
    mapping: Arc<dyn MappingContext>,
}

impl Datastore {
    pub fn new(session_factory: Arc<SessionFactory>, mapping: Arc<dyn MappingContext>) -> Self {
        Self {
            session_factory,
            mapping,
        }
    }

    pub fn session_factory(&self) -> &Arc<SessionFactory> {
        &self.session_factory
    }

    pub fn mapping_context(&self) -> &dyn MappingContext {
        self.mapping.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Author;
    impl Entity for Author {}

    struct Draft;
    impl Entity for Draft {}

    #[test]
    fn test_session_factory_identity() {
        let a = SessionFactory::new("primary");
        let b = SessionFactory::new("primary");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_mappings() {
        let mappings = EntityMappings::new().with::<Author>();
        assert!(mappings.is_domain_class(&EntityClass::of::<Author>()));
        assert!(!mappings.is_domain_class(&EntityClass::of::<Draft>()));
        assert_eq!(mappings.len(), 1);
    }
}
