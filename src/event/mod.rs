//! Lifecycle events delivered by the persistence engine.
//!
//! Events borrow the entity they describe for the duration of dispatch, so
//! hooks can mutate it (for example to stamp audit fields) before the engine
//! writes it.

use crate::core::EventType;
use crate::entity::Entity;
use crate::mapping::SessionFactory;
use std::sync::Arc;

/// Maps one entity type onto the database for a session factory.
#[derive(Debug, Clone)]
pub struct EntityPersister {
    entity_name: String,
    factory: Arc<SessionFactory>,
}

impl EntityPersister {
    pub fn new(entity_name: impl Into<String>, factory: Arc<SessionFactory>) -> Self {
        Self {
            entity_name: entity_name.into(),
            factory,
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Session factory that owns this persister
    pub fn factory(&self) -> &Arc<SessionFactory> {
        &self.factory
    }
}

/// Persistence-context entry of an entity already tracked by a session.
#[derive(Debug, Clone)]
pub struct EntityEntry {
    persister: Arc<EntityPersister>,
    id: Option<String>,
}

impl EntityEntry {
    pub fn new(persister: Arc<EntityPersister>, id: Option<String>) -> Self {
        Self { persister, id }
    }

    pub fn persister(&self) -> &Arc<EntityPersister> {
        &self.persister
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// The session an event originated from.
#[derive(Debug, Clone)]
pub struct EventSession {
    factory: Arc<SessionFactory>,
}

impl EventSession {
    pub fn new(factory: Arc<SessionFactory>) -> Self {
        Self { factory }
    }

    pub fn session_factory(&self) -> &Arc<SessionFactory> {
        &self.factory
    }
}

/// Payload shared by insert, update, delete and load events.
pub struct EntityEvent<'a> {
    entity: Option<&'a mut dyn Entity>,
    persister: Arc<EntityPersister>,
}

impl<'a> EntityEvent<'a> {
    pub fn new(entity: &'a mut dyn Entity, persister: Arc<EntityPersister>) -> Self {
        Self {
            entity: Some(entity),
            persister,
        }
    }

    /// An event whose entity has not been materialized.
    pub fn without_entity(persister: Arc<EntityPersister>) -> Self {
        Self {
            entity: None,
            persister,
        }
    }

    pub fn entity(&self) -> Option<&dyn Entity> {
        self.entity.as_deref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut dyn Entity> {
        match &mut self.entity {
            Some(entity) => Some(&mut **entity),
            None => None,
        }
    }

    pub fn persister(&self) -> &Arc<EntityPersister> {
        &self.persister
    }
}

pub struct SaveOrUpdateEvent<'a> {
    entity: Option<&'a mut dyn Entity>,
    entry: Option<EntityEntry>,
    session: EventSession,
}

impl<'a> SaveOrUpdateEvent<'a> {
    pub fn new(entity: &'a mut dyn Entity, session: EventSession) -> Self {
        Self {
            entity: Some(entity),
            entry: None,
            session,
        }
    }

    /// Attach the persistence-context entry of an already tracked entity.
    pub fn with_entry(mut self, entry: EntityEntry) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn entity(&self) -> Option<&dyn Entity> {
        self.entity.as_deref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut dyn Entity> {
        match &mut self.entity {
            Some(entity) => Some(&mut **entity),
            None => None,
        }
    }

    pub fn entry(&self) -> Option<&EntityEntry> {
        self.entry.as_ref()
    }

    pub fn session(&self) -> &EventSession {
        &self.session
    }
}

pub struct ValidationEvent<'a> {
    entity: Option<&'a mut dyn Entity>,
    validated_fields: Option<Vec<String>>,
}

impl<'a> ValidationEvent<'a> {
    pub fn new(entity: &'a mut dyn Entity) -> Self {
        Self {
            entity: Some(entity),
            validated_fields: None,
        }
    }

    /// Restrict validation to the given fields.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.validated_fields = Some(fields);
        self
    }

    pub fn entity(&self) -> Option<&dyn Entity> {
        self.entity.as_deref()
    }

    pub fn entity_mut(&mut self) -> Option<&mut dyn Entity> {
        match &mut self.entity {
            Some(entity) => Some(&mut **entity),
            None => None,
        }
    }

    pub fn validated_fields(&self) -> Option<&[String]> {
        self.validated_fields.as_deref()
    }
}

pub enum LifecycleEvent<'a> {
    PreInsert(EntityEvent<'a>),
    PostInsert(EntityEvent<'a>),
    PreUpdate(EntityEvent<'a>),
    PostUpdate(EntityEvent<'a>),
    PreDelete(EntityEvent<'a>),
    PostDelete(EntityEvent<'a>),
    PreLoad(EntityEvent<'a>),
    PostLoad(EntityEvent<'a>),
    SaveOrUpdate(SaveOrUpdateEvent<'a>),
    Validation(ValidationEvent<'a>),
}

impl LifecycleEvent<'_> {
    pub fn event_type(&self) -> EventType {
        match self {
            LifecycleEvent::PreInsert(_) => EventType::PreInsert,
            LifecycleEvent::PostInsert(_) => EventType::PostInsert,
            LifecycleEvent::PreUpdate(_) => EventType::PreUpdate,
            LifecycleEvent::PostUpdate(_) => EventType::PostUpdate,
            LifecycleEvent::PreDelete(_) => EventType::PreDelete,
            LifecycleEvent::PostDelete(_) => EventType::PostDelete,
            LifecycleEvent::PreLoad(_) => EventType::PreLoad,
            LifecycleEvent::PostLoad(_) => EventType::PostLoad,
            LifecycleEvent::SaveOrUpdate(_) => EventType::SaveOrUpdate,
            LifecycleEvent::Validation(_) => EventType::Validation,
        }
    }
}

/// A lifecycle event in flight, together with its cancellation state.
///
/// Once cancelled the engine must skip the database write the event
/// announced. Cancelling is idempotent.
pub struct PersistenceEvent<'a> {
    event: LifecycleEvent<'a>,
    cancelled: bool,
}

impl<'a> PersistenceEvent<'a> {
    pub fn new(event: LifecycleEvent<'a>) -> Self {
        Self {
            event,
            cancelled: false,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn native_event(&self) -> &LifecycleEvent<'a> {
        &self.event
    }

    pub fn native_event_mut(&mut self) -> &mut LifecycleEvent<'a> {
        &mut self.event
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<'a> From<LifecycleEvent<'a>> for PersistenceEvent<'a> {
    fn from(event: LifecycleEvent<'a>) -> Self {
        Self::new(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note;
    impl Entity for Note {}

    fn persister() -> Arc<EntityPersister> {
        Arc::new(EntityPersister::new(
            "Note",
            Arc::new(SessionFactory::new("primary")),
        ))
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut note = Note;
        let mut event = PersistenceEvent::new(LifecycleEvent::PreDelete(EntityEvent::new(
            &mut note,
            persister(),
        )));
        assert!(!event.is_cancelled());
        event.cancel();
        event.cancel();
        assert!(event.is_cancelled());
        assert_eq!(event.event_type(), EventType::PreDelete);
    }

    #[test]
    fn test_save_or_update_entry() {
        let mut note = Note;
        let persister = persister();
        let session = EventSession::new(persister.factory().clone());
        let event = SaveOrUpdateEvent::new(&mut note, session)
            .with_entry(EntityEntry::new(persister.clone(), Some("7".into())));
        assert_eq!(event.entry().and_then(|entry| entry.id()), Some("7"));
        assert!(event.entity().is_some());
    }
}
