//! Everything needed to declare hooks on an entity and wire an interceptor.
//!
//! `use persist_hooks::prelude::*;` brings in the entity trait, the event
//! payloads an engine constructs, and the interceptor itself.

pub use crate::core::{Decision, EventType, HookError, Result};
pub use crate::entity::{AuditTimestamps, Entity};
pub use crate::event::{
    EntityEntry, EntityEvent, EntityPersister, EventSession, LifecycleEvent, PersistenceEvent,
    SaveOrUpdateEvent, ValidationEvent,
};
pub use crate::interceptor::{EventTriggeringInterceptor, InterceptorConfig};
pub use crate::listener::TimestampProvider;
pub use crate::mapping::{Datastore, EntityMappings, MappingContext, SessionFactory};
