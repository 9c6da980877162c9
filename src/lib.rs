// ============================================================================
// persist_hooks Library
// ============================================================================

//! Entity lifecycle hooks for a persistence engine.
//!
//! The engine reports lifecycle events (insert, update, delete, load,
//! save-or-update, validation) to an [`EventTriggeringInterceptor`], which
//! finds the listener for the entity's type and calls the hooks the type
//! declares on [`Entity`]. A `before_*` hook can veto the pending write.
//!
//! # Examples
//!
//! ```
//! use persist_hooks::prelude::*;
//! use std::sync::Arc;
//!
//! struct Book {
//!     title: String,
//! }
//!
//! impl Entity for Book {
//!     fn before_insert(&mut self) -> Result<Decision> {
//!         Ok(if self.title.is_empty() { Decision::Veto } else { Decision::Continue })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let factory = Arc::new(SessionFactory::new("primary"));
//! let mappings = EntityMappings::new().with::<Book>();
//! let datastore = Arc::new(Datastore::new(factory.clone(), Arc::new(mappings)));
//! let interceptor = EventTriggeringInterceptor::new(datastore);
//!
//! let persister = Arc::new(EntityPersister::new("Book", factory));
//! let mut book = Book { title: String::new() };
//! let mut event = PersistenceEvent::new(LifecycleEvent::PreInsert(EntityEvent::new(
//!     &mut book,
//!     persister,
//! )));
//!
//! interceptor.on_persistence_event(&mut event)?;
//! assert!(event.is_cancelled());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod entity;
pub mod event;
pub mod interceptor;
pub mod listener;
pub mod mapping;
pub mod prelude;

// Re-export main types for convenience
pub use crate::core::{Decision, EventType, HookError, Result};
pub use entity::{AuditTimestamps, ClassKey, Entity, EntityClass};
pub use event::{
    EntityEntry, EntityEvent, EntityPersister, EventSession, LifecycleEvent, PersistenceEvent,
    SaveOrUpdateEvent, ValidationEvent,
};
pub use interceptor::{
    EventTriggeringInterceptor, InterceptorConfig, InterceptorStats, ListenerRegistry,
    PersistenceEventListener,
};
pub use listener::{
    DefaultTimestampProvider, EntityEventListener, FixedTimestampProvider, TimestampProvider,
};
pub use mapping::{Datastore, EntityMappings, MappingContext, SessionFactory};
