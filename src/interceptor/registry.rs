use crate::core::{EventType, Result};
use crate::event::PersistenceEvent;
use tracing::{debug, trace};

/// Receives persistence events from the engine's event pipeline.
pub trait PersistenceEventListener: Send + Sync {
    fn name(&self) -> &str;

    /// Whether events of this type should be delivered at all.
    fn supports_event_type(&self, event_type: EventType) -> bool;

    fn on_persistence_event(&self, event: &mut PersistenceEvent<'_>) -> Result<()>;
}

/// Registry of listeners the engine publishes lifecycle events to
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn PersistenceEventListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Box<dyn PersistenceEventListener>) {
        debug!(listener = listener.name(), "registered persistence event listener");
        self.listeners.push(listener);
    }

    /// Deliver `event` to every listener that supports its type, in
    /// registration order. The first error aborts delivery; a cancelled event
    /// is still shown to the remaining listeners.
    pub fn publish(&self, event: &mut PersistenceEvent<'_>) -> Result<()> {
        let event_type = event.event_type();
        for listener in &self.listeners {
            if listener.supports_event_type(event_type) {
                trace!(listener = listener.name(), event_type = %event_type, "delivering event");
                listener.on_persistence_event(event)?;
            }
        }
        Ok(())
    }

    /// Whether any registered listener wants events of this type
    pub fn wants(&self, event_type: EventType) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.supports_event_type(event_type))
    }

    pub fn list_listeners(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HookError;
    use crate::entity::Entity;
    use crate::event::{LifecycleEvent, ValidationEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        only: EventType,
        seen: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PersistenceEventListener for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn supports_event_type(&self, event_type: EventType) -> bool {
            event_type == self.only
        }

        fn on_persistence_event(&self, _event: &mut PersistenceEvent<'_>) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HookError::callback("Memo", "on_persistence_event", "boom"));
            }
            Ok(())
        }
    }

    struct Memo;
    impl Entity for Memo {}

    #[test]
    fn test_publish_filters_by_event_type() {
        let validation = Arc::new(AtomicUsize::new(0));
        let inserts = Arc::new(AtomicUsize::new(0));

        let mut registry = ListenerRegistry::new();
        registry.register(Box::new(Counting {
            name: "validation",
            only: EventType::Validation,
            seen: validation.clone(),
            fail: false,
        }));
        registry.register(Box::new(Counting {
            name: "inserts",
            only: EventType::PreInsert,
            seen: inserts.clone(),
            fail: false,
        }));

        let mut memo = Memo;
        let mut event = PersistenceEvent::new(LifecycleEvent::Validation(ValidationEvent::new(
            &mut memo,
        )));
        registry.publish(&mut event).unwrap();

        assert_eq!(validation.load(Ordering::SeqCst), 1);
        assert_eq!(inserts.load(Ordering::SeqCst), 0);
        assert!(registry.wants(EventType::PreInsert));
        assert!(!registry.wants(EventType::PostLoad));
        assert_eq!(registry.list_listeners(), vec!["validation", "inserts"]);
    }

    #[test]
    fn test_publish_stops_on_first_error() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut registry = ListenerRegistry::default();
        registry.register(Box::new(Counting {
            name: "failing",
            only: EventType::Validation,
            seen: first.clone(),
            fail: true,
        }));
        registry.register(Box::new(Counting {
            name: "after",
            only: EventType::Validation,
            seen: second.clone(),
            fail: false,
        }));

        let mut memo = Memo;
        let mut event = PersistenceEvent::new(LifecycleEvent::Validation(ValidationEvent::new(
            &mut memo,
        )));
        assert!(registry.publish(&mut event).is_err());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }
}
