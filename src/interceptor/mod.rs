pub mod config;
pub mod registry;

pub use config::InterceptorConfig;
pub use registry::{ListenerRegistry, PersistenceEventListener};

use crate::core::{EventType, Result};
use crate::entity::{ClassKey, Entity};
use crate::event::{EntityEvent, LifecycleEvent, PersistenceEvent, SaveOrUpdateEvent, ValidationEvent};
use crate::listener::{DefaultTimestampProvider, EntityEventListener, TimestampProvider};
use crate::mapping::{Datastore, SessionFactory};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{Level, event, trace};

/// Routes persistence lifecycle events to the hooks declared by entity types.
///
/// Listeners are resolved lazily, once per entity type, and cached for the
/// lifetime of the interceptor. A type only gets a listener when it is a
/// mapped domain class of the owning datastore and the event comes from that
/// datastore's session factory (multi-tenant types accept any factory). The
/// negative answer is cached too, so unmapped types cost one map lookup per
/// event.
///
/// Resolution is safe to call from any number of threads. First resolution is
/// serialized per entity type only, and at most one listener is ever created
/// for a type.
pub struct EventTriggeringInterceptor {
    datastore: Arc<Datastore>,
    config: InterceptorConfig,
    timestamp_provider: Arc<dyn TimestampProvider>,
    event_listeners: DashMap<ClassKey, Arc<EntityEventListener>>,
    cached_should_trigger: DashMap<ClassKey, bool>,
    init_locks: DashMap<ClassKey, Arc<Mutex<()>>>,
    listeners_created: AtomicU64,
    eligibility_checks: AtomicU64,
    cache_hits: AtomicU64,
}

impl EventTriggeringInterceptor {
    pub fn new(datastore: Arc<Datastore>) -> Self {
        Self {
            datastore,
            config: InterceptorConfig::default(),
            timestamp_provider: Arc::new(DefaultTimestampProvider),
            event_listeners: DashMap::new(),
            cached_should_trigger: DashMap::new(),
            init_locks: DashMap::new(),
            listeners_created: AtomicU64::new(0),
            eligibility_checks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    pub fn with_config(datastore: Arc<Datastore>, config: InterceptorConfig) -> Result<Self> {
        config.validate()?;
        let mut interceptor = Self::new(datastore);
        interceptor.config = config;
        Ok(interceptor)
    }

    pub fn with_timestamp_provider(mut self, provider: Arc<dyn TimestampProvider>) -> Self {
        self.set_timestamp_provider(provider);
        self
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.datastore
    }

    pub fn timestamp_provider(&self) -> &Arc<dyn TimestampProvider> {
        &self.timestamp_provider
    }

    /// Replace the timestamp provider.
    ///
    /// Resolved listeners hold the provider they were built with, so the
    /// cache is dropped and listeners are rebuilt on the next event.
    pub fn set_timestamp_provider(&mut self, provider: Arc<dyn TimestampProvider>) {
        self.timestamp_provider = provider;
        self.clear_cache();
    }

    /// Dispatch one lifecycle event, cancelling it if a pre-hook vetoes.
    pub fn on_persistence_event(&self, event: &mut PersistenceEvent<'_>) -> Result<()> {
        let event_type = event.event_type();
        trace!(event_type = %event_type, "dispatching persistence event");

        let veto = match event.native_event_mut() {
            LifecycleEvent::PreInsert(native) => self.on_pre_insert(native)?,
            LifecycleEvent::PostInsert(native) => {
                self.on_post_insert(native)?;
                false
            }
            LifecycleEvent::PreUpdate(native) => self.on_pre_update(native)?,
            LifecycleEvent::PostUpdate(native) => {
                self.on_post_update(native)?;
                false
            }
            LifecycleEvent::PreDelete(native) => self.on_pre_delete(native)?,
            LifecycleEvent::PostDelete(native) => {
                self.on_post_delete(native)?;
                false
            }
            LifecycleEvent::PreLoad(native) => {
                self.on_pre_load(native)?;
                false
            }
            LifecycleEvent::PostLoad(native) => {
                self.on_post_load(native)?;
                false
            }
            LifecycleEvent::SaveOrUpdate(native) => {
                self.on_save_or_update(native)?;
                false
            }
            LifecycleEvent::Validation(native) => {
                self.on_validate(native)?;
                false
            }
        };

        if veto {
            debug_assert!(event_type.is_cancellable(), "{event_type} cannot be vetoed");
            event!(Level::DEBUG, event_type = %event_type, "persistence event cancelled");
            event.cancel();
        }
        Ok(())
    }

    /// Entities already in the persistence context resolve against their
    /// persister's factory, new ones against the session's.
    pub fn on_save_or_update(&self, event: &mut SaveOrUpdateEvent<'_>) -> Result<()> {
        let factory = match event.entry() {
            Some(entry) => Arc::clone(entry.persister().factory()),
            None => Arc::clone(event.session().session_factory()),
        };

        match self.find_event_listener(event.entity(), Some(factory.as_ref()))? {
            Some(listener) => listener.on_save_or_update(event),
            None => Ok(()),
        }
    }

    pub fn on_pre_load(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_pre_load(event),
            None => Ok(()),
        }
    }

    pub fn on_post_load(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_post_load(event),
            None => Ok(()),
        }
    }

    pub fn on_post_insert(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_post_insert(event),
            None => Ok(()),
        }
    }

    /// Returns `true` when the insert must be cancelled.
    pub fn on_pre_insert(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_pre_insert(event),
            None => Ok(false),
        }
    }

    /// Returns `true` when the update must be cancelled.
    pub fn on_pre_update(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_pre_update(event),
            None => Ok(false),
        }
    }

    pub fn on_post_update(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_post_update(event),
            None => Ok(()),
        }
    }

    /// Returns `true` when the delete must be cancelled.
    pub fn on_pre_delete(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_pre_delete(event),
            None => Ok(false),
        }
    }

    pub fn on_post_delete(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match self.listener_for(event)? {
            Some(listener) => listener.on_post_delete(event),
            None => Ok(()),
        }
    }

    /// Validation is not tied to a session, so no factory check applies.
    pub fn on_validate(&self, event: &mut ValidationEvent<'_>) -> Result<()> {
        match self.find_event_listener(event.entity(), None)? {
            Some(listener) => listener.on_validate(event),
            None => Ok(()),
        }
    }

    /// Resolve the listener for `entity`'s type, creating it on first use.
    ///
    /// `factory` is the session factory the event originated from; `None`
    /// skips the ownership check.
    pub fn find_event_listener(
        &self,
        entity: Option<&dyn Entity>,
        factory: Option<&SessionFactory>,
    ) -> Result<Option<Arc<EntityEventListener>>> {
        let Some(entity) = entity else {
            return Ok(None);
        };
        let class = entity.entity_class();
        let key = class.key();

        if let Some(listener) = self.cached_listener(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(listener));
        }

        if self.cached_should_trigger(&key) == Some(false) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        // The guarded value is `()`, so a panic in an earlier resolution
        // leaves nothing to repair and the type is simply resolved again.
        let lock = self.init_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another thread may have finished resolution while we waited.
        if let Some(listener) = self.cached_listener(&key) {
            return Ok(Some(listener));
        }
        if self.cached_should_trigger(&key) == Some(false) {
            return Ok(None);
        }

        self.eligibility_checks.fetch_add(1, Ordering::Relaxed);
        let owned_factory = class.is_multi_tenant()
            || factory.is_none_or(|factory| factory == self.datastore.session_factory().as_ref());
        let should_trigger =
            owned_factory && self.datastore.mapping_context().is_domain_class(&class);

        let mut listener = None;
        if should_trigger {
            let created = Arc::new(EntityEventListener::new(
                class,
                self.config.fail_on_error,
                &self.config.fail_on_error_packages,
                Arc::clone(&self.timestamp_provider),
            ));
            // An earlier listener wins if one slipped in.
            listener = Some(match self.event_listeners.entry(key) {
                Entry::Occupied(existing) => Arc::clone(existing.get()),
                Entry::Vacant(vacant) => {
                    self.listeners_created.fetch_add(1, Ordering::Relaxed);
                    Arc::clone(vacant.insert(created).value())
                }
            });
        }
        self.cached_should_trigger.insert(key, should_trigger);

        event!(
            Level::DEBUG,
            entity = %class,
            should_trigger,
            multi_tenant = class.is_multi_tenant(),
            "resolved entity event listener"
        );
        Ok(listener)
    }

    /// Forget everything resolved for `T`.
    pub fn evict<T: Entity>(&self) -> bool {
        self.evict_class(&ClassKey::of::<T>())
    }

    /// Returns `true` if anything was cached for the type.
    ///
    /// Waits for an in-flight first resolution of the type to finish. The
    /// type's init lock itself is kept, so threads already queued on it stay
    /// serialized with the ones that arrive after the eviction.
    pub fn evict_class(&self, key: &ClassKey) -> bool {
        let lock = self.init_locks.get(key).map(|entry| Arc::clone(entry.value()));
        let _guard = lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        let had_listener = self.event_listeners.remove(key).is_some();
        let had_flag = self.cached_should_trigger.remove(key).is_some();
        if had_listener || had_flag {
            trace!(entity = key.name(), "evicted entity event listener");
        }
        had_listener || had_flag
    }

    /// Drop every cached listener and eligibility answer.
    ///
    /// Init locks survive; there is one per entity type ever seen.
    pub fn clear_cache(&self) {
        self.event_listeners.clear();
        self.cached_should_trigger.clear();
    }

    pub fn stats(&self) -> InterceptorStats {
        InterceptorStats {
            cached_listeners: self.event_listeners.len(),
            cached_classes: self.cached_should_trigger.len(),
            listeners_created: self.listeners_created.load(Ordering::Relaxed),
            eligibility_checks: self.eligibility_checks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    fn listener_for(&self, event: &EntityEvent<'_>) -> Result<Option<Arc<EntityEventListener>>> {
        let persister = event.persister();
        trace!(
            entity_name = persister.entity_name(),
            session_factory = %persister.factory(),
            "resolving listener for persister"
        );
        self.find_event_listener(event.entity(), Some(persister.factory().as_ref()))
    }

    fn cached_listener(&self, key: &ClassKey) -> Option<Arc<EntityEventListener>> {
        self.event_listeners
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn cached_should_trigger(&self, key: &ClassKey) -> Option<bool> {
        self.cached_should_trigger.get(key).map(|entry| *entry.value())
    }

    fn init_lock(&self, key: ClassKey) -> Arc<Mutex<()>> {
        Arc::clone(self.init_locks.entry(key).or_default().value())
    }
}

impl PersistenceEventListener for EventTriggeringInterceptor {
    fn name(&self) -> &str {
        "event-triggering-interceptor"
    }

    fn supports_event_type(&self, event_type: EventType) -> bool {
        EventType::ALL.contains(&event_type)
    }

    fn on_persistence_event(&self, event: &mut PersistenceEvent<'_>) -> Result<()> {
        EventTriggeringInterceptor::on_persistence_event(self, event)
    }
}

impl fmt::Debug for EventTriggeringInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTriggeringInterceptor")
            .field("session_factory", self.datastore.session_factory())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot of the interceptor's dispatch cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptorStats {
    pub cached_listeners: usize,
    pub cached_classes: usize,
    pub listeners_created: u64,
    pub eligibility_checks: u64,
    pub cache_hits: u64,
}

impl fmt::Display for InterceptorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interceptor Stats: {} listeners for {} classes, {} created, {} eligibility checks, {} cache hits",
            self.cached_listeners,
            self.cached_classes,
            self.listeners_created,
            self.eligibility_checks,
            self.cache_hits
        )
    }
}
