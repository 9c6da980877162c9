pub mod timestamp;

pub use timestamp::{DefaultTimestampProvider, FixedTimestampProvider, TimestampProvider};

use crate::core::{HookError, Result};
use crate::entity::{Entity, EntityClass};
use crate::event::{EntityEvent, SaveOrUpdateEvent, ValidationEvent};
use std::fmt;
use std::sync::Arc;
use tracing::{Level, event};

/// Invokes the lifecycle hooks of one entity type.
///
/// One listener is created per mapped type and shared by every thread that
/// dispatches events for it. Besides calling the hooks, the listener stamps
/// [`AuditTimestamps`](crate::entity::AuditTimestamps) and checks validation
/// errors before inserts and updates.
pub struct EntityEventListener {
    class: EntityClass,
    fail_on_error: bool,
    timestamp_provider: Arc<dyn TimestampProvider>,
}

impl EntityEventListener {
    /// `fail_on_error_packages` turns validation failures into errors for types
    /// below one of the listed module paths, even when `fail_on_error` is off.
    pub fn new(
        class: EntityClass,
        fail_on_error: bool,
        fail_on_error_packages: &[String],
        timestamp_provider: Arc<dyn TimestampProvider>,
    ) -> Self {
        let fail_on_error = fail_on_error
            || fail_on_error_packages
                .iter()
                .any(|package| class.is_below_package(package));

        Self {
            class,
            fail_on_error,
            timestamp_provider,
        }
    }

    pub fn entity_class(&self) -> &EntityClass {
        &self.class
    }

    pub fn fail_on_error(&self) -> bool {
        self.fail_on_error
    }

    /// Returns `true` when the insert must be cancelled.
    pub fn on_pre_insert(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        let Some(entity) = event.entity_mut() else {
            return Ok(false);
        };

        if entity.before_insert()?.is_veto() {
            event!(Level::DEBUG, entity = %self.class, "insert vetoed by before_insert");
            return Ok(true);
        }

        if let Some(timestamps) = entity.timestamps_mut() {
            let now = self.timestamp_provider.now();
            if timestamps.date_created.is_none() {
                timestamps.date_created = Some(now);
            }
            timestamps.last_updated = Some(now);
        }

        self.reject_invalid(entity)
    }

    pub fn on_post_insert(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match event.entity_mut() {
            Some(entity) => entity.after_insert(),
            None => Ok(()),
        }
    }

    /// Returns `true` when the update must be cancelled.
    pub fn on_pre_update(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        let Some(entity) = event.entity_mut() else {
            return Ok(false);
        };

        if entity.before_update()?.is_veto() {
            event!(Level::DEBUG, entity = %self.class, "update vetoed by before_update");
            return Ok(true);
        }

        if let Some(timestamps) = entity.timestamps_mut() {
            timestamps.last_updated = Some(self.timestamp_provider.now());
        }

        self.reject_invalid(entity)
    }

    pub fn on_post_update(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match event.entity_mut() {
            Some(entity) => entity.after_update(),
            None => Ok(()),
        }
    }

    /// Returns `true` when the delete must be cancelled.
    pub fn on_pre_delete(&self, event: &mut EntityEvent<'_>) -> Result<bool> {
        let Some(entity) = event.entity_mut() else {
            return Ok(false);
        };

        let vetoed = entity.before_delete()?.is_veto();
        if vetoed {
            event!(Level::DEBUG, entity = %self.class, "delete vetoed by before_delete");
        }
        Ok(vetoed)
    }

    pub fn on_post_delete(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match event.entity_mut() {
            Some(entity) => entity.after_delete(),
            None => Ok(()),
        }
    }

    pub fn on_pre_load(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match event.entity_mut() {
            Some(entity) => entity.before_load(),
            None => Ok(()),
        }
    }

    pub fn on_post_load(&self, event: &mut EntityEvent<'_>) -> Result<()> {
        match event.entity_mut() {
            Some(entity) => entity.after_load(),
            None => Ok(()),
        }
    }

    /// Entities new to the session get their creation stamps here, before the
    /// engine schedules the insert.
    pub fn on_save_or_update(&self, event: &mut SaveOrUpdateEvent<'_>) -> Result<()> {
        let is_new = event.entry().is_none();
        let Some(entity) = event.entity_mut() else {
            return Ok(());
        };

        if is_new {
            if let Some(timestamps) = entity.timestamps_mut() {
                let now = self.timestamp_provider.now();
                timestamps.date_created.get_or_insert(now);
                timestamps.last_updated.get_or_insert(now);
            }
        }
        Ok(())
    }

    pub fn on_validate(&self, event: &mut ValidationEvent<'_>) -> Result<()> {
        let fields = event.validated_fields().map(<[String]>::to_vec);
        match event.entity_mut() {
            Some(entity) => entity.before_validate(fields.as_deref()),
            None => Ok(()),
        }
    }

    fn reject_invalid(&self, entity: &dyn Entity) -> Result<bool> {
        if !entity.auto_validate() {
            return Ok(false);
        }

        let errors = entity.validation_errors();
        if errors.is_empty() {
            return Ok(false);
        }

        if self.fail_on_error {
            return Err(HookError::Validation {
                entity: self.class.name().to_string(),
                errors,
            });
        }

        event!(
            Level::DEBUG,
            entity = %self.class,
            errors = errors.len(),
            "invalid entity evicted from flush"
        );
        Ok(true)
    }
}

impl fmt::Debug for EntityEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityEventListener")
            .field("class", &self.class.name())
            .field("fail_on_error", &self.fail_on_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Decision;
    use crate::entity::AuditTimestamps;
    use crate::event::{EntityEntry, EntityPersister, EventSession};
    use crate::mapping::SessionFactory;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct Article {
        title: String,
        locked: bool,
        timestamps: AuditTimestamps,
        loaded: bool,
        validated_fields: Option<Vec<String>>,
    }

    impl Entity for Article {
        fn timestamps_mut(&mut self) -> Option<&mut AuditTimestamps> {
            Some(&mut self.timestamps)
        }

        fn validation_errors(&self) -> Vec<String> {
            if self.title.is_empty() {
                vec!["title: must not be blank".to_string()]
            } else {
                Vec::new()
            }
        }

        fn before_update(&mut self) -> Result<Decision> {
            Ok(if self.locked {
                Decision::Veto
            } else {
                Decision::Continue
            })
        }

        fn before_delete(&mut self) -> Result<Decision> {
            Err(HookError::callback("Article", "before_delete", "archive first"))
        }

        fn after_load(&mut self) -> Result<()> {
            self.loaded = true;
            Ok(())
        }

        fn before_validate(&mut self, fields: Option<&[String]>) -> Result<()> {
            self.validated_fields = fields.map(<[String]>::to_vec);
            Ok(())
        }
    }

    fn listener(fail_on_error: bool, packages: &[String]) -> EntityEventListener {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        EntityEventListener::new(
            EntityClass::of::<Article>(),
            fail_on_error,
            packages,
            Arc::new(FixedTimestampProvider(at)),
        )
    }

    fn persister() -> Arc<EntityPersister> {
        Arc::new(EntityPersister::new(
            "Article",
            Arc::new(SessionFactory::new("primary")),
        ))
    }

    #[test]
    fn test_pre_insert_stamps_both_fields() {
        let listener = listener(false, &[]);
        let mut article = Article {
            title: "Hello".into(),
            ..Default::default()
        };
        let evict = listener
            .on_pre_insert(&mut EntityEvent::new(&mut article, persister()))
            .unwrap();
        assert!(!evict);
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(article.timestamps.date_created, Some(expected));
        assert_eq!(article.timestamps.last_updated, Some(expected));
    }

    #[test]
    fn test_pre_update_veto_skips_stamping() {
        let listener = listener(false, &[]);
        let mut article = Article {
            title: "Hello".into(),
            locked: true,
            ..Default::default()
        };
        let evict = listener
            .on_pre_update(&mut EntityEvent::new(&mut article, persister()))
            .unwrap();
        assert!(evict);
        assert_eq!(article.timestamps.last_updated, None);
    }

    #[test]
    fn test_invalid_entity_is_evicted_without_fail_on_error() {
        let listener = listener(false, &[]);
        let mut article = Article::default();
        let evict = listener
            .on_pre_insert(&mut EntityEvent::new(&mut article, persister()))
            .unwrap();
        assert!(evict);
    }

    #[test]
    fn test_invalid_entity_fails_with_fail_on_error() {
        let listener = listener(true, &[]);
        let mut article = Article::default();
        let err = listener
            .on_pre_insert(&mut EntityEvent::new(&mut article, persister()))
            .unwrap_err();
        assert!(matches!(err, HookError::Validation { errors, .. } if errors.len() == 1));
    }

    #[test]
    fn test_fail_on_error_packages() {
        let name = EntityClass::of::<Article>().name();
        let package = name.trim_end_matches("::Article").to_string();
        assert!(listener(false, &[package]).fail_on_error());
        assert!(!listener(false, &["other::domain".to_string()]).fail_on_error());
    }

    #[test]
    fn test_hook_errors_propagate() {
        let listener = listener(false, &[]);
        let mut article = Article::default();
        let err = listener
            .on_pre_delete(&mut EntityEvent::new(&mut article, persister()))
            .unwrap_err();
        assert!(matches!(err, HookError::Callback { hook: "before_delete", .. }));
    }

    #[test]
    fn test_save_or_update_stamps_only_new_entities() {
        let listener = listener(false, &[]);
        let persister = persister();
        let session = EventSession::new(persister.factory().clone());

        let mut fresh = Article::default();
        listener
            .on_save_or_update(&mut SaveOrUpdateEvent::new(&mut fresh, session.clone()))
            .unwrap();
        assert!(fresh.timestamps.date_created.is_some());

        let mut tracked = Article::default();
        let mut event = SaveOrUpdateEvent::new(&mut tracked, session)
            .with_entry(EntityEntry::new(persister, Some("1".into())));
        listener.on_save_or_update(&mut event).unwrap();
        assert!(tracked.timestamps.date_created.is_none());
    }

    #[test]
    fn test_load_and_validate_hooks() {
        let listener = listener(false, &[]);
        let mut article = Article::default();
        listener
            .on_post_load(&mut EntityEvent::new(&mut article, persister()))
            .unwrap();
        assert!(article.loaded);

        let mut event = ValidationEvent::new(&mut article).with_fields(vec!["title".into()]);
        listener.on_validate(&mut event).unwrap();
        assert_eq!(article.validated_fields, Some(vec!["title".to_string()]));
    }

    #[test]
    fn test_missing_entity_is_a_no_op() {
        let listener = listener(true, &[]);
        let mut event = EntityEvent::without_entity(persister());
        assert!(!listener.on_pre_insert(&mut event).unwrap());
        listener.on_post_insert(&mut event).unwrap();
    }
}
