use crate::core::{Decision, Result};
use chrono::{DateTime, Utc};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A domain object whose persistence lifecycle can be observed.
///
/// Every hook has a no-op default, so a type only overrides the callbacks it
/// cares about. `before_insert`, `before_update` and `before_delete` may return
/// [`Decision::Veto`] to cancel the pending database write.
pub trait Entity: Any + Send + Sync {
    /// Runtime type descriptor of this entity.
    fn entity_class(&self) -> EntityClass {
        EntityClass {
            type_id: TypeId::of::<Self>(),
            name: type_name::<Self>(),
            multi_tenant: self.is_multi_tenant(),
        }
    }

    /// Whether instances of this type may belong to any tenant's session factory.
    ///
    /// This is a type-level property: every instance must answer the same.
    fn is_multi_tenant(&self) -> bool {
        false
    }

    /// Audit fields stamped by the timestamp provider, if the type has them.
    fn timestamps_mut(&mut self) -> Option<&mut AuditTimestamps> {
        None
    }

    /// Whether pre-insert and pre-update should check `validation_errors`.
    fn auto_validate(&self) -> bool {
        true
    }

    fn validation_errors(&self) -> Vec<String> {
        Vec::new()
    }

    fn before_insert(&mut self) -> Result<Decision> {
        Ok(Decision::Continue)
    }

    fn after_insert(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_update(&mut self) -> Result<Decision> {
        Ok(Decision::Continue)
    }

    fn after_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_delete(&mut self) -> Result<Decision> {
        Ok(Decision::Continue)
    }

    fn after_delete(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_load(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before validation; `fields` restricts validation to a subset.
    fn before_validate(&mut self, _fields: Option<&[String]>) -> Result<()> {
        Ok(())
    }
}

/// Creation and modification timestamps maintained by the listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTimestamps {
    pub date_created: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Descriptor of an entity's runtime type.
#[derive(Debug, Clone, Copy)]
pub struct EntityClass {
    type_id: TypeId,
    name: &'static str,
    multi_tenant: bool,
}

impl EntityClass {
    /// Descriptor for `T`, treated as single-tenant.
    pub fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            multi_tenant: false,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, e.g. `bookstore::domain::Book`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn simple_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub fn is_multi_tenant(&self) -> bool {
        self.multi_tenant
    }

    /// Whether the type lives in `package` or one of its submodules.
    pub fn is_below_package(&self, package: &str) -> bool {
        let package = package.trim_end_matches("::");
        !package.is_empty()
            && self
                .name
                .strip_prefix(package)
                .is_some_and(|rest| rest.starts_with("::"))
    }

    pub fn key(&self) -> ClassKey {
        ClassKey {
            type_id: self.type_id,
            name: self.name,
        }
    }
}

impl PartialEq for EntityClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityClass {}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Cache key for an entity type.
///
/// Equality and hashing use the `TypeId` alone. Rust types are never unloaded,
/// so a key stays valid for the life of the process; stale entries are only
/// removed through explicit eviction on the interceptor.
#[derive(Debug, Clone, Copy)]
pub struct ClassKey {
    type_id: TypeId,
    name: &'static str,
}

impl ClassKey {
    pub fn of<T: Entity>() -> Self {
        EntityClass::of::<T>().key()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ClassKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassKey {}

impl Hash for ClassKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}
