use super::{HookError, Result};
use std::fmt;
use std::str::FromStr;

/// Kind of lifecycle event emitted by the persistence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    PreInsert,
    PostInsert,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
    PreLoad,
    PostLoad,
    SaveOrUpdate,
    Validation,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        EventType::PreInsert,
        EventType::PostInsert,
        EventType::PreUpdate,
        EventType::PostUpdate,
        EventType::PreDelete,
        EventType::PostDelete,
        EventType::PreLoad,
        EventType::PostLoad,
        EventType::SaveOrUpdate,
        EventType::Validation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventType::PreInsert => "PreInsert",
            EventType::PostInsert => "PostInsert",
            EventType::PreUpdate => "PreUpdate",
            EventType::PostUpdate => "PostUpdate",
            EventType::PreDelete => "PreDelete",
            EventType::PostDelete => "PostDelete",
            EventType::PreLoad => "PreLoad",
            EventType::PostLoad => "PostLoad",
            EventType::SaveOrUpdate => "SaveOrUpdate",
            EventType::Validation => "Validation",
        }
    }

    /// Pre-write events whose hooks may veto the database operation.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            EventType::PreInsert | EventType::PreUpdate | EventType::PreDelete
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventType {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self> {
        EventType::ALL
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| HookError::UnknownEventType(s.to_string()))
    }
}

/// Outcome of a `before_*` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Decision {
    #[default]
    Continue,
    /// Cancel the pending insert, update or delete.
    Veto,
}

impl Decision {
    pub fn is_veto(&self) -> bool {
        matches!(self, Decision::Veto)
    }
}
