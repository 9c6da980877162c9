use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Unexpected event type: {0}")]
    UnknownEventType(String),

    #[error("Callback '{hook}' failed for entity '{entity}': {message}")]
    Callback {
        entity: String,
        hook: &'static str,
        message: String,
    },

    #[error("Validation error whilst flushing entity [{entity}]: {}", .errors.join(", "))]
    Validation { entity: String, errors: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl HookError {
    /// Shorthand for hook implementations reporting a failure.
    pub fn callback(entity: &str, hook: &'static str, message: impl Into<String>) -> Self {
        Self::Callback {
            entity: entity.to_string(),
            hook,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HookError>;

impl<T> From<std::sync::PoisonError<T>> for HookError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
