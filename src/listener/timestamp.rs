use chrono::{DateTime, Utc};

/// Source of the values written into auto-timestamped audit fields.
pub trait TimestampProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock provider
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTimestampProvider;

impl TimestampProvider for DefaultTimestampProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. Useful for deterministic replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimestampProvider(pub DateTime<Utc>);

impl TimestampProvider for FixedTimestampProvider {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
