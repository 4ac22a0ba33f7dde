/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Unix epoch milliseconds, the unit carried inside signed tokens.
pub type EpochMillis = i64;
