/// Users are identified by UUIDs issued by the external auth system.
pub type UserId = uuid::Uuid;

/// Uploads are identified by database-generated UUIDs.
pub type UploadId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
