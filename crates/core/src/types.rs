/// Pages are addressed by their URL slug (e.g. `about-us`).
pub type Slug = String;

/// Monotonic per-page version number assigned by the server on every save.
pub type Version = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
