use chrono::TimeZone;


/// Clock used for all timestamps.
pub type Clock = chrono::Utc;


/// Type for all timestamps.
pub type Timestamp = chrono::DateTime::<Clock>;


/// Converts seconds since the epoch as reported by the backend.
///
/// Returns `None` for values chrono cannot represent.
pub(crate) fn from_unix(seconds: i64) -> Option<Timestamp> {
    chrono::Utc
        .timestamp_opt(seconds, 0)
        .single()
}
