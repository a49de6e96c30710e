//! Timestamps.

use chrono::{DateTime, Utc};

/// UTC timestamp carried by readings and change events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}
