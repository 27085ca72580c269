//! Pure question versioning logic.
//!
//! Nothing here touches the store: the database layer fetches rows, asks these
//! functions what to write, and performs the writes inside its transaction.

mod links;
mod plan;
mod serial;

pub use links::*;
pub use plan::*;
pub use serial::*;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

/// Clock reading shared by every entry of one apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyContext {
    pub now: String,
    pub year: i64,
}

impl ApplyContext {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            now: format_timestamp(instant),
            year: instant.year() as i64,
        }
    }

    pub fn current() -> Self {
        Self::at(Utc::now())
    }
}

/// RFC 3339 with fixed microsecond precision, so stored timestamps sort as text.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
