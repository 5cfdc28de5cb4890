//! Status Engine: maps a context and a UTC minute onto one of three statuses.
//!
//! The formula is `STATUSES[(minute + context_id) mod 3]`. It is evaluated on
//! the client for the preview and again on the server before anything is
//! persisted; the server never trusts a client-supplied status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub mod codes;

pub use codes::{generate_artifact_code, generate_verify_hash};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// The decision domain a reading is taken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    Career,
    Love,
    Timing,
}

impl Context {
    pub const ALL: [Context; 3] = [Context::Career, Context::Love, Context::Timing];

    /// Stable numeric id mixed into the seed. Must not change.
    pub fn id(self) -> i64 {
        match self {
            Context::Career => 1,
            Context::Love => 2,
            Context::Timing => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Context::Career => "career",
            Context::Love => "love",
            Context::Timing => "timing",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Context {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Context::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// The outcome shown for a context at a given minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "PROCEED")]
    Proceed,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "NOT NOW")]
    NotNow,
}

/// Ordered; the engine indexes into this list.
pub const STATUSES: [Status; 3] = [Status::Proceed, Status::Hold, Status::NotNow];

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Proceed => "PROCEED",
            Status::Hold => "HOLD",
            Status::NotNow => "NOT NOW",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STATUSES
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// One evaluation of the engine: the status, its seed minute and a fresh code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReading {
    pub status: Status,
    #[serde(rename = "lockedMinute")]
    pub minute: i64,
    pub artifact_code: String,
}

/// The pure formula. The minute is reduced before the id is added, so every
/// `i64` is accepted; Euclidean remainder keeps negative minutes in range.
pub fn status_for(minute: i64, context: Context) -> Status {
    let len = STATUSES.len() as i64;
    let index = (minute.rem_euclid(len) + context.id()).rem_euclid(len);
    STATUSES[index as usize]
}

/// `floor(unix_millis / 60000)` for the given instant.
pub fn minute_of(now: DateTime<Utc>) -> i64 {
    now.timestamp_millis().div_euclid(MILLIS_PER_MINUTE)
}

/// Evaluates the engine at an explicit instant.
pub fn get_status_at(context: Context, now: DateTime<Utc>) -> StatusReading {
    let minute = minute_of(now);
    StatusReading {
        status: status_for(minute, context),
        minute,
        artifact_code: generate_artifact_code(),
    }
}

/// Evaluates the engine against the wall clock.
pub fn get_status(context: Context) -> StatusReading {
    get_status_at(context, Utc::now())
}

/// The instant a minute seed starts at. `None` only for minutes outside
/// chrono's representable range.
pub fn locked_at(minute: i64) -> Option<DateTime<Utc>> {
    let millis = minute.checked_mul(MILLIS_PER_MINUTE)?;
    Utc.timestamp_millis_opt(millis).single()
}

/// ISO-8601 with millisecond precision and a `Z` suffix, e.g. `2024-01-01T00:00:00.000Z`.
pub fn to_iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
