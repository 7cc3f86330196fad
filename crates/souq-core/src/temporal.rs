//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds precision
//! and rendered as ISO 8601 with `Z` suffix.
//!
//! ## Ordering Invariant
//!
//! Timestamps are persisted in documents as their ISO 8601 string form, and
//! the backing store orders documents by comparing raw field values. With a
//! fixed-width `YYYY-MM-DDTHH:MM:SSZ` rendering, lexicographic order equals
//! chronological order, which is what makes `order_by("createdAt")` and
//! timestamp range predicates correct without store-side date handling.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parse failure for an ISO 8601 timestamp string.
#[derive(Error, Debug)]
#[error("invalid RFC 3339 timestamp {input:?}: {reason}")]
pub struct TimestampParseError {
    /// The rejected input.
    pub input: String,
    /// Why parsing failed.
    pub reason: String,
}

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, any offset, converted
///   to UTC. Catalog documents are ingested from external systems, so offset
///   inputs are accepted and normalized rather than rejected.
/// - [`Timestamp::epoch()`] — the Unix epoch, used as the normalization
///   fallback for documents with no usable `createdAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating
    /// sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// The Unix epoch (`1970-01-01T00:00:00Z`).
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Parse an RFC 3339 string, converting any offset to UTC and truncating
    /// sub-seconds.
    pub fn parse(s: &str) -> Result<Self, TimestampParseError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| TimestampParseError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO 8601 with Z suffix (e.g. `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
