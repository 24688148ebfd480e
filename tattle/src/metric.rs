//! Metric record types: counters, gauges, and events.
//!
//! The three value shapes share a wire format with the collector server:
//! timestamps serialize as integer Unix seconds under the `dateCreated` /
//! `dateUpdated` keys, and each record carries its metric name. Counters
//! merge by name; gauges and events never merge — every call produces an
//! independent record.
//!
//! # Design
//!
//! Counters represent monotonic totals, so there is no value in keeping a
//! history of every increment: repeated increments for the same name sum
//! into one pending record. Gauges and events are sampled/discrete and
//! must preserve every occurrence for server-side aggregation.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A timestamp in whole seconds since the Unix epoch.
///
/// Sub-second precision is truncated at capture time, which keeps the
/// in-memory, persisted, and wire representations identical.
pub type UnixSeconds = u64;

/// Returns the current time truncated to whole Unix seconds.
pub fn now_unix() -> UnixSeconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Well-known counter names recorded by the library itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardCounter {
    /// Incremented once per buffer construction (one per app launch).
    AppLaunched,
}

impl StandardCounter {
    /// The wire name of this counter.
    pub fn name(self) -> &'static str {
        match self {
            StandardCounter::AppLaunched => "appLaunched",
        }
    }
}

/// A monotonic counter pending delivery.
///
/// At most one pending `Counter` exists per name: repeated increments merge
/// via [`Counter::merge`], summing `count` while preserving the original
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Metric name, unique within the pending collection.
    pub name: String,
    /// Accumulated increment total since the last successful delivery.
    pub count: i64,
    /// Timestamp of the first increment, in Unix seconds.
    #[serde(rename = "dateCreated")]
    pub created_at: UnixSeconds,
    /// Timestamp of the most recent increment, in Unix seconds.
    #[serde(rename = "dateUpdated")]
    pub updated_at: UnixSeconds,
}

impl Counter {
    /// Creates a new counter with both timestamps set to `now`.
    pub fn new(name: impl Into<String>, count: i64, now: UnixSeconds) -> Self {
        Self {
            name: name.into(),
            count,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges an increment into this counter.
    ///
    /// Sums `amount` into `count` and replaces `updated_at`; `created_at`
    /// keeps the timestamp of the first increment.
    pub fn merge(&mut self, amount: i64, now: UnixSeconds) {
        self.count += amount;
        self.updated_at = now;
    }
}

/// A single gauge observation pending delivery.
///
/// Gauges never merge: duplicates by name are legal and intentional, since
/// each observation is a distinct sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    /// Metric name.
    pub name: String,
    /// The observed value.
    pub value: f32,
    /// Timestamp of the observation, in Unix seconds.
    #[serde(rename = "dateCreated")]
    pub created_at: UnixSeconds,
}

impl Gauge {
    /// Creates a new gauge observation.
    pub fn new(name: impl Into<String>, value: f32, now: UnixSeconds) -> Self {
        Self {
            name: name.into(),
            value,
            created_at: now,
        }
    }
}

/// A discrete event pending delivery.
///
/// Events never merge; every call appends a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Optional string attributes attached to the event.
    ///
    /// Serializes as `null` when absent, matching the collector wire format.
    #[serde(default)]
    pub attributes: Option<HashMap<String, String>>,
    /// Timestamp of the event, in Unix seconds.
    #[serde(rename = "dateCreated")]
    pub created_at: UnixSeconds,
}

impl Event {
    /// Creates a new event record.
    pub fn new(
        name: impl Into<String>,
        attributes: Option<HashMap<String, String>>,
        now: UnixSeconds,
    ) -> Self {
        Self {
            name: name.into(),
            attributes,
            created_at: now,
        }
    }
}
