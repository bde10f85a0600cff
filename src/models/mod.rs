//! Shared data types for the icon resolution engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Best-known icon for a domain. One entry per domain; favicons are a
/// domain-level resource, not a per-page one.
///
/// Invariant: within a freshness cycle, `score` is only replaced by a
/// strictly greater score. A force-refresh write is unconditional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IconCacheEntry {
    pub domain: String,
    pub url: String,
    pub score: i32,
    pub timestamp: DateTime<Utc>,
}

impl IconCacheEntry {
    pub fn new(domain: impl Into<String>, url: impl Into<String>, score: i32) -> Self {
        Self {
            domain: domain.into(),
            url: url.into(),
            score,
            timestamp: Utc::now(),
        }
    }

    /// Age of this entry relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }
}

/// The durable snapshot payload: a serialized map domain -> entry.
/// The schema version lives in the storage key, not in here; bumping the
/// version abandons the whole snapshot.
pub type CacheSnapshot = HashMap<String, IconCacheEntry>;

/// A plausible icon URL to probe. Ephemeral, produced fresh per detection
/// run, never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub probe_timeout: Duration,
}

impl Candidate {
    pub fn new(url: impl Into<String>, probe_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            probe_timeout,
        }
    }
}

/// Measured dimensions of a successfully loaded candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// A probe result after scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredProbe {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub score: i32,
}

/// Synchronous load-state answer for UI consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconLoadState {
    /// Detection for the domain is currently in flight.
    Loading,
    /// A cached entry exists for the domain.
    Loaded,
    /// Nothing cached and nothing running; consumers show the default.
    Error,
}
