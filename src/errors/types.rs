//! Error type definitions for the favicon resolver
//!
//! No failure mode in this subsystem is fatal to the host: every public
//! entry point degrades to "show a generic icon" rather than surfacing an
//! error. These types exist for the internal seams (collaborators, cache
//! persistence) where a failure still has to be carried and logged before
//! it is absorbed.

use thiserror::Error;

/// Top-level error type for the icon resolution engine
#[derive(Error, Debug)]
pub enum IconError {
    /// Unparseable URL input; every entry point degrades to empty/default
    #[error("Malformed input: {input}")]
    MalformedInput { input: String },

    /// A candidate probe failed (network error, non-image, timeout)
    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// Durable read/write error; treated as empty/best-effort
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Nothing ever scored above zero; resolved via the last-resort URL
    #[error("No usable candidate for domain: {domain}")]
    ExhaustedCandidates { domain: String },
}

/// Probe-level failures. All of these resolve to "no candidate" at the
/// probe engine boundary.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response was not a decodable image
    #[error("Not an image: {url}")]
    NotAnImage { url: String },

    /// The probe did not settle within its deadline
    #[error("Timed out after {seconds}s: {url}")]
    Timeout { url: String, seconds: u64 },
}

/// Durable-store failures. Logged and absorbed; the cache operates
/// memory-only until the next successful flush.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
