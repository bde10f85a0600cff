//! Probe engine: load one candidate image, measure it, never fail outward
//!
//! Transport is behind the [`ImageLoader`] trait so tests and embedders
//! can supply their own; the default implementation fetches with reqwest
//! and decodes dimensions with the `image` crate.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::errors::ProbeError;
use crate::models::{Candidate, ProbeResult};

/// Image-load collaborator: given a URL, report natural pixel dimensions
/// or fail. Retries and byte-level caching are the transport's business,
/// not the engine's.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(u32, u32), ProbeError>;
}

/// Default [`ImageLoader`] over reqwest.
pub struct HttpImageLoader {
    client: reqwest::Client,
}

/// Hard cap on fetched icon payloads. Anything bigger is not a favicon.
const MAX_ICON_BYTES: usize = 5 * 1024 * 1024;

impl HttpImageLoader {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("favicon-resolver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<(u32, u32), ProbeError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ProbeError::NotAnImage {
                url: url.to_string(),
            });
        }

        // Error pages love returning 200 with HTML; reject those before
        // wasting a decode attempt. Icon servers otherwise disagree too
        // much about content types to filter any tighter.
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if content_type.starts_with("text/html") {
            return Err(ProbeError::NotAnImage {
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() || bytes.len() > MAX_ICON_BYTES {
            return Err(ProbeError::NotAnImage {
                url: url.to_string(),
            });
        }

        let dimensions = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|_| ProbeError::NotAnImage {
                url: url.to_string(),
            })?
            .into_dimensions()
            .map_err(|_| ProbeError::NotAnImage {
                url: url.to_string(),
            })?;

        Ok(dimensions)
    }
}

/// Probes candidates one at a time; concurrency is the orchestrator's
/// decision.
#[derive(Clone)]
pub struct IconProber {
    loader: Arc<dyn ImageLoader>,
}

impl IconProber {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self { loader }
    }

    /// Load and measure one candidate. Resolves `None` on error or
    /// timeout, never errors outward. Exactly one of load/error/timeout
    /// settles the result: once the deadline fires the underlying load
    /// future is dropped, so a late transport completion has nothing left
    /// to deliver into.
    pub async fn probe(&self, candidate: &Candidate) -> Option<ProbeResult> {
        let outcome =
            tokio::time::timeout(candidate.probe_timeout, self.loader.load(&candidate.url)).await;

        match outcome {
            Ok(Ok((width, height))) => {
                trace!("Probe hit: {} ({}x{})", candidate.url, width, height);
                Some(ProbeResult {
                    url: candidate.url.clone(),
                    width,
                    height,
                })
            }
            Ok(Err(e)) => {
                debug!("Probe miss: {}: {}", candidate.url, e);
                None
            }
            Err(_) => {
                debug!(
                    "Probe timed out after {:?}: {}",
                    candidate.probe_timeout, candidate.url
                );
                None
            }
        }
    }
}
