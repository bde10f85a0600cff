//! Candidate icon URL generation
//!
//! Builds the ranked list of plausible icon URLs for a domain. Order is a
//! hint only; the scorer decides which result actually wins.

use std::time::Duration;

use crate::models::Candidate;
use crate::utils::{domain_of, is_subdomain, parent_domain};

/// Generic icon aggregator backed by a search-engine crawl.
pub const GOOGLE_S2_BASE: &str = "https://www.google.com/s2/favicons";

/// Second aggregator; serves `.ico` keyed by bare host.
pub const DUCKDUCKGO_BASE: &str = "https://icons.duckduckgo.com/ip3/";

/// Legacy third-party favicon proxy, low trust.
pub const YANDEX_BASE: &str = "https://favicon.yandex.net/favicon/";

/// Deterministic default icon URL for a domain: what consumers get with
/// zero latency before (or without) any detection result.
pub fn default_icon_url(domain: &str) -> String {
    format!("{}?domain={}&sz=64", GOOGLE_S2_BASE, domain)
}

pub struct CandidateGenerator {
    native_base: Option<String>,
    probe_timeout: Duration,
}

impl CandidateGenerator {
    pub fn new(native_base: Option<String>, probe_timeout: Duration) -> Self {
        Self {
            native_base,
            probe_timeout,
        }
    }

    /// Ordered candidate list for a site URL. Unparseable input yields an
    /// empty list, never an error.
    pub fn generate(&self, site_url: &str) -> Vec<Candidate> {
        let host = match domain_of(site_url) {
            Some(host) => host,
            None => {
                tracing::debug!("No candidates for unparseable input: {}", site_url);
                return Vec::new();
            }
        };

        let subdomain = is_subdomain(&host);
        let mut urls = Vec::new();

        if let Some(base) = &self.native_base {
            urls.push(format!("{}{}", base, host));
        }

        urls.extend(urls_for_host(&host, subdomain));

        // Degraded fallback: a subdomain also tries the parent domain's
        // sources, after its own.
        if subdomain {
            if let Some(parent) = parent_domain(&host) {
                urls.extend(urls_for_host(&parent, false));
            }
        }

        urls.dedup();
        urls.into_iter()
            .map(|url| Candidate::new(url, self.probe_timeout))
            .collect()
    }
}

/// The per-host source set. For a subdomain the aggregator is keyed by the
/// host exactly as given; for a root site the `www.`-prefixed variant is
/// preferred, with the bare root as a second chance.
fn urls_for_host(host: &str, subdomain: bool) -> Vec<String> {
    let mut urls = vec![format!("https://{}/favicon.ico", host)];

    if subdomain {
        urls.push(format!("{}?domain={}&sz=64", GOOGLE_S2_BASE, host));
    } else {
        let root = parent_domain(host).unwrap_or_else(|| host.to_string());
        urls.push(format!("{}?domain=www.{}&sz=64", GOOGLE_S2_BASE, root));
        urls.push(format!("{}?domain={}&sz=64", GOOGLE_S2_BASE, root));
    }

    urls.push(format!("{}{}.ico", DUCKDUCKGO_BASE, host));
    urls.push(format!("{}{}", YANDEX_BASE, host));
    urls
}
