//! Resolution orchestrator: the state machine tying the engine together
//!
//! Composes candidate generation, concurrent probing, scoring, the HTML
//! fallback, the cache store and the broadcaster. The core design
//! decision is the incremental-update contract: consumers see
//! improvements as each probe resolves, not only after all resolve.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::broadcast::{IconSubscription, IconUpdateBroadcaster};
use crate::cache::{CacheStats, FileKeyValueStore, IconCacheStore, KeyValueStore};
use crate::candidates::{default_icon_url, CandidateGenerator};
use crate::config::Config;
use crate::errors::IconError;
use crate::html_fallback::{HttpPageFetcher, IconLinkExtractor, PageFetcher};
use crate::models::{Candidate, IconLoadState};
use crate::overrides::OverrideTable;
use crate::probe::{HttpImageLoader, IconProber, ImageLoader};
use crate::scoring::Scorer;
use crate::utils::{domain_of, normalize_url_scheme};

pub struct IconResolverService {
    detection: crate::config::DetectionConfig,
    cache: IconCacheStore,
    broadcaster: IconUpdateBroadcaster,
    overrides: OverrideTable,
    generator: CandidateGenerator,
    scorer: Scorer,
    prober: IconProber,
    fetcher: Arc<dyn PageFetcher>,
    extractor: IconLinkExtractor,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the per-domain in-flight slot on every exit path.
struct InFlightGuard {
    domain: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.domain);
    }
}

impl IconResolverService {
    pub fn new(
        config: &Config,
        kv: Arc<dyn KeyValueStore>,
        loader: Arc<dyn ImageLoader>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let detection = config.detection.clone();
        Self {
            cache: IconCacheStore::new(
                kv,
                config.storage.flush_debounce_ms,
                config.storage.max_age_days,
            ),
            broadcaster: IconUpdateBroadcaster::new(),
            overrides: OverrideTable::new(&config.overrides.icons),
            generator: CandidateGenerator::new(
                detection.native_source_base.clone(),
                detection.probe_timeout(),
            ),
            scorer: Scorer::new(detection.native_source_base.clone()),
            prober: IconProber::new(loader),
            fetcher,
            extractor: IconLinkExtractor::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            detection,
        }
    }

    /// Service wired to the default network and filesystem collaborators.
    pub fn with_default_collaborators(config: &Config) -> anyhow::Result<Self> {
        let kv = Arc::new(FileKeyValueStore::new(config.storage.snapshot_path.clone()));
        let loader = Arc::new(HttpImageLoader::new()?);
        let fetcher = Arc::new(HttpPageFetcher::new(config.detection.page_timeout())?);
        Ok(Self::new(config, kv, loader, fetcher))
    }

    /// Populate the memory cache from the durable snapshot. Returns the
    /// number of entries loaded.
    pub async fn load(&self) -> usize {
        self.cache.load().await
    }

    /// Synchronous, zero-latency answer: static override, else cached
    /// entry, else the deterministic default aggregator URL. Always
    /// returns something.
    pub fn cached_icon_url(&self, url: &str) -> String {
        let domain = match domain_of(url) {
            Some(domain) => domain,
            None => return default_icon_url(""),
        };
        if let Some(override_url) = self.overrides.lookup(&domain) {
            return override_url.to_string();
        }
        if let Some(entry) = self.cache.get(&domain) {
            return entry.url;
        }
        default_icon_url(&domain)
    }

    /// Synchronous load-state answer for the domain behind `url`.
    pub fn icon_load_state(&self, url: &str) -> IconLoadState {
        let domain = match domain_of(url) {
            Some(domain) => domain,
            None => return IconLoadState::Error,
        };
        if self.in_flight.lock().unwrap().contains(&domain) {
            return IconLoadState::Loading;
        }
        if self.cache.get(&domain).is_some() {
            return IconLoadState::Loaded;
        }
        IconLoadState::Error
    }

    /// Subscribe to progressive icon updates for the domain behind `url`.
    pub fn on_icon_update(
        &self,
        url: &str,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> IconSubscription {
        let domain = domain_of(url).unwrap_or_else(|| url.trim().to_ascii_lowercase());
        self.broadcaster.subscribe(&domain, callback)
    }

    /// Idempotent; see [`IconUpdateBroadcaster::unsubscribe`].
    pub fn unsubscribe(&self, subscription: &IconSubscription) {
        self.broadcaster.unsubscribe(subscription);
    }

    /// Full wipe of memory and durable cache state.
    pub async fn clear_all_cache(&self) {
        self.cache.clear().await;
    }

    /// Flush any pending snapshot write immediately (graceful shutdown).
    pub async fn flush(&self) {
        self.cache.flush_now().await;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Detect the best icon for a site URL and return its URL.
    ///
    /// Idempotent per domain: a call arriving while detection for the
    /// domain is already running short-circuits, returning the current
    /// best-known URL without starting duplicate work. Never fails
    /// outward; every failure path degrades to a usable URL.
    pub async fn detect_best_icon(&self, url: &str) -> String {
        let domain = match domain_of(url) {
            Some(domain) => domain,
            None => {
                debug!(
                    "{}; degrading to default",
                    IconError::MalformedInput {
                        input: url.to_string()
                    }
                );
                return default_icon_url("");
            }
        };

        if let Some(override_url) = self.overrides.lookup(&domain) {
            return override_url.to_string();
        }

        // Check-and-insert happens inside one critical section with no
        // suspension point; two racing calls cannot both pass.
        let _guard = {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(domain.clone()) {
                drop(in_flight);
                debug!("Detection already in flight for {}", domain);
                return self.cached_icon_url(url);
            }
            InFlightGuard {
                domain: domain.clone(),
                in_flight: Arc::clone(&self.in_flight),
            }
        };

        // Freshness gate, evaluated before any network call.
        let mut force = false;
        let mut baseline = 0;
        if let Some(entry) = self.cache.get(&domain) {
            let age = entry.age(Utc::now());
            if age < chrono::Duration::hours(self.detection.soft_expire_hours)
                && entry.score >= self.detection.high_confidence_score
            {
                debug!(
                    "Serving fresh high-confidence icon for {} (score {})",
                    domain, entry.score
                );
                return entry.url;
            }
            if age >= chrono::Duration::days(self.detection.force_refresh_days) {
                // Old score no longer blocks replacement.
                force = true;
            } else {
                baseline = entry.score;
            }
        }

        let candidates = self.generator.generate(url);
        info!(
            "Detecting icon for {}: {} candidate(s), baseline {}",
            domain,
            candidates.len(),
            baseline
        );

        let best = self
            .probe_batch(&candidates, &domain, baseline, force, 0)
            .await;

        let best = if best < self.detection.good_enough_score {
            self.run_html_fallback(url, &domain, best, force).await
        } else {
            best
        };

        match self.cache.get(&domain) {
            Some(entry) => entry.url,
            None => {
                // Nothing ever beat the baseline and nothing was cached
                // before: deterministic last resort, intentionally left
                // uncached so recovery is immediate once the network is
                // back.
                debug!(
                    "{} (best score {}); serving last-resort URL",
                    IconError::ExhaustedCandidates {
                        domain: domain.clone()
                    },
                    best
                );
                default_icon_url(&domain)
            }
        }
    }

    /// Probe candidates concurrently and apply the incremental-update
    /// contract: each settling result that beats the running baseline
    /// immediately raises it, writes through to the cache and publishes.
    /// Returns the final baseline.
    async fn probe_batch(
        &self,
        candidates: &[Candidate],
        domain: &str,
        baseline: i32,
        force: bool,
        bonus: i32,
    ) -> i32 {
        let mut best = baseline;
        let mut probes: FuturesUnordered<_> = candidates
            .iter()
            .map(|candidate| self.prober.probe(candidate))
            .collect();

        while let Some(settled) = probes.next().await {
            let probe = match settled {
                Some(probe) => probe,
                None => continue,
            };
            let scored = match self.scorer.score(&probe) {
                Some(scored) => scored,
                None => continue,
            };
            let score = scored.score.saturating_add(bonus);
            if score > best {
                best = score;
                if self.cache.put(domain, &scored.url, score, force) {
                    self.broadcaster.publish(domain, &scored.url);
                }
            }
        }
        best
    }

    /// Fetch the page and probe its declared icons under the same
    /// incremental-update contract, with the declared bonus applied
    /// before comparison.
    async fn run_html_fallback(
        &self,
        page_url: &str,
        domain: &str,
        baseline: i32,
        force: bool,
    ) -> i32 {
        let page = normalize_url_scheme(page_url);
        let html = match self.fetcher.fetch(&page).await {
            Ok(html) => html,
            Err(e) => {
                debug!("HTML fallback fetch failed for {}: {}", domain, e);
                return baseline;
            }
        };

        let declared = self.extractor.extract(&html, &page);
        if declared.is_empty() {
            return baseline;
        }

        let candidates: Vec<Candidate> = declared
            .into_iter()
            .take(self.detection.fallback_probe_limit)
            .map(|icon| Candidate::new(icon.url, self.detection.fallback_probe_timeout()))
            .collect();
        debug!(
            "HTML fallback for {}: probing {} declared icon(s)",
            domain,
            candidates.len()
        );

        self.probe_batch(
            &candidates,
            domain,
            baseline,
            force,
            self.detection.declared_bonus,
        )
        .await
    }
}
