//! End-to-end tests for the resolution orchestrator over scripted
//! collaborators: no network, no filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use favicon_resolver::cache::MemoryKeyValueStore;
use favicon_resolver::config::Config;
use favicon_resolver::errors::ProbeError;
use favicon_resolver::html_fallback::PageFetcher;
use favicon_resolver::models::IconLoadState;
use favicon_resolver::probe::ImageLoader;
use favicon_resolver::service::IconResolverService;

/// Image-load collaborator answering from a mutable url -> dimensions
/// script, counting loads.
struct ScriptedLoader {
    icons: Mutex<HashMap<String, (u32, u32)>>,
    delay: Duration,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    fn new(icons: &[(&str, (u32, u32))]) -> Arc<Self> {
        Self::with_delay(icons, Duration::ZERO)
    }

    fn with_delay(icons: &[(&str, (u32, u32))], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            icons: Mutex::new(
                icons
                    .iter()
                    .map(|(url, dims)| (url.to_string(), *dims))
                    .collect(),
            ),
            delay,
            loads: AtomicUsize::new(0),
        })
    }

    fn set_icon(&self, url: &str, dims: (u32, u32)) {
        self.icons.lock().unwrap().insert(url.to_string(), dims);
    }

    fn remove_icon(&self, url: &str) {
        self.icons.lock().unwrap().remove(url);
    }

    fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageLoader for ScriptedLoader {
    async fn load(&self, url: &str) -> Result<(u32, u32), ProbeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.icons
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .ok_or_else(|| ProbeError::NotAnImage {
                url: url.to_string(),
            })
    }
}

/// Page-fetch collaborator returning fixed HTML (or failing), counting
/// fetches.
struct ScriptedFetcher {
    html: Option<String>,
    fetches: AtomicUsize,
}

impl ScriptedFetcher {
    fn with_html(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Some(html.to_string()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            html: None,
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.html
            .clone()
            .ok_or_else(|| anyhow::anyhow!("page fetch failed: {}", url))
    }
}

fn service(loader: Arc<ScriptedLoader>, fetcher: Arc<ScriptedFetcher>) -> IconResolverService {
    IconResolverService::new(
        &Config::default(),
        Arc::new(MemoryKeyValueStore::new()),
        loader,
        fetcher,
    )
}

const SITE: &str = "https://example.com/some/page";
const OWN_FAVICON: &str = "https://example.com/favicon.ico";
const S2_WWW: &str = "https://www.google.com/s2/favicons?domain=www.example.com&sz=64";
const DEFAULT_URL: &str = "https://www.google.com/s2/favicons?domain=example.com&sz=64";

#[tokio::test]
async fn test_detection_caches_best_candidate() {
    let loader = ScriptedLoader::new(&[(OWN_FAVICON, (64, 64))]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader, fetcher);

    assert_eq!(service.icon_load_state(SITE), IconLoadState::Error);
    let best = service.detect_best_icon(SITE).await;
    assert_eq!(best, OWN_FAVICON);

    // After one successful probe the sync getter never returns empty
    assert_eq!(service.cached_icon_url(SITE), OWN_FAVICON);
    assert_eq!(service.cached_icon_url("https://example.com/other"), OWN_FAVICON);
    assert_eq!(service.icon_load_state(SITE), IconLoadState::Loaded);
}

#[tokio::test]
async fn test_fresh_high_confidence_entry_skips_network() {
    let loader = ScriptedLoader::new(&[(OWN_FAVICON, (64, 64))]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    service.detect_best_icon(SITE).await;
    let loads_after_first = loader.load_count();
    assert!(loads_after_first > 0);

    // Cached at high confidence and fresh: zero network I/O
    let best = service.detect_best_icon(SITE).await;
    assert_eq!(best, OWN_FAVICON);
    assert_eq!(loader.load_count(), loads_after_first);
}

#[tokio::test]
async fn test_score_non_decreasing_within_freshness_cycle() {
    // First run only finds a low-trust proxy result
    let loader = ScriptedLoader::new(&[("https://favicon.yandex.net/favicon/example.com", (100, 200))]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    service.detect_best_icon(SITE).await;
    // Weak result is cached (nothing better exists)
    assert_eq!(
        service.cached_icon_url(SITE),
        "https://favicon.yandex.net/favicon/example.com"
    );

    // Second run finds something strictly better; the cache moves up
    loader.set_icon("https://icons.duckduckgo.com/ip3/example.com.ico", (48, 48));
    service.detect_best_icon(SITE).await;
    assert_eq!(
        service.cached_icon_url(SITE),
        "https://icons.duckduckgo.com/ip3/example.com.ico"
    );

    // A later run with only the original weak source cannot drag it down
    loader.remove_icon("https://icons.duckduckgo.com/ip3/example.com.ico");
    service.detect_best_icon(SITE).await;
    assert_eq!(
        service.cached_icon_url(SITE),
        "https://icons.duckduckgo.com/ip3/example.com.ico"
    );
}

#[tokio::test]
async fn test_concurrent_detection_is_idempotent() {
    let loader = ScriptedLoader::with_delay(&[(OWN_FAVICON, (64, 64))], Duration::from_millis(100));
    let fetcher = ScriptedFetcher::failing();
    let service = Arc::new(service(loader.clone(), fetcher));

    let background = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.detect_best_icon(SITE).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Second call while the first is in flight: short-circuits to the
    // current best-known value, starts no duplicate probe batch.
    assert_eq!(service.icon_load_state(SITE), IconLoadState::Loading);
    let second = service.detect_best_icon(SITE).await;
    assert_eq!(second, DEFAULT_URL);

    let first = background.await.unwrap();
    assert_eq!(first, OWN_FAVICON);

    // One probe batch total: every candidate loaded at most once
    let candidate_count = 5; // own, s2 www + bare, ddg, yandex
    assert_eq!(loader.load_count(), candidate_count);
}

#[tokio::test]
async fn test_placeholder_cached_first_then_superseded() {
    // Only the aggregator answers, and with its known 16x16 stand-in
    let loader = ScriptedLoader::new(&[(S2_WWW, (16, 16))]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    let best = service.detect_best_icon(SITE).await;
    assert_eq!(best, S2_WWW);
    assert_eq!(service.cached_icon_url(SITE), S2_WWW);

    // A real candidate appears; the placeholder is never retained
    loader.set_icon(OWN_FAVICON, (64, 64));
    let best = service.detect_best_icon(SITE).await;
    assert_eq!(best, OWN_FAVICON);
    assert_eq!(service.cached_icon_url(SITE), OWN_FAVICON);
}

#[tokio::test]
async fn test_good_primary_score_skips_page_fetch() {
    let loader = ScriptedLoader::new(&[(OWN_FAVICON, (64, 64))]);
    let fetcher = ScriptedFetcher::with_html(r#"<link rel="icon" href="/never-probed.png">"#);
    let service = service(loader, fetcher.clone());

    service.detect_best_icon(SITE).await;
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_weak_primary_triggers_html_fallback() {
    // Primary yields only the aggregator placeholder (forced minimum)
    let loader = ScriptedLoader::new(&[(S2_WWW, (16, 16))]);
    let fetcher = ScriptedFetcher::with_html(
        r#"<html><head>
            <link rel="icon" href="/icons/small.png" sizes="16x16">
            <link rel="apple-touch-icon" href="/icons/big.png" sizes="128x128">
        </head></html>"#,
    );
    let service = service(loader.clone(), fetcher.clone());

    loader.set_icon("https://example.com/icons/big.png", (128, 128));

    let best = service.detect_best_icon(SITE).await;
    assert_eq!(fetcher.fetch_count(), 1);
    assert_eq!(best, "https://example.com/icons/big.png");
    assert_eq!(service.cached_icon_url(SITE), "https://example.com/icons/big.png");
}

#[tokio::test]
async fn test_exhausted_candidates_fall_back_uncached() {
    let loader = ScriptedLoader::new(&[]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    let best = service.detect_best_icon(SITE).await;
    assert_eq!(best, DEFAULT_URL);

    // Deliberately uncached: the next call re-detects
    assert_eq!(service.icon_load_state(SITE), IconLoadState::Error);
    let loads_after_first = loader.load_count();
    service.detect_best_icon(SITE).await;
    assert_eq!(loader.load_count(), loads_after_first * 2);
}

#[tokio::test]
async fn test_two_subscribers_notified_once_on_supersede() {
    let loader = ScriptedLoader::new(&[("https://favicon.yandex.net/favicon/example.com", (100, 200))]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    // Seed the cache with a weak entry (score below the supersede)
    service.detect_best_icon(SITE).await;

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let gone = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&first);
    let _sub_a = service.on_icon_update(SITE, move |url| sink.lock().unwrap().push(url.to_string()));
    let sink = Arc::clone(&second);
    let _sub_b = service.on_icon_update(SITE, move |url| sink.lock().unwrap().push(url.to_string()));
    let sink = Arc::clone(&gone);
    let sub_c = service.on_icon_update(SITE, move |url| sink.lock().unwrap().push(url.to_string()));
    service.unsubscribe(&sub_c);

    // A strictly better candidate supersedes the cached entry
    loader.set_icon(OWN_FAVICON, (64, 64));
    loader.remove_icon("https://favicon.yandex.net/favicon/example.com");
    service.detect_best_icon(SITE).await;

    assert_eq!(*first.lock().unwrap(), vec![OWN_FAVICON.to_string()]);
    assert_eq!(*second.lock().unwrap(), vec![OWN_FAVICON.to_string()]);
    assert!(gone.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_override_short_circuits_detection() {
    let loader = ScriptedLoader::new(&[]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    let best = service.detect_best_icon("https://github.com/some/repo").await;
    assert_eq!(best, "https://github.githubassets.com/favicons/favicon.svg");
    assert_eq!(
        service.cached_icon_url("https://github.com/other"),
        "https://github.githubassets.com/favicons/favicon.svg"
    );
    assert_eq!(loader.load_count(), 0);
}

#[tokio::test]
async fn test_malformed_input_degrades_to_default() {
    let loader = ScriptedLoader::new(&[]);
    let fetcher = ScriptedFetcher::failing();
    let service = service(loader.clone(), fetcher);

    let best = service.detect_best_icon(":::").await;
    assert!(!best.is_empty());
    assert!(!service.cached_icon_url(":::").is_empty());
    assert_eq!(service.icon_load_state(":::"), IconLoadState::Error);
    assert_eq!(loader.load_count(), 0);
}
