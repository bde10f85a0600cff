//! Composite scoring for probed icon candidates
//!
//! `score = source_priority + size_desirability + aspect_desirability`.
//! The score only needs to be comparable, not meaningful in absolute
//! terms; thresholds elsewhere (good-enough, high-confidence) are
//! calibrated against these bands.

use crate::candidates::{DUCKDUCKGO_BASE, GOOGLE_S2_BASE, YANDEX_BASE};
use crate::models::{ProbeResult, ScoredProbe};

/// Score assigned to any probe matching a known placeholder signature:
/// usable as a last resort, never preferred over a real icon.
pub const PLACEHOLDER_SCORE: i32 = 1;

/// Priority for the host-native favicon capability.
const NATIVE_PRIORITY: i32 = 40;

/// Priority for the site's own root favicon.
const SITE_FAVICON_PRIORITY: i32 = 35;

/// Floor for sources we know nothing about.
const UNKNOWN_PRIORITY: i32 = 5;

/// Host-native results at or below this edge length signal "truly
/// unknown", not "low quality", and are rejected outright.
const NATIVE_STUB_MAX_PX: u32 = 16;

/// Trust ranking for third-party icon services, longest-prefix matched.
/// Aggregators backed by search-engine crawls rank medium; older proxy
/// services rank low because they frequently substitute placeholders.
static SOURCE_PRIORITIES: &[(&str, i32)] = &[
    (GOOGLE_S2_BASE, 25),
    (DUCKDUCKGO_BASE, 22),
    (YANDEX_BASE, 10),
];

/// Known (source, width, height) triples that are generic "not found"
/// stand-ins from specific services rather than genuine icons.
static PLACEHOLDER_SIGNATURES: &[(&str, u32, u32)] = &[
    (GOOGLE_S2_BASE, 16, 16),
    (DUCKDUCKGO_BASE, 32, 32),
    (YANDEX_BASE, 16, 16),
];

pub struct Scorer {
    native_base: Option<String>,
}

impl Scorer {
    pub fn new(native_base: Option<String>) -> Self {
        Self { native_base }
    }

    /// Score one probe result. Returns `None` for probes that must be
    /// treated as "no result" (tiny host-native stubs).
    pub fn score(&self, probe: &ProbeResult) -> Option<ScoredProbe> {
        let side = probe.width.max(probe.height);

        if self.is_native(&probe.url) && side <= NATIVE_STUB_MAX_PX {
            return None;
        }

        let score = if is_placeholder(&probe.url, probe.width, probe.height) {
            PLACEHOLDER_SCORE
        } else {
            self.source_priority(&probe.url)
                + size_desirability(probe.width, probe.height)
                + aspect_desirability(probe.width, probe.height)
        };

        Some(ScoredProbe {
            url: probe.url.clone(),
            width: probe.width,
            height: probe.height,
            score,
        })
    }

    /// Source trustworthiness by longest-prefix match against the static
    /// table, with the native capability and the site's own root favicon
    /// ranked above everything third-party.
    fn source_priority(&self, url: &str) -> i32 {
        if self.is_native(url) {
            return NATIVE_PRIORITY;
        }

        let table_match = SOURCE_PRIORITIES
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, priority)| *priority);
        if let Some(priority) = table_match {
            return priority;
        }

        if is_site_root_favicon(url) {
            return SITE_FAVICON_PRIORITY;
        }

        UNKNOWN_PRIORITY
    }

    fn is_native(&self, url: &str) -> bool {
        self.native_base
            .as_deref()
            .map(|base| url.starts_with(base))
            .unwrap_or(false)
    }
}

/// Whether the URL is a site's own root-relative favicon path.
fn is_site_root_favicon(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| u.path() == "/favicon.ico")
        .unwrap_or(false)
}

/// Peaks in the 48-128px sweet spot, zero below 32px (eliminates stub
/// icons), tapers through 512px, floored beyond.
pub fn size_desirability(width: u32, height: u32) -> i32 {
    let side = width.max(height);
    match side {
        0..=31 => 0,
        32..=47 => 15,
        48..=128 => 30,
        129..=256 => 22,
        257..=512 => 15,
        _ => 8,
    }
}

/// Maximal at exact 1:1, decreasing in discrete bands by deviation from
/// square.
pub fn aspect_desirability(width: u32, height: u32) -> i32 {
    if width == 0 || height == 0 {
        return 0;
    }
    if width == height {
        return 30;
    }
    let ratio = width.max(height) as f64 / width.min(height) as f64;
    if ratio <= 1.1 {
        24
    } else if ratio <= 1.25 {
        18
    } else if ratio <= 1.5 {
        12
    } else if ratio <= 2.0 {
        6
    } else {
        2
    }
}

/// Whether this (source, dimensions) combination is a known generic
/// "not found" stand-in.
pub fn is_placeholder(url: &str, width: u32, height: u32) -> bool {
    PLACEHOLDER_SIGNATURES
        .iter()
        .any(|(prefix, w, h)| url.starts_with(prefix) && width == *w && height == *h)
}
