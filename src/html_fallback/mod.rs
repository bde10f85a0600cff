//! HTML fallback: scrape a page's declared icon links
//!
//! Runs only when primary probing came back weak. Self-declared icons are
//! considered more authoritative than third-party aggregation, so results
//! accepted from this pass carry a fixed score bonus.

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Declared size treated as "unbounded": vector icons scale to anything.
pub const VECTOR_SIZE: u32 = u32::MAX;

/// Page-fetch collaborator: raw HTML or failure, subject to timeout and
/// cross-origin limits outside the engine's control.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<String>;
}

/// Default [`PageFetcher`] over reqwest with a short, cancellable timeout.
pub struct HttpPageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("favicon-resolver/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {} fetching {}", response.status(), url);
        }
        Ok(response.text().await?)
    }
}

/// An icon the page itself declares via `<link>` markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredIcon {
    pub url: String,
    pub size_hint: u32,
}

/// Scans HTML for icon-declaration markup (standard and touch-icon
/// variants) and resolves hrefs absolute against the page origin.
pub struct IconLinkExtractor {
    link_re: Regex,
    rel_re: Regex,
    href_re: Regex,
    sizes_re: Regex,
}

impl IconLinkExtractor {
    pub fn new() -> Self {
        // Attribute values come quoted or bare; both forms appear in the
        // wild often enough to matter.
        Self {
            link_re: Regex::new(r"(?is)<link\s[^>]*>").expect("static regex"),
            rel_re: attr_regex("rel"),
            href_re: attr_regex("href"),
            sizes_re: attr_regex("sizes"),
        }
    }

    /// Extract declared icons, sorted descending by declared size. Any
    /// parse trouble yields an empty list, never an error.
    pub fn extract(&self, html: &str, page_url: &str) -> Vec<DeclaredIcon> {
        let base = match Url::parse(page_url) {
            Ok(base) => base,
            Err(_) => return Vec::new(),
        };

        let mut icons = Vec::new();
        for tag in self.link_re.find_iter(html) {
            let tag = tag.as_str();

            let rel = match self.attr_value(&self.rel_re, tag) {
                Some(rel) => rel.to_ascii_lowercase(),
                None => continue,
            };
            if !rel.split_whitespace().any(|token| token.contains("icon")) {
                continue;
            }

            let href = match self.attr_value(&self.href_re, tag) {
                Some(href) if !href.is_empty() => href,
                _ => continue,
            };

            // Handles absolute, relative and protocol-relative hrefs.
            let resolved = match base.join(&href) {
                Ok(resolved) => resolved.to_string(),
                Err(_) => continue,
            };

            let size_hint = self
                .attr_value(&self.sizes_re, tag)
                .map(|sizes| parse_size_hint(&sizes))
                .unwrap_or_else(|| if is_vector(&resolved) { VECTOR_SIZE } else { 0 });

            icons.push(DeclaredIcon {
                url: resolved,
                size_hint,
            });
        }

        icons.sort_by(|a, b| b.size_hint.cmp(&a.size_hint));
        debug!("Extracted {} declared icon(s) from {}", icons.len(), page_url);
        icons
    }

    fn attr_value(&self, re: &Regex, tag: &str) -> Option<String> {
        re.captures(tag).map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        })
    }
}

impl Default for IconLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn attr_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)\b{}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#,
        name
    ))
    .expect("static regex")
}

/// Parse a `sizes` attribute. Multiple declared sizes collapse to the
/// largest; `any` means vector.
fn parse_size_hint(sizes: &str) -> u32 {
    let mut best = 0u32;
    for token in sizes.split_whitespace() {
        if token.eq_ignore_ascii_case("any") {
            return VECTOR_SIZE;
        }
        if let Some((w, h)) = token.to_ascii_lowercase().split_once('x') {
            if let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>()) {
                best = best.max(w.max(h));
            }
        }
    }
    best
}

fn is_vector(url: &str) -> bool {
    url.split('?').next().unwrap_or(url).ends_with(".svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://example.com/articles/page.html";

    #[test]
    fn test_extracts_and_sorts_by_declared_size() {
        let html = r#"
            <html><head>
            <link rel="stylesheet" href="/style.css">
            <link rel="icon" href="/small.png" sizes="16x16">
            <link rel="apple-touch-icon" href="/touch.png" sizes="180x180">
            <link rel="shortcut icon" href="/fav.ico" sizes="32x32 48x48">
            </head></html>
        "#;
        let icons = IconLinkExtractor::new().extract(html, PAGE);
        let urls: Vec<&str> = icons.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/touch.png",
                "https://example.com/fav.ico",
                "https://example.com/small.png",
            ]
        );
        assert_eq!(icons[1].size_hint, 48);
    }

    #[test]
    fn test_relative_and_protocol_relative_hrefs() {
        let html = r#"
            <link rel="icon" href="icons/fav.png" sizes="32x32">
            <link rel="icon" href="//cdn.example.net/fav.png" sizes="64x64">
        "#;
        let icons = IconLinkExtractor::new().extract(html, PAGE);
        assert_eq!(icons[0].url, "https://cdn.example.net/fav.png");
        assert_eq!(icons[1].url, "https://example.com/articles/icons/fav.png");
    }

    #[test]
    fn test_vector_icons_rank_unbounded() {
        let html = r#"
            <link rel="icon" href="/icon.svg">
            <link rel="apple-touch-icon" href="/touch.png" sizes="180x180">
            <link rel="icon" sizes="any" href="/scalable.png">
        "#;
        let icons = IconLinkExtractor::new().extract(html, PAGE);
        assert_eq!(icons[0].size_hint, VECTOR_SIZE);
        assert_eq!(icons[1].size_hint, VECTOR_SIZE);
        assert_eq!(icons[2].url, "https://example.com/touch.png");
    }

    #[test]
    fn test_unquoted_attributes() {
        let html = r#"<link rel=icon href=/fav.png sizes=48x48>"#;
        let icons = IconLinkExtractor::new().extract(html, PAGE);
        assert_eq!(icons.len(), 1);
        assert_eq!(icons[0].url, "https://example.com/fav.png");
        assert_eq!(icons[0].size_hint, 48);
    }

    #[test]
    fn test_garbage_input_yields_empty() {
        let extractor = IconLinkExtractor::new();
        assert!(extractor.extract("", PAGE).is_empty());
        assert!(extractor.extract("<<<<not html", PAGE).is_empty());
        assert!(extractor
            .extract("<link rel=\"icon\" href=\"/f.png\">", "not a base url")
            .is_empty());
    }

    #[test]
    fn test_non_icon_rels_ignored() {
        let html = r#"
            <link rel="preload" href="/font.woff2">
            <link rel="canonical" href="https://example.com/">
        "#;
        assert!(IconLinkExtractor::new().extract(html, PAGE).is_empty());
    }
}
