//! Static operator-curated icon overrides
//!
//! Consulted before any dynamic logic; presence here short-circuits all
//! detection. Ships with a small built-in table for domains whose
//! detected icons are chronically wrong; operators extend it via config.

use std::collections::HashMap;

/// Built-in curated entries. Kept deliberately small: every entry here is
/// a domain we have seen resolve badly through the dynamic path.
static BUILTIN_OVERRIDES: &[(&str, &str)] = &[
    (
        "github.com",
        "https://github.githubassets.com/favicons/favicon.svg",
    ),
    (
        "x.com",
        "https://abs.twimg.com/responsive-web/client-web/icon-ios.77d25eba.png",
    ),
    (
        "mail.google.com",
        "https://ssl.gstatic.com/ui/v1/icons/mail/rfr/gmail.ico",
    ),
    (
        "news.ycombinator.com",
        "https://news.ycombinator.com/y18.svg",
    ),
];

pub struct OverrideTable {
    icons: HashMap<String, String>,
}

impl OverrideTable {
    /// Built-in table with operator additions merged over it (operator
    /// entries win on conflict).
    pub fn new(operator_icons: &HashMap<String, String>) -> Self {
        let mut icons: HashMap<String, String> = BUILTIN_OVERRIDES
            .iter()
            .map(|(domain, url)| (domain.to_string(), url.to_string()))
            .collect();
        for (domain, url) in operator_icons {
            icons.insert(domain.to_ascii_lowercase(), url.clone());
        }
        Self { icons }
    }

    /// Exact-domain lookup, with a second chance for the `www.`-stripped
    /// form so `www.github.com` hits the `github.com` override.
    pub fn lookup(&self, domain: &str) -> Option<&str> {
        if let Some(url) = self.icons.get(domain) {
            return Some(url.as_str());
        }
        domain
            .strip_prefix("www.")
            .and_then(|bare| self.icons.get(bare))
            .map(String::as_str)
    }
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}
