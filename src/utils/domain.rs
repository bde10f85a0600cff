//! Domain and host classification helpers
//!
//! Icons are a domain-level resource: every cache key, subscription and
//! in-flight guard in this crate is keyed by the host-name portion of a
//! URL. These helpers centralize how hosts are extracted and classified.

use url::Url;

/// Normalize a URL by ensuring it has a proper scheme (http:// or https://)
/// If the URL already has a scheme, it returns it unchanged.
/// If the URL lacks a scheme, it prepends "https://"
pub fn normalize_url_scheme(url: &str) -> String {
    let trimmed_url = url.trim();

    if trimmed_url.starts_with("http://") || trimmed_url.starts_with("https://") {
        trimmed_url.to_string()
    } else {
        format!("https://{}", trimmed_url)
    }
}

/// Extract the host-name portion of a URL, the cache-key granularity for
/// icons. Returns `None` for unparseable input or URLs without a host.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(&normalize_url_scheme(url)).ok()?;
    parsed.host_str().map(|h| h.trim_end_matches('.').to_ascii_lowercase())
}

/// A host counts as a subdomain when it has more than two labels and the
/// first label is not `www`. `www.example.com` is treated as the root
/// site, `mail.example.com` is not.
pub fn is_subdomain(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    labels.len() > 2 && labels[0] != "www"
}

/// Parent registrable domain: the last two labels of the host.
///
/// This is an approximation that ignores multi-label public suffixes, but
/// it only feeds degraded fallback candidates whose results still have to
/// win on score, so a wrong guess costs nothing.
pub fn parent_domain(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_scheme() {
        assert_eq!(normalize_url_scheme("example.com"), "https://example.com");
        assert_eq!(
            normalize_url_scheme("http://example.com"),
            "http://example.com"
        );
        assert_eq!(
            normalize_url_scheme("https://example.com/page"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(
            domain_of("https://Example.COM/some/page?q=1"),
            Some("example.com".to_string())
        );
        assert_eq!(domain_of("sub.example.com"), Some("sub.example.com".to_string()));
        assert_eq!(domain_of("not a url at all :::"), None);
        assert_eq!(domain_of(""), None);
    }

    #[test]
    fn test_is_subdomain() {
        assert!(is_subdomain("mail.example.com"));
        assert!(is_subdomain("a.b.example.com"));
        assert!(!is_subdomain("example.com"));
        assert!(!is_subdomain("www.example.com"));
        assert!(!is_subdomain("localhost"));
    }

    #[test]
    fn test_parent_domain() {
        assert_eq!(
            parent_domain("mail.example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(parent_domain("example.com"), Some("example.com".to_string()));
        assert_eq!(parent_domain("localhost"), None);
    }
}
