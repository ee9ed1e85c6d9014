//! URL handling module for Sumi-Glean
//!
//! This module provides URL validation, robots.txt location and link
//! resolution.

mod resolve;

pub use resolve::resolve_link;

use url::Url;

/// Checks whether a string is a well-formed URL
///
/// A URL is valid iff it parses and carries both a scheme and a non-empty
/// host component. Scheme-only strings such as `mailto:someone@example.com`
/// are rejected because they have no host.
///
/// # Examples
///
/// ```
/// use sumi_glean::url::is_valid_url;
///
/// assert!(is_valid_url("https://example.com/page"));
/// assert!(!is_valid_url("not-a-url"));
/// ```
pub fn is_valid_url(url: &str) -> bool {
    parse_valid_url(url).is_some()
}

/// Parses a URL, returning it only if [`is_valid_url`] would accept it
pub fn parse_valid_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(parsed),
        _ => None,
    }
}

/// Returns the key identifying a URL's origin (`scheme://host[:port]`)
pub fn origin_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Returns the location of the robots.txt file governing a URL
///
/// # Examples
///
/// ```
/// use sumi_glean::url::robots_txt_url;
/// use url::Url;
///
/// let url = Url::parse("https://Example.com:8443/a/b?c=d").unwrap();
/// assert_eq!(
///     robots_txt_url(&url).unwrap().as_str(),
///     "https://example.com:8443/robots.txt"
/// );
/// ```
pub fn robots_txt_url(url: &Url) -> Option<Url> {
    Url::parse(&format!("{}/robots.txt", origin_key(url))).ok()
}
