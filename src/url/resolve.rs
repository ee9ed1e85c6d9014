use url::Url;

/// Resolves an href against the page it was found on
///
/// Returns None if the link should not be followed:
/// - empty hrefs
/// - javascript:, mailto:, tel: and data: links
/// - fragment-only links (same page anchors)
/// - anything that does not resolve to an HTTP(S) URL
///
/// # Examples
///
/// ```
/// use sumi_glean::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/catalogue/page-1.html").unwrap();
/// let next = resolve_link("page-2.html", &base).unwrap();
/// assert_eq!(next.as_str(), "https://example.com/catalogue/page-2.html");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}
