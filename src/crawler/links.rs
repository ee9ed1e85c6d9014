//! Next-page link discovery

use crate::crawler::extractor::parse_markup;
use crate::url::resolve_link;
use scraper::Selector;
use url::Url;

/// Locates the next-page link of a paginated listing
///
/// The first element matching `selector` is taken; its `href` is resolved
/// against `current_url`.
///
/// # Returns
///
/// * `Ok(Some(Url))` - The absolute URL of the next page
/// * `Ok(None)` - No matching element, or it has no followable `href`
/// * `Err(String)` - The markup or the selector could not be parsed
pub fn find_next_link(markup: &str, selector: &str, current_url: &Url) -> Result<Option<Url>, String> {
    let document = parse_markup(markup)?;
    let selector =
        Selector::parse(selector).map_err(|e| format!("invalid next-page selector: {}", e))?;

    Ok(document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| resolve_link(href, current_url)))
}
