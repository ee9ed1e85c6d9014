//! Selector-driven field extraction
//!
//! Extraction is a pure function of the markup, the selector map and the
//! current time. It never fails: a bad selector nulls its own field, and
//! markup that cannot be parsed yields a degraded record.

use crate::events::{EventSink, ScrapeEvent};
use crate::record::{FieldValue, Record, SelectorMap};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Pluggable extraction strategy
///
/// Any `Fn(&str, &SelectorMap, &str) -> Record` closure is an extractor,
/// so callers can wrap [`SelectorExtractor`] with their own post-processing.
pub trait Extractor: Send + Sync {
    /// Extracts a record from `markup` fetched from `source_url`
    fn extract(&self, markup: &str, selectors: &SelectorMap, source_url: &str) -> Record;
}

impl<F> Extractor for F
where
    F: Fn(&str, &SelectorMap, &str) -> Record + Send + Sync,
{
    fn extract(&self, markup: &str, selectors: &SelectorMap, source_url: &str) -> Record {
        self(markup, selectors, source_url)
    }
}

/// The default extractor: CSS selectors applied with the `scraper` crate
///
/// For each field:
/// - no match → `Null`, plus an `EmptySelector` warning
/// - one match → the element's trimmed text
/// - several matches → the trimmed texts, in document order
/// - invalid selector → `Null`, plus a `FieldFailed` error
pub struct SelectorExtractor {
    sink: Arc<dyn EventSink>,
}

impl SelectorExtractor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, markup: &str, selectors: &SelectorMap, source_url: &str) -> Record {
        let document = match parse_markup(markup) {
            Ok(document) => document,
            Err(error) => {
                self.sink.emit(ScrapeEvent::ParseFailed {
                    url: source_url.to_string(),
                    error: error.clone(),
                });
                return Record::failed(source_url, error);
            }
        };

        let mut fields = BTreeMap::new();
        for (field, selector) in selectors {
            let value = match select_texts(&document, selector) {
                Ok(texts) if texts.is_empty() => {
                    self.sink.emit(ScrapeEvent::EmptySelector {
                        url: source_url.to_string(),
                        field: field.clone(),
                        selector: selector.clone(),
                    });
                    FieldValue::Null
                }
                Ok(texts) => FieldValue::from(texts),
                Err(error) => {
                    self.sink.emit(ScrapeEvent::FieldFailed {
                        url: source_url.to_string(),
                        field: field.clone(),
                        selector: selector.clone(),
                        error,
                    });
                    FieldValue::Null
                }
            };
            fields.insert(field.clone(), value);
        }

        Record::extracted(source_url, fields)
    }
}

/// Parses markup into a document tree
///
/// The HTML parser recovers from malformed tags on its own; what it cannot
/// meaningfully handle is binary content, which is rejected here.
pub fn parse_markup(markup: &str) -> Result<Html, String> {
    if markup.contains('\0') {
        return Err("markup contains NUL bytes; content is not a text document".to_string());
    }
    Ok(Html::parse_document(markup))
}

/// Returns the trimmed text of every element matching `selector`
pub fn select_texts(document: &Html, selector: &str) -> Result<Vec<String>, String> {
    let selector =
        Selector::parse(selector).map_err(|e| format!("invalid selector: {}", e))?;

    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect())
}

/// Collapses runs of whitespace into single spaces and trims the result
///
/// Offered to custom extractors that want normalized text.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
