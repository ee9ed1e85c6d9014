//! Extracted records
//!
//! A [`Record`] is one persistence-ready unit of output: the fields produced
//! by a selector map plus the bookkeeping fields `source_url`, `scraped_at`
//! and, for paginated scrapes, `page_number`.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from field name to CSS selector expression
pub type SelectorMap = BTreeMap<String, String>;

/// Key holding the URL a record was extracted from
pub const SOURCE_URL: &str = "source_url";

/// Key holding the extraction timestamp
pub const SCRAPED_AT: &str = "scraped_at";

/// Key holding the 1-based page index of a paginated scrape
pub const PAGE_NUMBER: &str = "page_number";

/// Key holding the failure description of a degraded record
pub const ERROR: &str = "error";

/// Field names a selector map may not use
pub const RESERVED_FIELDS: [&str; 4] = [SOURCE_URL, SCRAPED_AT, PAGE_NUMBER, ERROR];

/// Format used when a timestamp is rendered as text
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value of one extracted field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The selector matched nothing, or extraction failed for this field
    Null,
    /// The selector matched exactly one element
    Text(String),
    /// The selector matched several elements, in document order
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Flattens the value into a single cell, joining lists with `"; "`
    pub fn to_cell(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join("; "),
        }
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(mut texts: Vec<String>) -> Self {
        match texts.len() {
            0 => Self::Null,
            1 => Self::Text(texts.remove(0)),
            _ => Self::List(texts),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

/// One extracted record
///
/// Records are immutable once produced. A well-formed record always carries
/// every key of the selector map it was produced from; a degraded record
/// (markup could not be parsed) carries only `source_url` and `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    source_url: String,
    scraped_at: Option<DateTime<Utc>>,
    page_number: Option<u32>,
    fields: BTreeMap<String, FieldValue>,
    error: Option<String>,
}

impl Record {
    /// Creates a record from extracted fields, stamped with the current time
    pub fn extracted(source_url: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            source_url: source_url.into(),
            scraped_at: Some(Utc::now()),
            page_number: None,
            fields,
            error: None,
        }
    }

    /// Creates a degraded record describing why extraction was impossible
    pub fn failed(source_url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            scraped_at: None,
            page_number: None,
            fields: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    /// Returns this record annotated with its 1-based page number
    pub fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn scraped_at(&self) -> Option<DateTime<Utc>> {
        self.scraped_at
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the value of an extracted field
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Returns the extracted fields, without bookkeeping keys
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Returns the full key set of the record, bookkeeping keys included
    pub fn keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self.fields.keys().cloned().collect();
        keys.insert(SOURCE_URL.to_string());
        if self.scraped_at.is_some() {
            keys.insert(SCRAPED_AT.to_string());
        }
        if self.page_number.is_some() {
            keys.insert(PAGE_NUMBER.to_string());
        }
        if self.error.is_some() {
            keys.insert(ERROR.to_string());
        }
        keys
    }

    /// Renders every key of the record as a flat text cell
    pub fn to_cells(&self) -> BTreeMap<String, String> {
        let mut cells: BTreeMap<String, String> = self
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_cell()))
            .collect();
        cells.insert(SOURCE_URL.to_string(), self.source_url.clone());
        if let Some(at) = self.scraped_at {
            cells.insert(SCRAPED_AT.to_string(), at.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(page) = self.page_number {
            cells.insert(PAGE_NUMBER.to_string(), page.to_string());
        }
        if let Some(error) = &self.error {
            cells.insert(ERROR.to_string(), error.clone());
        }
        cells
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(SOURCE_URL, &self.source_url)?;
        if let Some(at) = self.scraped_at {
            map.serialize_entry(SCRAPED_AT, &at.format(TIMESTAMP_FORMAT).to_string())?;
        }
        if let Some(page) = self.page_number {
            map.serialize_entry(PAGE_NUMBER, &page)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry(ERROR, error)?;
        }
        map.end()
    }
}
