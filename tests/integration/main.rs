//! Integration tests for the scraping pipeline
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! public API end-to-end, from TOML configuration to saved output files.

mod common;
mod pipeline_tests;
mod scraper_tests;
