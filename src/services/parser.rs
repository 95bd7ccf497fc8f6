// src/services/parser.rs

//! Course-schedule page parser.
//!
//! Index pages yield child links matching a pattern; section pages yield
//! seat counts read from emphasized numeric text.

use std::collections::BTreeSet;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ParserConfig, SeatSnapshot, SectionKey};

/// Parser for index and section pages.
#[derive(Debug, Clone)]
pub struct PageParser {
    anchor: Selector,
    seat: Selector,
    sentinel: String,
}

impl PageParser {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            anchor: Self::parse_selector("a[href]")?,
            seat: Self::parse_selector(&config.seat_selector)?,
            sentinel: config.not_offered_sentinel.clone(),
        })
    }

    /// Whether the page says its course or department is not offered.
    pub fn is_not_offered(&self, document: &Html) -> bool {
        let text: String = document.root_element().text().collect();
        text.contains(&self.sentinel)
    }

    /// Targets of anchors whose `href` matches `pattern`.
    ///
    /// Empty when nothing matches or the page is a not-offered notice; callers
    /// treat empty as "no children at this scope".
    pub fn extract_links(&self, document: &Html, pattern: &Regex) -> BTreeSet<String> {
        if self.is_not_offered(document) {
            return BTreeSet::new();
        }

        document
            .select(&self.anchor)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| pattern.is_match(href))
            .map(str::to_string)
            .collect()
    }

    /// Seat counts of a section page requested from `request_url`.
    ///
    /// The first four emphasized nodes that parse as integers are zipped
    /// against the seat labels in order; other emphasized text is skipped.
    /// Fewer than four numbers leave the remaining fields unset.
    pub fn extract_seat_snapshot(
        &self,
        document: &Html,
        request_url: &str,
    ) -> Result<(SectionKey, SeatSnapshot)> {
        let key = Self::section_key(request_url)?;
        let counts = document
            .select(&self.seat)
            .filter_map(|node| node.text().collect::<String>().trim().parse::<u32>().ok());
        Ok((key, SeatSnapshot::from_counts(counts)))
    }

    fn section_key(request_url: &str) -> Result<SectionKey> {
        let url = Url::parse(request_url)?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.into_owned())
                .ok_or_else(|| {
                    AppError::invalid_identifier(request_url, format!("missing '{name}' parameter"))
                })
        };
        Ok(SectionKey {
            dept: param("dept")?,
            course: param("course")?,
            section: param("section")?,
        })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s)
            .map_err(|e| AppError::config(format!("Invalid selector '{s}': {e:?}")))
    }
}
