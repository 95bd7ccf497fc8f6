// src/utils/url.rs

//! Request URL and child-link pattern construction.

use regex::Regex;
use url::{Url, form_urlencoded};

use crate::error::{AppError, Result};
use crate::models::{Identifier, Session};

/// Fixed `pname` query value of every course-schedule page.
const PAGE_NAME: &str = "subjarea";

/// Builds canonical request URLs and link-match patterns for identifiers.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: Url,
}

impl UrlBuilder {
    /// Create a builder for the given course-schedule endpoint.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        base.set_query(None);
        base.set_fragment(None);
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Absolute request URL for an identifier.
    ///
    /// Session fields are always present; department, course and section are
    /// added only when set, in that order.
    ///
    /// # Examples
    /// ```
    /// use seat_crawler::models::{Identifier, Session};
    /// use seat_crawler::utils::url::UrlBuilder;
    ///
    /// let builder = UrlBuilder::new("https://courses.students.ubc.ca/cs/courseschedule").unwrap();
    /// let id = Identifier::new_course(Session::new("W", "2024", "UBC"), "CPSC", "110");
    /// assert_eq!(
    ///     builder.url_for(&id),
    ///     "https://courses.students.ubc.ca/cs/courseschedule?pname=subjarea&tname=subj-course\
    ///      &sesscd=W&sessyr=2024&campuscd=UBC&dept=CPSC&course=110"
    /// );
    /// ```
    pub fn url_for(&self, id: &Identifier) -> String {
        let mut url = self.base.clone();
        {
            let session = id.session();
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pname", PAGE_NAME)
                .append_pair("tname", id.scope().template_name())
                .append_pair("sesscd", &session.term)
                .append_pair("sessyr", &session.year)
                .append_pair("campuscd", &session.campus);
            for (key, value) in scope_fields(id) {
                query.append_pair(key, value);
            }
        }
        url.to_string()
    }

    /// Regex source matching links to the children of `id` on its index page.
    ///
    /// The path signature comes first, then one `field=value` constraint per
    /// set field, with anything allowed in between.
    pub fn link_pattern(&self, id: &Identifier) -> String {
        let signature = format!("{}?pname={}", self.base.path(), PAGE_NAME);
        let mut parts = vec![regex::escape(&signature)];
        for (key, value) in scope_fields(id) {
            let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
            parts.push(format!("{}(?:&|$)", regex::escape(&format!("{key}={encoded}"))));
        }
        parts.join(".*")
    }

    /// Compiled form of [`UrlBuilder::link_pattern`].
    pub fn link_regex(&self, id: &Identifier) -> Result<Regex> {
        let pattern = self.link_pattern(id);
        Regex::new(&pattern)
            .map_err(|e| AppError::config(format!("Invalid link pattern '{pattern}': {e}")))
    }

    /// Resolve a possibly relative link against the endpoint.
    pub fn resolve(&self, href: &str) -> Result<Url> {
        Ok(self.base.join(href)?)
    }

    /// Read an identifier back out of a request URL or page link.
    ///
    /// Session fields missing from the query fall back to `fallback`.
    pub fn identifier_from_url(&self, href: &str, fallback: &Session) -> Result<Identifier> {
        let url = self.resolve(href)?;
        let mut session = fallback.clone();
        let (mut dept, mut course, mut section) = (None, None, None);

        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            let value = value.into_owned();
            match key.as_ref() {
                "sesscd" => session.term = value,
                "sessyr" => session.year = value,
                "campuscd" => session.campus = value,
                "dept" => dept = Some(value),
                "course" => course = Some(value),
                "section" => section = Some(value),
                _ => {}
            }
        }

        Identifier::from_parts(session, dept, course, section)
            .map_err(|_| AppError::invalid_identifier(href, "link fields skip a scope level"))
    }
}

/// Set scope fields of an identifier, coarsest first.
fn scope_fields(id: &Identifier) -> Vec<(&'static str, &str)> {
    [
        ("dept", id.dept()),
        ("course", id.course()),
        ("section", id.section()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)))
    .collect()
}
