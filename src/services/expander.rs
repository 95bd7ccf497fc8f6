// src/services/expander.rs

//! Hierarchical scope expander.
//!
//! Moves strictly down the department -> course -> section hierarchy: a
//! department or course scope is expanded one level by fetching its index
//! page, and a section scope resolves directly to its seat counts.

use std::collections::BTreeSet;

use scraper::Html;

use crate::error::{AppError, Result};
use crate::models::{CatalogNode, Config, Identifier, Scope, Session};
use crate::services::PageParser;
use crate::utils::http::{BlockingFetcher, Fetcher};
use crate::utils::url::UrlBuilder;

/// Resolves identifiers into child tokens or seat counts.
#[derive(Debug, Clone)]
pub struct Expander {
    urls: UrlBuilder,
    parser: PageParser,
}

impl Expander {
    pub fn new(urls: UrlBuilder, parser: PageParser) -> Self {
        Self { urls, parser }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            UrlBuilder::new(&config.crawler.base_url)?,
            PageParser::new(&config.parser)?,
        ))
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Fetch and interpret the page for `id`.
    pub async fn expand(&self, fetcher: &Fetcher, id: &Identifier) -> Result<CatalogNode> {
        let url = self.urls.url_for(id);
        let body = fetcher.fetch(&url).await?;
        self.interpret(id, &url, &body)
    }

    /// Blocking variant of [`Expander::expand`].
    pub fn expand_blocking(&self, fetcher: &BlockingFetcher, id: &Identifier) -> Result<CatalogNode> {
        let url = self.urls.url_for(id);
        let body = fetcher.fetch(&url)?;
        self.interpret(id, &url, &body)
    }

    /// Department tokens listed on the all-departments page.
    pub async fn list_departments(&self, fetcher: &Fetcher, session: &Session) -> Result<Vec<String>> {
        let root = Identifier::catalog(session.clone());
        let departments = self.expand(fetcher, &root).await?.children().to_vec();
        log::info!("Found {} departments", departments.len());
        Ok(departments)
    }

    /// Interpret a fetched page for `id` without touching the network.
    pub fn interpret(&self, id: &Identifier, url: &str, body: &str) -> Result<CatalogNode> {
        let document = Html::parse_document(body);
        if id.scope() == Scope::Section {
            let (key, seats) = self.parser.extract_seat_snapshot(&document, url)?;
            return Ok(CatalogNode::Seats(key, seats));
        }

        let links = self.parser.extract_links(&document, &self.urls.link_regex(id)?);
        if links.is_empty() {
            if id.scope() == Scope::AllDepartments && !self.parser.is_not_offered(&document) {
                return Err(AppError::unexpected_page(
                    url,
                    "no departments listed (request rejected?)",
                ));
            }
            log::info!("Course / department not offered this term: {}", id);
            return Ok(CatalogNode::Children(Vec::new()));
        }

        let tokens = self.child_tokens(id, &links);
        log::debug!("{} expanded into {} children", id, tokens.len());
        Ok(CatalogNode::Children(tokens))
    }

    /// Tokens of links that sit exactly one level below `parent`.
    fn child_tokens(&self, parent: &Identifier, links: &BTreeSet<String>) -> Vec<String> {
        let Some(child_scope) = parent.scope().child() else {
            return Vec::new();
        };

        let mut tokens = BTreeSet::new();
        for link in links {
            let child = match self.urls.identifier_from_url(link, parent.session()) {
                Ok(child) if child.scope() == child_scope => child,
                Ok(_) => continue,
                Err(e) => {
                    log::debug!("Skipping link {}: {}", link, e);
                    continue;
                }
            };
            let token = match child_scope {
                Scope::Department => child.dept(),
                Scope::Course => child.course(),
                Scope::Section => child.section(),
                Scope::AllDepartments => None,
            };
            if let Some(token) = token {
                tokens.insert(token.to_string());
            }
        }
        tokens.into_iter().collect()
    }
}
