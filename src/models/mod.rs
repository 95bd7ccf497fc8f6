// src/models/mod.rs

//! Domain models for the seat crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod identifier;
mod seats;

// Re-export all public types
pub use catalog::{Catalog, CatalogNode, SectionKey};
pub use config::{Config, CrawlerConfig, ParserConfig, SessionConfig};
pub use identifier::{Identifier, Scope, Session};
pub use seats::{SEAT_LABELS, SeatSnapshot};
