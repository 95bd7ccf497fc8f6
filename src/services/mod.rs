//! Service layer for the seat crawler.
//!
//! This module contains the business logic for:
//! - Page parsing (`PageParser`)
//! - Scope expansion (`Expander`)

mod expander;
mod parser;

pub use expander::Expander;
pub use parser::PageParser;
