//! Catalog expansion results.

use std::collections::BTreeMap;
use std::fmt;

use crate::models::SeatSnapshot;

/// Stored course tree: department -> course -> section tokens.
pub type Catalog = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Department, course and section of a section page, taken verbatim from
/// the request URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionKey {
    pub dept: String,
    pub course: String,
    pub section: String,
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.dept, self.course, self.section)
    }
}

/// Outcome of expanding one scope by one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogNode {
    /// Tokens of the next level down (departments, courses, or sections).
    /// Empty when nothing is offered at this scope.
    Children(Vec<String>),

    /// A section scope resolves straight to its seat counts.
    Seats(SectionKey, SeatSnapshot),
}

impl CatalogNode {
    pub fn children(&self) -> &[String] {
        match self {
            CatalogNode::Children(tokens) => tokens,
            CatalogNode::Seats(..) => &[],
        }
    }
}
