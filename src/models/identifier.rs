// src/models/identifier.rs

//! Course-schedule identifiers and the scope hierarchy they describe.

use std::fmt;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Registration session a request is made against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Session {
    /// Session term code (e.g., "W" for winter, "S" for summer)
    pub term: String,

    /// Session year (e.g., "2024")
    pub year: String,

    /// Campus code (e.g., "UBC")
    pub campus: String,
}

impl Session {
    pub fn new(
        term: impl Into<String>,
        year: impl Into<String>,
        campus: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            year: year.into(),
            campus: campus.into(),
        }
    }

    /// Winter session of the current calendar year on the main campus.
    pub fn current() -> Self {
        Self::new("W", Local::now().year().to_string(), "UBC")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::current()
    }
}

/// Granularity of an identifier, from the whole catalog down to one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    AllDepartments,
    Department,
    Course,
    Section,
}

impl Scope {
    /// The next finer scope, or `None` for a section (leaf).
    pub fn child(self) -> Option<Scope> {
        match self {
            Scope::AllDepartments => Some(Scope::Department),
            Scope::Department => Some(Scope::Course),
            Scope::Course => Some(Scope::Section),
            Scope::Section => None,
        }
    }

    /// Number of expansion steps left before reaching a section.
    pub fn levels_to_leaf(self) -> usize {
        match self {
            Scope::AllDepartments => 3,
            Scope::Department => 2,
            Scope::Course => 1,
            Scope::Section => 0,
        }
    }

    /// Page template name used by the course-schedule site.
    pub fn template_name(self) -> &'static str {
        match self {
            Scope::AllDepartments => "subj-all-departments",
            Scope::Department => "subj-department",
            Scope::Course => "subj-course",
            Scope::Section => "subj-section",
        }
    }
}

/// A (possibly partial) reference to a department, course, or section.
///
/// Fields are private so that a section can never exist without a course,
/// and a course never without a department.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    session: Session,
    dept: Option<String>,
    course: Option<String>,
    section: Option<String>,
}

impl Identifier {
    /// The whole catalog (all departments).
    pub fn catalog(session: Session) -> Self {
        Self {
            session,
            dept: None,
            course: None,
            section: None,
        }
    }

    pub fn department(session: Session, dept: impl Into<String>) -> Self {
        Self {
            dept: Some(dept.into()),
            ..Self::catalog(session)
        }
    }

    pub fn new_course(session: Session, dept: impl Into<String>, course: impl Into<String>) -> Self {
        Self {
            course: Some(course.into()),
            ..Self::department(session, dept)
        }
    }

    pub fn new_section(
        session: Session,
        dept: impl Into<String>,
        course: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            section: Some(section.into()),
            ..Self::new_course(session, dept, course)
        }
    }

    /// Parse a free-form scope string such as `"CPSC"`, `"CPSC 110"` or
    /// `"CPSC 110 101"`.
    pub fn parse(session: Session, input: &str) -> Result<Self> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        match tokens.as_slice() {
            [dept] => Ok(Self::department(session, *dept)),
            [dept, course] => Ok(Self::new_course(session, *dept, *course)),
            [dept, course, section] => Ok(Self::new_section(session, *dept, *course, *section)),
            _ => Err(AppError::invalid_identifier(
                input,
                format!("expected 1 to 3 tokens, found {}", tokens.len()),
            )),
        }
    }

    /// Assemble an identifier from optional fields, rejecting a section
    /// without a course or a course without a department.
    pub fn from_parts(
        session: Session,
        dept: Option<String>,
        course: Option<String>,
        section: Option<String>,
    ) -> Result<Self> {
        match (dept, course, section) {
            (None, None, None) => Ok(Self::catalog(session)),
            (Some(d), None, None) => Ok(Self::department(session, d)),
            (Some(d), Some(c), None) => Ok(Self::new_course(session, d, c)),
            (Some(d), Some(c), Some(s)) => Ok(Self::new_section(session, d, c, s)),
            (d, c, s) => Err(AppError::invalid_identifier(
                format!("{:?} {:?} {:?}", d, c, s),
                "section requires course and course requires department",
            )),
        }
    }

    pub fn scope(&self) -> Scope {
        if self.section.is_some() {
            Scope::Section
        } else if self.course.is_some() {
            Scope::Course
        } else if self.dept.is_some() {
            Scope::Department
        } else {
            Scope::AllDepartments
        }
    }

    /// Identifier one level down, named by `token`. Sections have no children.
    pub fn child(&self, token: impl Into<String>) -> Option<Self> {
        let mut child = self.clone();
        let token = Some(token.into());
        match self.scope() {
            Scope::AllDepartments => child.dept = token,
            Scope::Department => child.course = token,
            Scope::Course => child.section = token,
            Scope::Section => return None,
        }
        Some(child)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dept(&self) -> Option<&str> {
        self.dept.as_deref()
    }

    pub fn course(&self) -> Option<&str> {
        self.course.as_deref()
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = [self.dept(), self.course(), self.section()]
            .into_iter()
            .flatten()
            .collect();
        if tokens.is_empty() {
            write!(f, "<all departments>")
        } else {
            write!(f, "{}", tokens.join(" "))
        }
    }
}
