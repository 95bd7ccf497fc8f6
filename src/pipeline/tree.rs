// src/pipeline/tree.rs

//! Shared result aggregator.
//!
//! A two-level concurrent map (department -> course -> leaf) that workers
//! merge into while a run is in flight. Read it only after the run completes,
//! via [`ResultTree::into_map`].

use std::collections::BTreeMap;

use dashmap::DashMap;

use crate::models::SeatSnapshot;

/// Seat counts of one course, keyed by section token.
pub type Sections = BTreeMap<String, SeatSnapshot>;

/// Ordered department -> course -> section -> seats map.
pub type Availability = BTreeMap<String, BTreeMap<String, Sections>>;

/// Result tree of an availability run.
pub type AvailabilityTree = ResultTree<Sections>;

/// Result tree of a catalog run; leaves are section token lists.
pub type CatalogTree = ResultTree<Vec<String>>;

/// Concurrent department -> course -> leaf map.
#[derive(Debug)]
pub struct ResultTree<L> {
    departments: DashMap<String, DashMap<String, L>>,
}

impl<L> Default for ResultTree<L> {
    fn default() -> Self {
        Self {
            departments: DashMap::new(),
        }
    }
}

impl<L> ResultTree<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a department node exists, even with no courses.
    pub fn touch_department(&self, dept: &str) {
        if !self.departments.contains_key(dept) {
            self.departments.entry(dept.to_string()).or_default();
        }
    }

    /// Write `leaf` at `dept / course`, creating the department if needed.
    /// A second write to the same course replaces the first.
    pub fn merge(&self, dept: &str, course: &str, leaf: L) {
        if let Some(courses) = self.departments.get(dept) {
            courses.insert(course.to_string(), leaf);
            return;
        }
        self.departments
            .entry(dept.to_string())
            .or_default()
            .insert(course.to_string(), leaf);
    }

    /// Write several courses of one department at once.
    pub fn merge_department(&self, dept: &str, courses: impl IntoIterator<Item = (String, L)>) {
        let entry = self.departments.entry(dept.to_string()).or_default();
        for (course, leaf) in courses {
            entry.insert(course, leaf);
        }
    }

    /// Modify the leaf at `dept / course` in place, starting from the default.
    pub fn update(&self, dept: &str, course: &str, f: impl FnOnce(&mut L))
    where
        L: Default,
    {
        if let Some(courses) = self.departments.get(dept) {
            f(courses.entry(course.to_string()).or_default().value_mut());
            return;
        }
        let courses = self.departments.entry(dept.to_string()).or_default();
        f(courses.entry(course.to_string()).or_default().value_mut());
    }

    pub fn department_count(&self) -> usize {
        self.departments.len()
    }

    pub fn course_count(&self) -> usize {
        self.departments.iter().map(|d| d.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// Ordered snapshot of the finished tree.
    pub fn into_map(self) -> BTreeMap<String, BTreeMap<String, L>> {
        self.departments
            .into_iter()
            .map(|(dept, courses)| (dept, courses.into_iter().collect()))
            .collect()
    }
}

impl ResultTree<Sections> {
    /// Keep only sections with general seats left, dropping courses and
    /// departments that end up empty.
    pub fn only_available(self) -> Self {
        let filtered = Self::new();
        for (dept, courses) in self.departments {
            for (course, sections) in courses {
                let open: Sections = sections
                    .into_iter()
                    .filter(|(_, seats)| seats.has_general_seats())
                    .collect();
                if !open.is_empty() {
                    filtered.merge(&dept, &course, open);
                }
            }
        }
        filtered
    }

    /// Number of sections across all courses.
    pub fn section_count(&self) -> usize {
        self.departments
            .iter()
            .map(|d| d.value().iter().map(|c| c.value().len()).sum::<usize>())
            .sum()
    }
}
