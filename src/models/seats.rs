//! Seat counts extracted from a section detail page.

use serde::{Deserialize, Serialize};

/// Labels of the seat counts, in the order they appear on a section page.
pub const SEAT_LABELS: [&str; 4] = [
    "Total Seats Remaining",
    "Currently Registered",
    "General Seats Remaining",
    "Restricted Seats Remaining",
];

/// Seat counts for one section.
///
/// A field is `None` when the page did not carry that count; it is never
/// filled in as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    #[serde(
        rename = "Total Seats Remaining",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_remaining: Option<u32>,

    #[serde(
        rename = "Currently Registered",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub registered: Option<u32>,

    #[serde(
        rename = "General Seats Remaining",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub general_remaining: Option<u32>,

    #[serde(
        rename = "Restricted Seats Remaining",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub restricted_remaining: Option<u32>,
}

impl SeatSnapshot {
    /// Zip counts against [`SEAT_LABELS`]; anything past the fourth is ignored.
    pub fn from_counts(counts: impl IntoIterator<Item = u32>) -> Self {
        let mut snapshot = Self::default();
        let slots = [
            &mut snapshot.total_remaining,
            &mut snapshot.registered,
            &mut snapshot.general_remaining,
            &mut snapshot.restricted_remaining,
        ];
        for (slot, count) in slots.into_iter().zip(counts) {
            *slot = Some(count);
        }
        snapshot
    }

    /// Number of labels present on the source page.
    pub fn field_count(&self) -> usize {
        [
            self.total_remaining,
            self.registered,
            self.general_remaining,
            self.restricted_remaining,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }

    /// Whether a general seat is open.
    pub fn has_general_seats(&self) -> bool {
        self.general_remaining.is_some_and(|n| n > 0)
    }
}
