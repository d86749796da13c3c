//! Output timeline.
//!
//! Entries carry a monotone insertion sequence so that sorting by
//! `(timestamp, sequence)` keeps arrival order for equal timestamps.

use serde::{Deserialize, Serialize};

use lectern_core::{CanonicalEvent, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Output (job-relative) time.
    pub timestamp: Timestamp,
    pub sequence: u64,
    pub event: CanonicalEvent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    next_sequence: u64,
    sorted: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_sequence: 0, sorted: true }
    }

    /// Append an event, assigning the next insertion sequence.
    pub fn push(&mut self, timestamp: Timestamp, event: CanonicalEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.entries.last().is_some_and(|last| last.timestamp > timestamp) {
            self.sorted = false;
        }
        self.entries.push(TimelineEntry { timestamp, sequence, event });
        sequence
    }

    /// Append entries of another timeline, renumbering their sequences
    /// after this timeline's.
    pub fn extend(&mut self, other: Timeline) {
        for entry in other.into_sorted() {
            self.push(entry.timestamp, entry.event);
        }
    }

    /// Stable sort by `(timestamp, sequence)`. Idempotent.
    pub fn sort(&mut self) {
        if !self.sorted {
            self.entries.sort_by_key(|e| (e.timestamp, e.sequence));
            self.sorted = true;
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn into_sorted(mut self) -> Vec<TimelineEntry> {
        self.sort();
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{NavigationUpdate, SlideKey};
    use uuid::Uuid;

    fn nav(index: u32) -> CanonicalEvent {
        CanonicalEvent::NavigationUpdate(NavigationUpdate::to(SlideKey::indexed(Uuid::nil(), index)))
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let mut t = Timeline::new();
        t.push(Timestamp(50), nav(9));
        t.push(Timestamp(10), nav(0));
        t.push(Timestamp(10), nav(1));
        t.push(Timestamp(10), nav(2));
        let order: Vec<_> = t.into_sorted().iter().map(|e| e.event.clone()).collect();
        assert_eq!(order, vec![nav(0), nav(1), nav(2), nav(9)]);
    }

    #[test]
    fn test_sequences_are_monotone() {
        let mut t = Timeline::new();
        assert_eq!(t.push(Timestamp(1), nav(0)), 0);
        assert_eq!(t.push(Timestamp(1), nav(0)), 1);
        let mut other = Timeline::new();
        other.push(Timestamp(0), nav(3));
        t.extend(other);
        assert_eq!(t.entries()[2].sequence, 2);
        t.sort();
        assert_eq!(t.entries()[0].event, nav(3));
    }
}
