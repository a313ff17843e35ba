//! Change detection.
//!
//! Computes which events are new relative to a previous snapshot or to the
//! announced-event ledger. Everything here is pure: persistence of the
//! previous state happens around these calls, never inside them.

use std::collections::HashSet;

use crate::models::{Event, Identity, Ledger};

/// Events whose identity does not appear in `previous`, in the order they
/// appear in `current`.
pub fn new_events(current: &[Event], previous: &[Event]) -> Vec<Event> {
    let known: HashSet<Identity> = previous.iter().map(Event::identity).collect();
    let mut seen = HashSet::new();

    current
        .iter()
        .filter(|e| {
            let id = e.identity();
            !known.contains(&id) && seen.insert(id)
        })
        .cloned()
        .collect()
}

/// Identity-level comparison of two snapshots, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<Identity>,
    pub removed: Vec<Identity>,
}

impl SnapshotDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Compare a previous snapshot with the current one. Removals are reported
/// for logging only and never announced.
pub fn snapshot_diff(previous: &[Event], current: &[Event]) -> SnapshotDiff {
    let added = new_events(current, previous)
        .iter()
        .map(Event::identity)
        .collect();
    let removed = new_events(previous, current)
        .iter()
        .map(Event::identity)
        .collect();
    SnapshotDiff { added, removed }
}

/// Events to announce.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// Never announced before
    pub added: Vec<Event>,
    /// Announced before, but links or info changed since
    pub updated: Vec<Event>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len()
    }
}

/// Calculator for the announcement delta against the ledger.
#[derive(Debug, Clone)]
pub struct DiffCalculator {
    /// Whether to report edits to announced events
    detect_updates: bool,
}

impl DiffCalculator {
    /// Create a calculator that also reports updated events.
    pub fn new() -> Self {
        Self {
            detect_updates: true,
        }
    }

    /// Create a calculator that only reports never-announced events.
    pub fn additions_only() -> Self {
        Self {
            detect_updates: false,
        }
    }

    pub fn with_updates(detect_updates: bool) -> Self {
        Self { detect_updates }
    }

    /// Split `current` into new and (optionally) updated events.
    pub fn calculate(&self, current: &[Event], ledger: &Ledger) -> Delta {
        let mut delta = Delta::default();
        let mut seen = HashSet::new();

        for event in current {
            let id = event.identity();
            if !seen.insert(id.clone()) {
                continue;
            }
            match ledger.get(&id) {
                None => delta.added.push(event.clone()),
                Some(entry) if self.detect_updates && entry.fingerprint != event.fingerprint() => {
                    delta.updated.push(event.clone())
                }
                Some(_) => {}
            }
        }

        delta
    }
}

impl Default for DiffCalculator {
    fn default() -> Self {
        Self::additions_only()
    }
}
