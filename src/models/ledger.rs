//! Record of events already surfaced to the notifier.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, Identity};

/// Minimal stub persisted for each announced event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: Identity,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub venue: String,
    /// Digest of ticket links and info at announcement time
    #[serde(default)]
    pub fingerprint: String,
    pub announced_at: DateTime<Utc>,
}

/// Append-only set of announced identities.
///
/// Entries are only ever added by [`Ledger::record`]; [`Ledger::prune`] is the
/// single, explicit retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<Identity, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Identity) -> Option<&LedgerEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Mark an event as announced. Re-recording refreshes the stored
    /// fingerprint and end date but keeps the first announcement time.
    pub fn record(&mut self, event: &Event, now: DateTime<Utc>) {
        let id = event.identity();
        let fingerprint = event.fingerprint();
        self.entries
            .entry(id.clone())
            .and_modify(|entry| {
                entry.end_date = event.end_date;
                entry.fingerprint = fingerprint.clone();
            })
            .or_insert_with(|| LedgerEntry {
                id,
                start_date: event.start_date,
                end_date: event.end_date,
                venue: event.venue.clone(),
                fingerprint,
                announced_at: now,
            });
    }

    /// Drop entries for events that ended before `cutoff`. Returns how many
    /// entries were removed.
    pub fn prune(&mut self, cutoff: NaiveDate) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.end_date >= cutoff);
        before - self.entries.len()
    }

    pub fn to_entries(&self) -> Vec<LedgerEntry> {
        self.entries.values().cloned().collect()
    }
}
