//! Persistence of the cache snapshot and the announced-event ledger.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml       # Configuration
//! ├── cache.json        # Last normalized snapshot
//! └── announced.json    # Announced-event ledger
//! ```

pub mod local;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Event, Ledger};

pub use local::LocalStorage;

/// Snapshot file name inside the storage directory.
pub const SNAPSHOT_FILE: &str = "cache.json";

/// Ledger file name inside the storage directory.
pub const LEDGER_FILE: &str = "announced.json";

/// The last known full set of normalized events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    /// When the snapshot was taken (RFC 3339, UTC)
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,

    #[serde(rename = "tour_dates")]
    pub events: Vec<Event>,
}

impl Snapshot {
    pub fn new(events: Vec<Event>, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            events,
        }
    }

    /// Events in display order (start date, then venue).
    pub fn sorted(&self) -> Vec<Event> {
        let mut events = self.events.clone();
        events.sort_by(Event::display_cmp);
        events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Whether `snapshot` is still within `ttl` at `now`.
///
/// A snapshot stamped in the future counts as fresh.
pub fn is_fresh(snapshot: &Snapshot, now: DateTime<Utc>, ttl: Duration) -> bool {
    match (now - snapshot.captured_at).to_std() {
        Ok(age) => age <= ttl,
        Err(_) => true,
    }
}

/// Trait for snapshot and ledger backends.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Overwrite the snapshot with `events`.
    async fn save_snapshot(&self, events: &[Event], now: DateTime<Utc>) -> Result<()>;

    /// Load the snapshot. Missing or unreadable data yields `None`.
    async fn load_snapshot(&self) -> Option<Snapshot>;

    /// Load the ledger. A missing file yields an empty ledger; unreadable or
    /// corrupt data is an error so announced events are never forgotten.
    async fn load_ledger(&self) -> Result<Ledger>;

    /// Overwrite the ledger.
    async fn save_ledger(&self, ledger: &Ledger) -> Result<()>;
}
