// src/models/mod.rs

//! Domain models for the tour watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod event;
mod ledger;
mod raw;

// Re-export all public types
pub use config::{
    ActiveHours, AnnounceConfig, CachePolicy, CircuitBreakerConfig, Config, FormatConfig, GroupBy,
    HttpConfig, LedgerConfig, ListingSelectors, NotifierConfig, NotifierKind, RetryConfig,
    SourceConfig,
};
pub use event::{Event, Identity, LOCATION_PLACEHOLDER, TicketLink, is_placeholder};
pub use ledger::{Ledger, LedgerEntry};
pub use raw::{DEFAULT_TICKET_LABEL, RawEvent, RawLink, RawLinks, TextOrList};
