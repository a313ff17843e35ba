//! Canonical tour event and its identity.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::utils::collapse_whitespace;

/// Display value used when a record carries no location.
pub const LOCATION_PLACEHOLDER: &str = "Location TBA";

/// Placeholder spellings seen on listing pages, compared case-insensitively.
const PLACEHOLDERS: [&str; 5] = ["location tba", "tba", "tbd", "tbc", "to be announced"];

/// Deterministic key used for deduplication and change detection.
///
/// Built only through [`Identity::of`], which canonicalizes its inputs
/// (trim, collapse whitespace, lowercase) so that logically identical events
/// always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Compute the identity of an event from its identity fields.
    pub fn of(start_date: NaiveDate, venue: &str, location: &str) -> Self {
        let composite = format!(
            "{}|{}|{}",
            start_date.format("%Y-%m-%d"),
            canonical_key_part(venue),
            canonical_key_part(location)
        );
        let digest = Sha256::digest(composite.as_bytes());
        Self(hex::encode(&digest[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical_key_part(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Whether a venue/location value is a stand-in rather than real data.
pub fn is_placeholder(text: &str) -> bool {
    let key = canonical_key_part(text);
    key.is_empty() || PLACEHOLDERS.contains(&key.as_str())
}

/// A labelled ticket URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketLink {
    pub label: String,
    pub url: String,
}

impl TicketLink {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// One canonical tour date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub venue: String,
    pub location: String,
    #[serde(default)]
    pub ticket_links: Vec<TicketLink>,
    #[serde(default)]
    pub additional_info: String,
}

impl Event {
    /// Build an event, collapsing whitespace in its display fields.
    ///
    /// Fails if `venue` is blank or `start_date > end_date`. A blank or
    /// placeholder location ("TBA", "TBD", ...) becomes
    /// [`LOCATION_PLACEHOLDER`], so all spellings share one identity.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        venue: &str,
        location: &str,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(AppError::validation(format!(
                "event starts {start_date} after it ends {end_date}"
            )));
        }

        let venue = collapse_whitespace(venue);
        if venue.is_empty() {
            return Err(AppError::PartialRecord { field: "venue" });
        }

        let location = collapse_whitespace(location);
        let location = if is_placeholder(&location) {
            LOCATION_PLACEHOLDER.to_string()
        } else {
            location
        };

        Ok(Self {
            start_date,
            end_date,
            venue,
            location,
            ticket_links: Vec::new(),
            additional_info: String::new(),
        })
    }

    pub fn with_ticket_links(mut self, links: Vec<TicketLink>) -> Self {
        self.ticket_links = Vec::new();
        for link in links {
            self.push_link(link);
        }
        self
    }

    pub fn with_info(mut self, info: &str) -> Self {
        self.additional_info = collapse_whitespace(info);
        self
    }

    /// Identity key of this event.
    pub fn identity(&self) -> Identity {
        Identity::of(self.start_date, &self.venue, &self.location)
    }

    pub fn is_multi_day(&self) -> bool {
        self.end_date > self.start_date
    }

    /// Digest over the non-identity fields, used to notice edits to an
    /// already announced event.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.end_date.format("%Y-%m-%d").to_string().as_bytes());
        for link in &self.ticket_links {
            hasher.update(b"\x1f");
            hasher.update(link.label.as_bytes());
            hasher.update(b"=");
            hasher.update(link.url.as_bytes());
        }
        hasher.update(b"\x1e");
        hasher.update(self.additional_info.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }

    /// Combine two records that share an identity, keeping the most complete
    /// value of every non-identity field.
    pub fn merge(mut self, incoming: Event) -> Event {
        if incoming.end_date > self.end_date {
            self.end_date = incoming.end_date;
        }
        for link in incoming.ticket_links {
            self.push_link(link);
        }
        if incoming.additional_info.chars().count() > self.additional_info.chars().count() {
            self.additional_info = incoming.additional_info;
        }
        self
    }

    /// Display ordering: start date, then venue.
    pub fn display_cmp(&self, other: &Event) -> std::cmp::Ordering {
        self.start_date
            .cmp(&other.start_date)
            .then_with(|| self.venue.to_lowercase().cmp(&other.venue.to_lowercase()))
    }

    fn push_link(&mut self, link: TicketLink) {
        if link.url.trim().is_empty() {
            return;
        }
        if !self.ticket_links.iter().any(|l| l.url == link.url) {
            self.ticket_links.push(link);
        }
    }
}
