//! Raw event records as handed over by a source adapter.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TicketLink;

/// Label used for ticket URLs that come without one.
pub const DEFAULT_TICKET_LABEL: &str = "Tickets";

static LABELLED_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^:]+?)\s*:\s*(https?://\S+)\s*$").expect("valid labelled link regex")
});

/// A text field that sources emit either as one string or as a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

/// One ticket link as emitted by a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawLink {
    Pair { label: String, url: String },
    Text(String),
}

/// Ticket links field: a `"; "`-joined string or a list of links.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawLinks {
    Text(String),
    List(Vec<RawLink>),
}

/// An unvalidated event record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub venue: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default, alias = "ticketLinks")]
    pub ticket_links: Option<RawLinks>,

    #[serde(default, alias = "additionalInfo")]
    pub additional_info: Option<TextOrList>,
}

impl RawEvent {
    pub fn new(date: &str, venue: &str, location: &str) -> Self {
        Self {
            date: Some(date.to_string()),
            venue: Some(venue.to_string()),
            location: Some(location.to_string()),
            ..Self::default()
        }
    }

    /// Date text, failing when the field is absent or blank.
    pub fn required_date(&self) -> Result<&str> {
        required(&self.date, "date")
    }

    /// Venue text, failing when the field is absent or blank.
    pub fn required_venue(&self) -> Result<&str> {
        required(&self.venue, "venue")
    }

    /// Location text, failing only when the field is absent. A blank value is
    /// accepted and later replaced by the location placeholder.
    pub fn required_location(&self) -> Result<&str> {
        self.location
            .as_deref()
            .ok_or(AppError::PartialRecord { field: "location" })
    }

    /// Ticket links in source order.
    pub fn links(&self) -> Vec<TicketLink> {
        match &self.ticket_links {
            None => Vec::new(),
            Some(RawLinks::Text(text)) => text.split(';').filter_map(parse_link_text).collect(),
            Some(RawLinks::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    RawLink::Pair { label, url } => {
                        let label = if label.trim().is_empty() {
                            DEFAULT_TICKET_LABEL
                        } else {
                            label.trim()
                        };
                        (!url.trim().is_empty()).then(|| TicketLink::new(label, url.trim()))
                    }
                    RawLink::Text(text) => parse_link_text(text),
                })
                .collect(),
        }
    }

    /// Additional info flattened to one line.
    pub fn info(&self) -> String {
        match &self.additional_info {
            None => String::new(),
            Some(TextOrList::Text(text)) => text.trim().to_string(),
            Some(TextOrList::List(items)) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    match value.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AppError::PartialRecord { field }),
    }
}

/// Parse `"Label: https://..."` or a bare URL.
fn parse_link_text(text: &str) -> Option<TicketLink> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = LABELLED_LINK.captures(text) {
        return Some(TicketLink::new(&caps[1], &caps[2]));
    }
    Some(TicketLink::new(DEFAULT_TICKET_LABEL, text))
}
