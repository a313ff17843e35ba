//! Raw record validation, normalization and deduplication.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Event, Identity, RawEvent};
use crate::pipeline::dates;

/// A raw record that did not make it into the normalized set.
#[derive(Debug)]
pub struct Skipped {
    pub index: usize,
    pub record: RawEvent,
    pub reason: AppError,
}

/// Outcome of a normalization pass.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Deduplicated events in display order
    pub events: Vec<Event>,
    pub skipped: Vec<Skipped>,
    /// Records folded into an earlier record with the same identity
    pub merged: usize,
}

/// Validate one raw record and convert it to a canonical event.
pub fn normalize_record(raw: &RawEvent) -> Result<Event> {
    let date = raw.required_date()?;
    let venue = raw.required_venue()?;
    let location = raw.required_location()?;

    let (start, end) = dates::normalize(date)?;

    Ok(Event::new(start, end, venue, location)?
        .with_ticket_links(raw.links())
        .with_info(&raw.info()))
}

/// Normalize a batch, skipping bad records and merging duplicates.
///
/// Bad records never abort the batch; each is logged and reported in
/// [`Normalized::skipped`].
pub fn normalize_batch(raw: &[RawEvent]) -> Normalized {
    let mut outcome = Normalized::default();
    let mut slots: HashMap<Identity, usize> = HashMap::new();
    let mut events: Vec<Event> = Vec::new();

    for (index, record) in raw.iter().enumerate() {
        match normalize_record(record) {
            Ok(event) => match slots.get(&event.identity()) {
                Some(&slot) => {
                    let existing = events[slot].clone();
                    events[slot] = existing.merge(event);
                    outcome.merged += 1;
                }
                None => {
                    slots.insert(event.identity(), events.len());
                    events.push(event);
                }
            },
            Err(reason) => {
                log::warn!("Skipping record #{}: {}", index, reason);
                outcome.skipped.push(Skipped {
                    index,
                    record: record.clone(),
                    reason,
                });
            }
        }
    }

    events.sort_by(Event::display_cmp);
    outcome.events = events;
    outcome
}

/// Merge several normalized lists into one, deduplicated by identity.
pub fn merge_events(lists: impl IntoIterator<Item = Vec<Event>>) -> Vec<Event> {
    let mut slots: HashMap<Identity, usize> = HashMap::new();
    let mut events: Vec<Event> = Vec::new();

    for event in lists.into_iter().flatten() {
        let id = event.identity();
        match slots.get(&id) {
            Some(&slot) => {
                let existing = events[slot].clone();
                events[slot] = existing.merge(event);
            }
            None => {
                slots.insert(id, events.len());
                events.push(event);
            }
        }
    }

    events.sort_by(Event::display_cmp);
    events
}
