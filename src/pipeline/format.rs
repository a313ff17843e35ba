//! Message rendering.
//!
//! Renders single events and whole collections into chat-sized chunks. Every
//! chunk produced here is at most `max_chunk_chars` characters long.

use chrono::{Datelike, Month};

use crate::models::{Config, DEFAULT_TICKET_LABEL, Event, FormatConfig, GroupBy};
use crate::pipeline::dates;
use crate::utils::display_width;

const ELLIPSIS: char = '…';
const CONTINUATION_INDENT: &str = "  ";

/// Renders events using the configured bounds.
#[derive(Debug, Clone)]
pub struct Formatter {
    band_name: String,
    config: FormatConfig,
}

impl Formatter {
    pub fn new(band_name: impl Into<String>, config: FormatConfig) -> Self {
        Self {
            band_name: band_name.into(),
            config,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.band_name.clone(), config.format.clone())
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.config.max_chunk_chars
    }

    /// Render one event: date, venue line, then wrapped ticket and info lines.
    pub fn format_event(&self, event: &Event) -> String {
        let mut lines = vec![
            format!("**{}**", dates::display(event.start_date, event.end_date)),
            format!("{} | {}", event.venue, event.location),
        ];

        if !event.ticket_links.is_empty() {
            let items: Vec<String> = event
                .ticket_links
                .iter()
                .map(|l| match l.label.as_str() {
                    DEFAULT_TICKET_LABEL => l.url.clone(),
                    label => format!("{}: {}", label, l.url),
                })
                .collect();
            lines.extend(wrap_items(
                "Tickets: ",
                items.iter().map(String::as_str),
                "; ",
                self.config.wrap_width,
            ));
        }

        if !event.additional_info.is_empty() {
            lines.extend(wrap_items(
                "Info: ",
                event.additional_info.split_whitespace(),
                " ",
                self.config.wrap_width,
            ));
        }

        lines.join("\n")
    }

    /// Message announcing a newly listed show.
    pub fn announcement(&self, event: &Event) -> String {
        let text = format!(
            "**{} announced a new show!**\n\n{}",
            self.band_name,
            self.format_event(event)
        );
        truncate(&text, self.config.max_chunk_chars)
    }

    /// Message announcing changed details of an already announced show.
    pub fn update_announcement(&self, event: &Event) -> String {
        let text = format!(
            "**Updated details for a {} show**\n\n{}",
            self.band_name,
            self.format_event(event)
        );
        truncate(&text, self.config.max_chunk_chars)
    }

    /// Header message preceding a listing.
    pub fn summary_header(&self, count: usize, month: Option<Month>) -> String {
        let scope = month
            .map(|m| format!(" in {}", m.name()))
            .unwrap_or_default();
        let noun = if count == 1 { "show" } else { "shows" };
        format!(
            "**{} Tour Dates**\nFound {} upcoming {}{}:",
            self.band_name, count, noun, scope
        )
    }

    /// Prepare a collection for chunked rendering. Events are sorted by start
    /// date, then venue.
    pub fn format_collection<'a>(&'a self, events: &'a [Event]) -> Collection<'a> {
        let mut sorted: Vec<&Event> = events.iter().collect();
        sorted.sort_by(|a, b| a.display_cmp(b));
        Collection {
            formatter: self,
            events: sorted,
        }
    }

    fn group_key(&self, event: &Event) -> Option<(i32, u32)> {
        match self.config.group_by {
            GroupBy::Month => Some((event.start_date.year(), event.start_date.month())),
            GroupBy::None => None,
        }
    }
}

/// A sorted set of events ready to be chunked.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    formatter: &'a Formatter,
    events: Vec<&'a Event>,
}

impl<'a> Collection<'a> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lazily render message chunks. Each call starts from the beginning.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks {
            formatter: self.formatter,
            events: &self.events,
            pos: 0,
            current_group: None,
        }
    }
}

impl<'c, 'a> IntoIterator for &'c Collection<'a> {
    type Item = String;
    type IntoIter = Chunks<'c>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks()
    }
}

/// Iterator over bounded message chunks.
#[derive(Debug, Clone)]
pub struct Chunks<'c> {
    formatter: &'c Formatter,
    events: &'c [&'c Event],
    pos: usize,
    current_group: Option<(i32, u32)>,
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.pos >= self.events.len() {
            return None;
        }

        let max = self.formatter.config.max_chunk_chars;
        let mut chunk = String::new();
        let mut chunk_len = 0;

        while let Some(event) = self.events.get(self.pos) {
            let group = self.formatter.group_key(event);
            let starts_group = group.is_some() && group != self.current_group;

            // A new group always opens a new chunk.
            if starts_group && chunk_len > 0 {
                break;
            }

            let rendered = self.formatter.format_event(event);
            let block = if starts_group {
                format!(
                    "__**{}**__\n{}",
                    dates::month_label(event.start_date),
                    rendered
                )
            } else {
                rendered
            };
            let block = truncate(&block, max);
            let block_len = block.chars().count();

            let separator = if chunk_len == 0 { "" } else { "\n\n" };
            if chunk_len > 0 && chunk_len + separator.len() + block_len > max {
                break;
            }

            chunk.push_str(separator);
            chunk.push_str(&block);
            chunk_len += separator.len() + block_len;
            self.current_group = group;
            self.pos += 1;
        }

        Some(chunk)
    }
}

/// Keep only events starting in `month`.
pub fn filter_by_month(events: &[Event], month: Month) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.start_date.month() == month.number_from_month())
        .cloned()
        .collect()
}

/// Lay out `items` after `prefix`, breaking onto indented continuation lines
/// when a line would exceed `width`. An item longer than `width` gets a line
/// of its own.
fn wrap_items<'a>(
    prefix: &str,
    items: impl IntoIterator<Item = &'a str>,
    separator: &str,
    width: usize,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = prefix.to_string();
    let mut has_item = false;

    for item in items {
        let candidate = display_width(&line) + display_width(separator) + display_width(item);
        if has_item && candidate > width {
            lines.push(std::mem::take(&mut line));
            line = format!("{CONTINUATION_INDENT}{item}");
        } else {
            if has_item {
                line.push_str(separator);
            }
            line.push_str(item);
        }
        has_item = true;
    }

    lines.push(line);
    lines
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    log::warn!(
        "Message of {} characters exceeds the {} character limit; truncating",
        text.chars().count(),
        max
    );
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketLink;
    use chrono::NaiveDate;

    fn formatter(max: usize, group_by: GroupBy) -> Formatter {
        Formatter::new(
            "Goose",
            FormatConfig {
                max_chunk_chars: max,
                wrap_width: 80,
                group_by,
            },
        )
    }

    fn event(month: u32, day: u32, venue: &str) -> Event {
        let d = NaiveDate::from_ymd_opt(2024, month, day).unwrap();
        Event::new(d, d, venue, "Somewhere, ST").unwrap()
    }

    #[test]
    fn formats_single_event() {
        let e = event(3, 15, "The Masonic")
            .with_ticket_links(vec![
                TicketLink::new("Tickets", "https://t/1"),
                TicketLink::new("VIP", "https://t/vip"),
            ])
            .with_info("VIP Available");

        let text = formatter(1900, GroupBy::Month).format_event(&e);
        assert_eq!(
            text,
            "**March 15, 2024**\n\
             The Masonic | Somewhere, ST\n\
             Tickets: https://t/1; VIP: https://t/vip\n\
             Info: VIP Available"
        );
    }

    #[test]
    fn formats_range() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        let e = Event::new(start, end, "Festival Grounds", "City").unwrap();

        let text = formatter(1900, GroupBy::Month).format_event(&e);
        assert!(text.starts_with("**March 15, 2024 to March 17, 2024**"));
    }

    #[test]
    fn wraps_long_info_lines() {
        let info = "word ".repeat(60);
        let e = event(3, 15, "Venue").with_info(&info);
        let text = formatter(1900, GroupBy::Month).format_event(&e);

        let info_lines: Vec<&str> = text.lines().skip(2).collect();
        assert!(info_lines.len() > 1);
        assert!(info_lines[0].starts_with("Info: "));
        assert!(info_lines[1].starts_with("  "));
        assert!(info_lines.iter().all(|l| display_width(l) <= 80));
    }

    #[test]
    fn wraps_ticket_links_between_items() {
        let links = (0..6)
            .map(|i| {
                TicketLink::new(
                    format!("Tier {i}"),
                    format!("https://tickets.example.com/{i}"),
                )
            })
            .collect();
        let e = event(3, 15, "Venue").with_ticket_links(links);
        let text = formatter(1900, GroupBy::Month).format_event(&e);

        let ticket_lines: Vec<&str> = text.lines().skip(2).collect();
        assert!(ticket_lines.len() > 1);
        assert!(ticket_lines.iter().all(|l| display_width(l) <= 80));
        assert!(ticket_lines[1].starts_with("  Tier"));
    }

    #[test]
    fn groups_by_month_with_headers() {
        let events = vec![
            event(4, 2, "April Venue"),
            event(3, 20, "Beta"),
            event(3, 20, "Alpha"),
        ];
        let f = formatter(1900, GroupBy::Month);
        let chunks: Vec<String> = f.format_collection(&events).chunks().collect();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with("__**March 2024**__\n**March 20, 2024**\nAlpha"));
        assert!(chunks[0].contains("Beta"));
        assert!(chunks[1].starts_with("__**April 2024**__"));
    }

    #[test]
    fn ungrouped_collection_fills_chunks() {
        let events = vec![event(3, 20, "Alpha"), event(4, 2, "Beta")];
        let f = formatter(1900, GroupBy::None);
        let chunks: Vec<String> = f.format_collection(&events).chunks().collect();

        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].contains("__**"));
    }

    #[test]
    fn every_chunk_respects_the_bound() {
        let events: Vec<Event> = (1..=28)
            .map(|day| {
                event(3, day, &format!("Venue number {day}"))
                    .with_info(&"long detail text ".repeat(day as usize))
            })
            .collect();

        for max in [120, 300, 1900] {
            let f = formatter(max, GroupBy::Month);
            let collection = f.format_collection(&events);
            let chunks: Vec<String> = collection.chunks().collect();
            assert!(chunks.len() > 1);
            for chunk in &chunks {
                assert!(chunk.chars().count() <= max, "chunk over {max}");
            }
        }
    }

    #[test]
    fn chunks_are_restartable() {
        let events: Vec<Event> = (1..=10).map(|d| event(3, d, "Venue")).collect();
        let f = formatter(200, GroupBy::Month);
        let collection = f.format_collection(&events);

        let first: Vec<String> = collection.chunks().collect();
        let second: Vec<String> = (&collection).into_iter().collect();
        assert_eq!(first, second);
        assert!(first.len() > 1);
    }

    #[test]
    fn every_event_is_rendered_once() {
        let events: Vec<Event> = (1..=10).map(|d| event(3, d, &format!("V{d:02}"))).collect();
        let f = formatter(150, GroupBy::Month);
        let joined = f.format_collection(&events).chunks().collect::<Vec<_>>().join("\n");

        for d in 1..=10 {
            assert_eq!(joined.matches(&format!("V{d:02} |")).count(), 1);
        }
    }

    #[test]
    fn announcement_has_header() {
        let text = formatter(1900, GroupBy::Month).announcement(&event(3, 15, "Venue"));
        assert!(text.starts_with("**Goose announced a new show!**\n\n**March 15, 2024**"));
    }

    #[test]
    fn summary_header_mentions_month() {
        let f = formatter(1900, GroupBy::Month);
        assert_eq!(
            f.summary_header(3, Some(Month::March)),
            "**Goose Tour Dates**\nFound 3 upcoming shows in March:"
        );
    }

    #[test]
    fn filters_by_month() {
        let events = vec![event(3, 15, "A"), event(4, 1, "B")];
        let march = filter_by_month(&events, Month::March);
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].venue, "A");
    }
}
