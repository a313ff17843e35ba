// src/services/sources.rs

//! Raw event sources.
//!
//! A source only has to hand over [`RawEvent`]s; validation happens later in
//! the normalization pass.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, ListingSelectors, RawEvent, RawLink, RawLinks, SourceConfig};
use crate::utils::{collapse_whitespace, http, resolve_url};

/// Producer of raw tour-date records.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Human readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch the current listing. Failures surface as `SourceUnavailable`.
    async fn fetch(&self) -> Result<Vec<RawEvent>>;
}

/// JSON array of raw records on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }
}

#[async_trait]
impl EventSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawEvent>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AppError::source_unavailable(&self.name, e))?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::source_unavailable(&self.name, e))
    }
}

/// JSON array of raw records served over HTTP.
#[derive(Debug, Clone)]
pub struct JsonSource {
    client: Client,
    url: String,
}

impl JsonSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EventSource for JsonSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<RawEvent>> {
        let body = http::fetch_text(&self.client, &self.url)
            .await
            .map_err(|e| AppError::source_unavailable(&self.url, e))?;
        serde_json::from_str(&body).map_err(|e| AppError::source_unavailable(&self.url, e))
    }
}

/// Static HTML listing read with CSS selectors.
#[derive(Debug, Clone)]
pub struct HtmlSource {
    client: Client,
    url: String,
    selectors: ListingSelectors,
}

impl HtmlSource {
    pub fn new(client: Client, url: impl Into<String>, selectors: ListingSelectors) -> Self {
        Self {
            client,
            url: url.into(),
            selectors,
        }
    }
}

#[async_trait]
impl EventSource for HtmlSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<RawEvent>> {
        let base = Url::parse(&self.url)?;
        let html = http::fetch_text(&self.client, &self.url)
            .await
            .map_err(|e| AppError::source_unavailable(&self.url, e))?;
        let events = parse_listing(&html, &self.selectors, &base)?;
        log::debug!("{}: {} rows parsed", self.url, events.len());
        Ok(events)
    }
}

/// Compiled form of [`ListingSelectors`].
struct CompiledSelectors {
    row: Selector,
    date: Selector,
    venue: Selector,
    location: Selector,
    ticket_link: Option<Selector>,
    info: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(selectors: &ListingSelectors) -> Result<Self> {
        let optional = |s: &Option<String>| s.as_deref().map(parse_selector).transpose();
        Ok(Self {
            row: parse_selector(&selectors.row)?,
            date: parse_selector(&selectors.date)?,
            venue: parse_selector(&selectors.venue)?,
            location: parse_selector(&selectors.location)?,
            ticket_link: optional(&selectors.ticket_link)?,
            info: optional(&selectors.info)?,
        })
    }
}

/// Parse a listing page into raw records.
///
/// Rows carrying `skip_class` are ignored. Fields whose selector matches
/// nothing are left `None` so normalization can report them as partial.
pub fn parse_listing(
    html: &str,
    selectors: &ListingSelectors,
    base: &Url,
) -> Result<Vec<RawEvent>> {
    let compiled = CompiledSelectors::compile(selectors)?;
    let document = Html::parse_document(html);

    let events = document
        .select(&compiled.row)
        .filter(|row| match &selectors.skip_class {
            Some(class) => !row.value().classes().any(|c| c == class.as_str()),
            None => true,
        })
        .map(|row| parse_row(&row, &compiled, base))
        .collect();
    Ok(events)
}

fn parse_row(row: &ElementRef, selectors: &CompiledSelectors, base: &Url) -> RawEvent {
    let text_of = |sel: &Selector| row.select(sel).next().map(element_text);

    let ticket_links = selectors.ticket_link.as_ref().and_then(|sel| {
        let links: Vec<RawLink> = row
            .select(sel)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let label = element_text(a);
                Some(RawLink::Pair {
                    label,
                    url: resolve_url(base, href),
                })
            })
            .collect();
        (!links.is_empty()).then_some(RawLinks::List(links))
    });

    let additional_info = selectors
        .info
        .as_ref()
        .and_then(|sel| text_of(sel))
        .filter(|s| !s.is_empty())
        .map(crate::models::TextOrList::Text);

    RawEvent {
        date: text_of(&selectors.date),
        venue: text_of(&selectors.venue),
        location: text_of(&selectors.location),
        ticket_links,
        additional_info,
    }
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Build every configured source.
pub fn build_sources(config: &Config, client: &Client) -> Vec<Box<dyn EventSource>> {
    config
        .sources
        .iter()
        .map(|source| -> Box<dyn EventSource> {
            match source {
                SourceConfig::File { path } => Box::new(FileSource::new(path)),
                SourceConfig::Json { url } => Box::new(JsonSource::new(client.clone(), url)),
                SourceConfig::Html { url, selectors } => {
                    Box::new(HtmlSource::new(client.clone(), url, selectors.clone()))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextOrList;
    use tempfile::TempDir;

    const LISTING: &str = r#"
        <div class="seated-event-row">
          <div class="seated-event-date-cell">Mar 15, 2024</div>
          <div class="seated-event-venue-name">The   Masonic</div>
          <div class="seated-event-venue-location">San Francisco, CA</div>
          <div class="seated-event-details-cell">VIP Available</div>
          <a class="seated-event-link" href="/tickets/1">Tickets</a>
          <a class="seated-event-link" href="https://vip.example.com/1">VIP</a>
        </div>
        <div class="seated-event-row past-event">
          <div class="seated-event-date-cell">Jan 1, 2020</div>
          <div class="seated-event-venue-name">Old Hall</div>
          <div class="seated-event-venue-location">Nowhere</div>
        </div>
        <div class="seated-event-row">
          <div class="seated-event-date-cell">Apr 2, 2024</div>
          <div class="seated-event-venue-name">Red Rocks</div>
        </div>
    "#;

    fn selectors() -> ListingSelectors {
        match Config::default().sources.into_iter().next() {
            Some(SourceConfig::Html { selectors, .. }) => selectors,
            other => panic!("unexpected default source: {other:?}"),
        }
    }

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.class").is_ok());
        assert!(parse_selector("tr:has(a)").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_parse_listing() {
        let base = Url::parse("https://band.example.com/tour").unwrap();
        let events = parse_listing(LISTING, &selectors(), &base).unwrap();

        assert_eq!(events.len(), 2);

        let first = &events[0];
        assert_eq!(first.date.as_deref(), Some("Mar 15, 2024"));
        assert_eq!(first.venue.as_deref(), Some("The Masonic"));
        assert_eq!(
            first.additional_info,
            Some(TextOrList::Text("VIP Available".into()))
        );
        let links = first.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://band.example.com/tickets/1");
        assert_eq!(links[1].label, "VIP");

        assert!(events[1].location.is_none());
        assert!(events[1].ticket_links.is_none());
    }

    #[tokio::test]
    async fn test_file_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("events.json");
        std::fs::write(
            &path,
            r#"[{"date": "Mar 15, 2024", "venue": "A", "location": "B",
                 "ticketLinks": "https://t/1", "additionalInfo": ["Early show"]}]"#,
        )
        .unwrap();

        let events = FileSource::new(&path).fetch().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].info(), "Early show");
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let result = FileSource::new(tmp.path().join("missing.json")).fetch().await;
        assert!(matches!(result, Err(AppError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_build_sources() {
        let mut config = Config::default();
        config.sources.push(SourceConfig::File {
            path: "events.json".into(),
        });
        let client = Client::new();

        let sources = build_sources(&config, &client);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].name(), "file:events.json");
    }
}
