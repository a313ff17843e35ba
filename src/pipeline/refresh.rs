//! The guarded load, diff and save cycle.
//!
//! Flow per refresh:
//! 1. Fetch every source (with retries) concurrently
//! 2. Normalize each batch and merge across sources
//! 3. Circuit breaker check against the previous snapshot
//! 4. Delta against the announced-event ledger
//! 5. Deliver announcements, recording each one after it was sent
//! 6. Prune the ledger and overwrite the snapshot

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Config, Event, Ledger};
use crate::pipeline::{
    CircuitBreaker, DiffCalculator, Formatter, RetryPolicy, merge_events, normalize_batch,
    snapshot_diff,
};
use crate::services::{EventSource, Notifier};
use crate::storage::{EventStore, LocalStorage, is_fresh};

/// Knobs for a single refresh.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Bypass the circuit breaker
    pub force: bool,
    /// Compute and log the delta without sending or writing anything
    pub dry_run: bool,
    /// Clock reading used for freshness, ledger stamps and retention
    pub now: DateTime<Utc>,
}

impl RefreshOptions {
    pub fn new() -> Self {
        Self {
            force: false,
            dry_run: false,
            now: Utc::now(),
        }
    }
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics of one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Raw records received from all sources
    pub fetched: usize,
    /// Sources that failed after retries
    pub failed_sources: usize,
    /// Events after normalization and merging
    pub normalized: usize,
    /// Records dropped as partial or unparseable
    pub skipped: usize,
    /// Records folded into a duplicate
    pub merged: usize,
    pub added: usize,
    pub updated: usize,
    /// Messages delivered and recorded in the ledger
    pub announced: usize,
    pub failed_notifications: usize,
    /// Ledger entries dropped by retention
    pub pruned: usize,
    pub cache_saved: bool,
}

/// Result of fetching and normalizing every source.
#[derive(Debug, Default)]
struct Collected {
    events: Vec<Event>,
    fetched: usize,
    failed_sources: usize,
    skipped: usize,
    merged: usize,
}

/// Owns the state shared between scheduled and on-demand refreshes.
pub struct Monitor {
    config: Arc<Config>,
    storage: LocalStorage,
    formatter: Formatter,
    retry: RetryPolicy,
    guard: Mutex<()>,
}

impl Monitor {
    pub fn new(config: Arc<Config>, storage: LocalStorage) -> Self {
        let formatter = Formatter::from_config(&config);
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            storage,
            formatter,
            retry,
            guard: Mutex::new(()),
        }
    }

    /// Replace the retry policy (tests use [`RetryPolicy::none`]).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Run one full refresh and announce what is new.
    pub async fn refresh(
        &self,
        sources: &[Box<dyn EventSource>],
        notifier: &dyn Notifier,
        options: &RefreshOptions,
    ) -> Result<RefreshReport> {
        let _lock = self.guard.lock().await;

        let collected = self.collect(sources).await?;
        let mut report = RefreshReport {
            fetched: collected.fetched,
            failed_sources: collected.failed_sources,
            normalized: collected.events.len(),
            skipped: collected.skipped,
            merged: collected.merged,
            ..RefreshReport::default()
        };
        let current = collected.events;

        let previous = self
            .storage
            .load_snapshot()
            .await
            .map(|s| s.events)
            .unwrap_or_default();
        self.check_breaker(&current, &previous, options.force)?;

        let diff = snapshot_diff(&previous, &current);
        if diff.has_changes() {
            log::info!(
                "Snapshot diff: {} added, {} removed",
                diff.added.len(),
                diff.removed.len()
            );
        }

        let mut ledger = self.storage.load_ledger().await?;
        let cutoff = self.retention_cutoff(options.now);
        let delta = DiffCalculator::with_updates(self.config.announce.reannounce_updates)
            .calculate(&current, &ledger);

        let mut outgoing: Vec<(&Event, String)> = delta
            .added
            .iter()
            .map(|e| (e, self.formatter.announcement(e)))
            .chain(
                delta
                    .updated
                    .iter()
                    .map(|e| (e, self.formatter.update_announcement(e))),
            )
            .filter(|(e, _)| cutoff.is_none_or(|c| e.end_date >= c))
            .collect();
        outgoing.sort_by(|a, b| a.0.display_cmp(b.0));
        report.added = delta.added.len();
        report.updated = delta.updated.len();

        log::info!(
            "{} events, {} new, {} updated, {} to announce",
            current.len(),
            report.added,
            report.updated,
            outgoing.len()
        );

        if options.dry_run {
            for (_, message) in &outgoing {
                log::info!("[dry run] would send:\n{}", message);
            }
            return Ok(report);
        }

        let delay = Duration::from_millis(self.config.notifier.send_delay_ms);
        for (index, (event, message)) in outgoing.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let label = format!("notify {}", notifier.name());
            match self.retry.run(&label, || notifier.send(message)).await {
                Ok(()) => {
                    ledger.record(event, options.now);
                    report.announced += 1;
                    if let Err(e) = self.storage.save_ledger(&ledger).await {
                        log::error!("Failed to save ledger: {}", e);
                    }
                }
                Err(e) => {
                    report.failed_notifications += 1;
                    log::error!("Announcement for {} not delivered: {}", event.venue, e);
                }
            }
        }

        if let Some(cutoff) = cutoff {
            report.pruned = ledger.prune(cutoff);
            if report.pruned > 0 {
                log::info!("Pruned {} ledger entries ended before {}", report.pruned, cutoff);
                if let Err(e) = self.storage.save_ledger(&ledger).await {
                    log::error!("Failed to save ledger: {}", e);
                }
            }
        }

        report.cache_saved = self
            .save_complete_snapshot(&current, collected.failed_sources, options.now)
            .await;
        Ok(report)
    }

    /// Events for display: the cached snapshot while fresh, otherwise a
    /// fetch that also overwrites the snapshot. Never announces.
    pub async fn current_events(
        &self,
        sources: &[Box<dyn EventSource>],
        options: &RefreshOptions,
    ) -> Result<Vec<Event>> {
        let _lock = self.guard.lock().await;

        let previous = self.storage.load_snapshot().await;
        if let Some(snapshot) = &previous {
            let ttl = self.config.cache.ttl_at(options.now);
            if is_fresh(snapshot, options.now, ttl) {
                log::debug!("Using cached snapshot from {}", snapshot.captured_at);
                return Ok(snapshot.sorted());
            }
        }

        self.fetch_into_snapshot(sources, previous.map(|s| s.events), options)
            .await
    }

    /// Fetch now regardless of cache freshness and overwrite the snapshot.
    /// Never announces.
    pub async fn fetch_events(
        &self,
        sources: &[Box<dyn EventSource>],
        options: &RefreshOptions,
    ) -> Result<Vec<Event>> {
        let _lock = self.guard.lock().await;

        let previous = self.storage.load_snapshot().await.map(|s| s.events);
        self.fetch_into_snapshot(sources, previous, options).await
    }

    async fn fetch_into_snapshot(
        &self,
        sources: &[Box<dyn EventSource>],
        previous: Option<Vec<Event>>,
        options: &RefreshOptions,
    ) -> Result<Vec<Event>> {
        let collected = self.collect(sources).await?;
        self.check_breaker(
            &collected.events,
            &previous.unwrap_or_default(),
            options.force,
        )?;

        if !options.dry_run {
            self.save_complete_snapshot(
                &collected.events,
                collected.failed_sources,
                options.now,
            )
            .await;
        }
        Ok(collected.events)
    }

    /// Mark every current event as announced without sending anything.
    /// Returns how many entries were added to the ledger.
    pub async fn seed(
        &self,
        sources: &[Box<dyn EventSource>],
        options: &RefreshOptions,
    ) -> Result<usize> {
        let _lock = self.guard.lock().await;

        let collected = self.collect(sources).await?;
        let mut ledger = self.storage.load_ledger().await?;
        let before = ledger.len();
        for event in &collected.events {
            if !ledger.contains(&event.identity()) {
                ledger.record(event, options.now);
            }
        }
        let added = ledger.len() - before;

        if !options.dry_run {
            self.storage.save_ledger(&ledger).await?;
            self.save_complete_snapshot(
                &collected.events,
                collected.failed_sources,
                options.now,
            )
            .await;
        }
        log::info!("Seeded ledger with {} events ({} total)", added, ledger.len());
        Ok(added)
    }

    /// Apply ledger retention. Returns how many entries were dropped.
    pub async fn prune(&self, options: &RefreshOptions) -> Result<usize> {
        let _lock = self.guard.lock().await;

        let Some(cutoff) = self.retention_cutoff(options.now) else {
            log::info!("Ledger retention disabled; nothing to prune");
            return Ok(0);
        };
        let mut ledger = self.storage.load_ledger().await?;
        let pruned = ledger.prune(cutoff);
        if pruned > 0 && !options.dry_run {
            self.storage.save_ledger(&ledger).await?;
        }
        log::info!("Pruned {} ledger entries ended before {}", pruned, cutoff);
        Ok(pruned)
    }

    /// Current ledger contents.
    pub async fn ledger(&self) -> Result<Ledger> {
        self.storage.load_ledger().await
    }

    fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        self.config
            .ledger
            .retention()
            .map(|days| now.date_naive() - chrono::Duration::days(i64::from(days)))
    }

    fn check_breaker(&self, current: &[Event], previous: &[Event], force: bool) -> Result<()> {
        let breaker = CircuitBreaker::with_config(self.config.circuit_breaker.clone());
        match breaker.validate(current, previous) {
            Err(e) if force => {
                log::warn!("{} (forced, continuing)", e);
                Ok(())
            }
            other => other,
        }
    }

    /// Fetch all sources concurrently and normalize the results.
    async fn collect(&self, sources: &[Box<dyn EventSource>]) -> Result<Collected> {
        if sources.is_empty() {
            return Err(AppError::config("No sources configured"));
        }

        let results = join_all(sources.iter().map(|source| async move {
            let raw = self.retry.run(source.name(), || source.fetch()).await;
            (source.name(), raw)
        }))
        .await;

        let mut collected = Collected::default();
        let mut batches = Vec::new();
        let mut errors = Vec::new();

        for (name, result) in results {
            match result {
                Ok(raw) => {
                    let outcome = normalize_batch(&raw);
                    log::info!(
                        "{}: {} records, {} events, {} skipped",
                        name,
                        raw.len(),
                        outcome.events.len(),
                        outcome.skipped.len()
                    );
                    collected.fetched += raw.len();
                    collected.skipped += outcome.skipped.len();
                    collected.merged += outcome.merged;
                    batches.push(outcome.events);
                }
                Err(e) => {
                    log::warn!("Source {} failed: {}", name, e);
                    collected.failed_sources += 1;
                    errors.push(format!("{name}: {e}"));
                }
            }
        }

        if batches.is_empty() {
            return Err(AppError::RefreshFailed {
                attempts: self.retry.max_attempts(),
                message: errors.join("; "),
            });
        }

        let before_merge: usize = batches.iter().map(Vec::len).sum();
        collected.events = merge_events(batches);
        collected.merged += before_merge - collected.events.len();
        Ok(collected)
    }

    /// Overwrite the snapshot only when every source answered, so a partial
    /// listing never becomes the next breaker baseline.
    async fn save_complete_snapshot(
        &self,
        events: &[Event],
        failed_sources: usize,
        now: DateTime<Utc>,
    ) -> bool {
        if failed_sources > 0 {
            log::warn!(
                "{} source(s) failed; keeping the previous snapshot",
                failed_sources
            );
            return false;
        }
        match self.storage.save_snapshot(events, now).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to save snapshot: {}", e);
                false
            }
        }
    }
}
