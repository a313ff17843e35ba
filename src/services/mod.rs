//! Service layer: the external collaborators of the pipeline.
//!
//! - Event sources (`EventSource`): file, JSON endpoint, HTML listing
//! - Notifiers (`Notifier`): console, webhook

mod notify;
mod sources;

pub use notify::{ConsoleNotifier, Notifier, WebhookNotifier, build_notifier};
pub use sources::{EventSource, FileSource, HtmlSource, JsonSource, build_sources, parse_listing};
