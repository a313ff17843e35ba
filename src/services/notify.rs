// src/services/notify.rs

//! Message delivery.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{NotifierConfig, NotifierKind};

/// Sink for formatted announcement messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message. Failures surface as `Notify`.
    async fn send(&self, message: &str) -> Result<()>;
}

/// Prints messages to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, message: &str) -> Result<()> {
        println!("{message}\n");
        Ok(())
    }
}

/// Posts messages to a Discord-compatible webhook as `{"content": ...}`.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({ "content": message }))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(AppError::notify)?;
        Ok(())
    }
}

/// Build the configured notifier.
pub fn build_notifier(config: &NotifierConfig, client: &Client) -> Result<Box<dyn Notifier>> {
    match config.kind {
        NotifierKind::Console => Ok(Box::new(ConsoleNotifier)),
        NotifierKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| AppError::config("notifier.webhook_url is not set"))?;
            Ok(Box::new(WebhookNotifier::new(client.clone(), url)))
        }
    }
}
