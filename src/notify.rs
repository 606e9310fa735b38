//! Out-of-band operator alerts.
//!
//! Fatal faults are pushed to the operator before the process exits. The
//! webhook sink posts `{"text": message}`, which chat services that accept
//! incoming webhooks understand.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{info, warn};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Writes alerts to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        warn!(alert = message, "Operator alert");
        Ok(())
    }
}

/// Posts alerts to an incoming-webhook URL.
pub struct WebhookNotifier {
    http: Client,
    url: SecretString,
}

impl WebhookNotifier {
    pub fn new(url: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client for webhook")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url.expose_secret().as_str())
            .json(&json!({ "text": message }))
            .send()
            .await
            .context("Webhook request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("Webhook returned {}", resp.status());
        }
        info!("Operator alert sent");
        Ok(())
    }
}
