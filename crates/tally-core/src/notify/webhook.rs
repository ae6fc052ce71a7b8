//! Webhook notification dispatcher
//!
//! Posts notification events as JSON to a configured HTTP endpoint (a push
//! relay, a chat hook, anything that accepts a POST). Without a URL the
//! dispatcher stays usable and reports every send as skipped, so an
//! unconfigured deployment runs the sweeps without delivering anything.
//!
//! Configuration: `TALLY_WEBHOOK_URL` environment variable, or the
//! `notify.webhook_url` config key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Goal, User};

use super::{BudgetAlert, DispatchStatus, NotificationDispatcher};

/// Environment variable naming the webhook endpoint
pub const WEBHOOK_URL_ENV: &str = "TALLY_WEBHOOK_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification dispatcher that POSTs JSON events to one endpoint
pub struct WebhookDispatcher {
    client: Client,
    url: Option<String>,
}

impl WebhookDispatcher {
    /// Create a dispatcher for the given endpoint
    ///
    /// `None` or an empty string means unconfigured: sends report
    /// [`DispatchStatus::Skipped`].
    pub fn new(url: Option<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a dispatcher with an explicit per-request timeout
    pub fn with_timeout(url: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.filter(|u| !u.is_empty()),
        }
    }

    /// Build from the `TALLY_WEBHOOK_URL` environment variable
    pub fn from_env() -> Self {
        Self::new(std::env::var(WEBHOOK_URL_ENV).ok())
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn post(&self, body: serde_json::Value) -> Result<DispatchStatus> {
        let Some(url) = &self.url else {
            debug!("webhook not configured, notification skipped");
            return Ok(DispatchStatus::Skipped);
        };

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(DispatchStatus::Sent)
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn send_budget_alert(&self, user: &User, alert: &BudgetAlert) -> Result<DispatchStatus> {
        self.post(json!({
            "event": "budget_alert",
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
            },
            "budget": alert,
        }))
        .await
    }

    async fn send_goal_achievement(&self, user: &User, goal: &Goal) -> Result<DispatchStatus> {
        self.post(json!({
            "event": "goal_achievement",
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
            },
            "goal": {
                "id": goal.id,
                "title": goal.title,
                "target_amount": goal.target_amount,
                "current_amount": goal.current_amount,
                "category": goal.category,
            },
        }))
        .await
    }
}
