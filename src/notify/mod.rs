//! Completion notifications
//!
//! Delivers execution summaries to a webhook when a run reaches a
//! terminal state.

#![allow(dead_code)]

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::models::{ExecutionSummary, NotificationPrefs};

/// Delivery seam for terminal-execution notifications
#[async_trait::async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, prefs: &NotificationPrefs, summary: &ExecutionSummary) -> Result<()>;
}

/// Posts the JSON summary to the configured webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create notification client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl NotificationSender for WebhookNotifier {
    async fn send(&self, prefs: &NotificationPrefs, summary: &ExecutionSummary) -> Result<()> {
        let response = self
            .client
            .post(&prefs.webhook_url)
            .json(summary)
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", prefs.webhook_url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "webhook {} answered {}",
                prefs.webhook_url,
                response.status()
            );
        }

        debug!(
            "delivered {} notification for execution {}",
            summary.status, summary.execution_id
        );
        Ok(())
    }
}

/// Swallows every notification; for embedding without delivery
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait::async_trait]
impl NotificationSender for NoopNotifier {
    async fn send(&self, _prefs: &NotificationPrefs, summary: &ExecutionSummary) -> Result<()> {
        debug!(
            "dropping notification for execution {} (no sender configured)",
            summary.execution_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionKind, ExecutionStatus};

    fn summary() -> ExecutionSummary {
        ExecutionSummary {
            execution_id: "ex-1".to_string(),
            kind: ExecutionKind::Suite,
            target_id: "s-1".to_string(),
            target_name: "smoke".to_string(),
            status: ExecutionStatus::Completed,
            total: 3,
            passed: 3,
            failed: 0,
            duration_ms: 120,
        }
    }

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let notifier = NoopNotifier;
        let prefs = NotificationPrefs::on_completion("http://localhost:1/hook");
        assert!(notifier.send(&prefs, &summary()).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_an_error() {
        let notifier = WebhookNotifier::new().unwrap();
        // nothing listens on this port
        let prefs = NotificationPrefs::on_completion("http://127.0.0.1:1/hook");
        assert!(notifier.send(&prefs, &summary()).await.is_err());
    }

    #[test]
    fn test_summary_serializes_for_delivery() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["execution_id"], "ex-1");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["passed"], 3);
    }
}
