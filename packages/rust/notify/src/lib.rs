//! Feishu webhook notifications.
//!
//! Notifications are observability, not a correctness dependency: delivery
//! failures are logged at warn and never propagated to the pipeline. An
//! unset webhook disables the notifier entirely.

use std::path::Path;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use stargazer_shared::{RepositoryRecord, Result, StargazerError};

/// Default timeout in seconds for webhook delivery.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Feishu bot text-message payload.
#[derive(Debug, Serialize)]
struct WebhookPayload {
    msg_type: &'static str,
    content: TextContent,
}

#[derive(Debug, Serialize)]
struct TextContent {
    text: String,
}

impl WebhookPayload {
    fn text(text: String) -> Self {
        Self {
            msg_type: "text",
            content: TextContent { text },
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Best-effort webhook notifier for terminal processing outcomes.
pub struct Notifier {
    client: Client,
    webhook: Option<Url>,
}

impl Notifier {
    /// Create a notifier. `None` disables delivery (logged once here rather
    /// than on every send).
    pub fn new(webhook: Option<Url>) -> Result<Self> {
        if webhook.is_none() {
            info!("webhook not configured, notifications disabled");
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StargazerError::Notify(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, webhook })
    }

    /// Report a successfully persisted document.
    pub async fn notify_success(&self, repo: &RepositoryRecord, title: &str, file_path: &Path) {
        let description = repo.description.as_deref().unwrap_or("-");
        let text = format!(
            "✅ Document generated\n\nRepository: {}\nTitle: {}\nDescription: {}\nFile: {}",
            repo.full_name(),
            title,
            description,
            file_path.display(),
        );

        self.deliver(&repo.full_name(), text).await;
    }

    /// Report a failed processing attempt.
    pub async fn notify_failure(&self, repo: &RepositoryRecord, error_message: &str) {
        let text = format!(
            "❌ Document generation failed\n\nRepository: {}\nError: {}",
            repo.full_name(),
            error_message,
        );

        self.deliver(&repo.full_name(), text).await;
    }

    /// Fire-and-forget delivery; failures are logged, never returned.
    async fn deliver(&self, repo_name: &str, text: String) {
        let Some(webhook) = &self.webhook else {
            debug!(repo = repo_name, "notification skipped (disabled)");
            return;
        };

        let payload = WebhookPayload::text(text);
        let result = self
            .client
            .post(webhook.clone())
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(repo = repo_name, "notification delivered");
            }
            Ok(response) => {
                warn!(
                    repo = repo_name,
                    status = %response.status(),
                    "notification rejected by webhook"
                );
            }
            Err(e) => {
                warn!(repo = repo_name, error = %e, "notification delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stargazer_shared::RepoId;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepositoryRecord {
        RepositoryRecord {
            repo_id: RepoId::new("42"),
            owner: "acme".into(),
            name: "widget".into(),
            starred_at: Utc::now(),
            description: Some("Widget does X".into()),
        }
    }

    #[tokio::test]
    async fn success_notification_posts_text_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({ "msg_type": "text" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = Url::parse(&format!("{}/hook", server.uri())).unwrap();
        let notifier = Notifier::new(Some(webhook)).unwrap();
        notifier
            .notify_success(&repo(), "Widget 工具", Path::new("/docs/acme_widget.md"))
            .await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let text = body["content"]["text"].as_str().unwrap();
        assert!(text.contains("acme/widget"));
        assert!(text.contains("Widget 工具"));
        assert!(text.contains("/docs/acme_widget.md"));
    }

    #[tokio::test]
    async fn failure_notification_carries_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = Url::parse(&server.uri()).unwrap();
        let notifier = Notifier::new(Some(webhook)).unwrap();
        notifier
            .notify_failure(&repo(), "overview_fetch: HTTP 404")
            .await;

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let text = body["content"]["text"].as_str().unwrap();
        assert!(text.contains("failed"));
        assert!(text.contains("overview_fetch: HTTP 404"));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_panic_or_propagate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let webhook = Url::parse(&server.uri()).unwrap();
        let notifier = Notifier::new(Some(webhook)).unwrap();
        // Returns unit; a webhook failure must be invisible to the caller.
        notifier.notify_failure(&repo(), "boom").await;
    }

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let notifier = Notifier::new(None).unwrap();
        notifier
            .notify_success(&repo(), "title", Path::new("/tmp/x.md"))
            .await;
        notifier.notify_failure(&repo(), "err").await;
    }
}
