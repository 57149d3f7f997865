//! LLM text-refinement backend.
//!
//! [`Refinery`] is a thin client for an OpenRouter-compatible
//! chat-completions API: one prompt + context in, one text out. It is
//! stateless and performs no retries — retry policy belongs to the poll
//! loop, one full cycle at a time.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use stargazer_shared::{Result, StargazerError};

/// Default timeout in seconds for completion requests. Refinement calls are
/// long-running; a hung backend is bounded here rather than in the pipeline.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("Stargazer/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Refinery
// ---------------------------------------------------------------------------

/// Chat-completions client used for both refinement stages.
pub struct Refinery {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    /// Byte budget applied to the context before sending.
    context_budget: usize,
}

impl Refinery {
    pub fn new(
        base_url: Url,
        api_key: impl Into<String>,
        model: impl Into<String>,
        context_budget: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StargazerError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: ensure_trailing_slash(base_url),
            api_key: api_key.into(),
            model: model.into(),
            context_budget,
        })
    }

    /// One refinement call: `prompt` as the system message, `context` as the
    /// user message. Returns the raw completion text.
    ///
    /// Transport errors surface as [`StargazerError::Network`]; the pipeline
    /// attributes them to the failing stage.
    #[instrument(skip_all, fields(model = %self.model, context_len = context.len()))]
    pub async fn refine(&self, prompt: &str, context: &str) -> Result<String> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| StargazerError::Network(format!("bad backend URL: {e}")))?;

        let bounded = truncate_context(context, self.context_budget);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &bounded,
                },
            ],
        };

        let response = self
            .client
            .post(url.clone())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| StargazerError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StargazerError::Network(format!("{url}: HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| StargazerError::Network(format!("{url}: invalid response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(StargazerError::Network(
                "backend returned an empty completion".into(),
            ));
        }

        debug!(response_len = text.len(), "refinement call complete");
        Ok(text)
    }
}

/// A base URL without a trailing slash makes `Url::join` treat its last
/// path segment as a file and drop it (`.../api` + `v1/...` → `.../v1/...`),
/// so normalize before any join.
fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Truncate context to at most `max_bytes` bytes, respecting char
/// boundaries.
fn truncate_context(context: &str, max_bytes: usize) -> String {
    if context.len() <= max_bytes {
        return context.to_string();
    }

    let mut end = max_bytes;
    while !context.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[... content truncated for LLM context window ...]",
        &context[..end]
    )
}
