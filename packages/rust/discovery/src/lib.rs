//! Starred-repository discovery via the GitHub API.
//!
//! [`StarFeed`] wraps `GET /user/starred` with the `star+json` media type
//! (the only variant that exposes `starred_at`) and exposes a deduplicated,
//! time-ordered candidate sequence for the poll loop. The feed performs no
//! retries of its own — a failed call simply means "no new candidates this
//! cycle" and the scheduler tries again on the next tick.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use stargazer_shared::{RepoId, RepositoryRecord, Result, StargazerError};

/// Default timeout in seconds for GitHub API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Media type that includes `starred_at` in the starred listing.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";

/// README file names probed on the raw content host, in preference order.
const README_CANDIDATES: [&str; 3] = ["README.md", "README.zh.md", "README.zh-CN.md"];

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("Stargazer/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One element of the `star+json` starred listing.
#[derive(Debug, Deserialize)]
struct StarredItem {
    starred_at: DateTime<Utc>,
    repo: RepoItem,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    id: u64,
    name: String,
    owner: OwnerItem,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwnerItem {
    login: String,
}

// ---------------------------------------------------------------------------
// StarFeed
// ---------------------------------------------------------------------------

/// Client for the starred-repository feed and upstream README fetches.
pub struct StarFeed {
    client: Client,
    api_url: Url,
    raw_url: Url,
    token: String,
}

impl StarFeed {
    /// Create a feed client against the given API and raw-content hosts.
    pub fn new(api_url: Url, raw_url: Url, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StargazerError::Discovery(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            raw_url,
            token: token.into(),
        })
    }

    /// List the account's most recently starred repositories.
    ///
    /// Returns at most `limit` records, deduplicated by repository id and
    /// sorted by `starred_at` ascending so older stars are processed first.
    #[instrument(skip(self))]
    pub async fn list_recent_stars(&self, limit: u32) -> Result<Vec<RepositoryRecord>> {
        let url = self
            .api_url
            .join("user/starred")
            .map_err(|e| StargazerError::Discovery(format!("bad API URL: {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .header("Accept", STAR_MEDIA_TYPE)
            .header("Authorization", format!("token {}", self.token))
            .query(&[
                ("per_page", limit.to_string()),
                ("sort", "created".into()),
                ("direction", "desc".into()),
            ])
            .send()
            .await
            .map_err(|e| StargazerError::Discovery(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StargazerError::Discovery(format!("{url}: HTTP {status}")));
        }

        let items: Vec<StarredItem> = response
            .json()
            .await
            .map_err(|e| StargazerError::Discovery(format!("{url}: invalid response: {e}")))?;

        let mut seen: HashSet<RepoId> = HashSet::new();
        let mut records: Vec<RepositoryRecord> = Vec::with_capacity(items.len());

        for item in items {
            let repo_id = RepoId::from(item.repo.id);
            if !seen.insert(repo_id.clone()) {
                debug!(%repo_id, "duplicate repository in feed, skipping");
                continue;
            }
            records.push(RepositoryRecord {
                repo_id,
                owner: item.repo.owner.login,
                name: item.repo.name,
                starred_at: item.starred_at,
                description: item.repo.description,
            });
        }

        // Oldest star first: the loop should catch up in the order the
        // operator starred things.
        records.sort_by_key(|r| r.starred_at);

        info!(count = records.len(), "starred repositories discovered");
        Ok(records)
    }

    /// Fetch the upstream README from the raw content host.
    ///
    /// Probes the candidate file names in order; 404 on all of them yields
    /// `Ok(None)` — a missing README is expected, not an error.
    #[instrument(skip(self))]
    pub async fn fetch_readme(&self, owner: &str, name: &str) -> Result<Option<String>> {
        for candidate in README_CANDIDATES {
            let url = self
                .raw_url
                .join(&format!("{owner}/{name}/HEAD/{candidate}"))
                .map_err(|e| StargazerError::Discovery(format!("bad raw URL: {e}")))?;

            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| StargazerError::Discovery(format!("{url}: {e}")))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            if !status.is_success() {
                return Err(StargazerError::Discovery(format!("{url}: HTTP {status}")));
            }

            let body = response
                .text()
                .await
                .map_err(|e| StargazerError::Discovery(format!("{url}: {e}")))?;

            debug!(%candidate, bytes = body.len(), "README fetched");
            return Ok(Some(body));
        }

        debug!(owner, name, "no README found");
        Ok(None)
    }
}
