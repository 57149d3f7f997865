//! Document acquisition: assembles the per-repository [`Workspace`].
//!
//! [`DocSource`] talks to a DeepWiki-style docs service; [`Acquirer`] combines
//! it with the upstream README fetch and applies the required-vs-optional
//! policy: the overview document is required (its absence fails the
//! repository), supplementary docs and the README are best-effort and degrade
//! to empty/absent with a warning.

use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use stargazer_discovery::StarFeed;
use stargazer_shared::{
    AcquisitionStep, NamedDoc, RepositoryRecord, Result, StargazerError, Workspace,
    sanitize_filename,
};

/// Default timeout in seconds for docs-service requests. Wiki generation can
/// be slow on a cold cache, so this is deliberately generous.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// User-Agent string for docs-service requests.
const USER_AGENT: &str = concat!("Stargazer/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// DocSource
// ---------------------------------------------------------------------------

/// Wire shape of the supplementary pages listing.
#[derive(Debug, Deserialize)]
struct PagesResponse {
    pages: Vec<NamedDoc>,
}

/// HTTP client for the DeepWiki docs service.
pub struct DocSource {
    client: Client,
    base_url: Url,
}

impl DocSource {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                StargazerError::acquisition(
                    AcquisitionStep::OverviewFetch,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self { client, base_url })
    }

    /// Fetch the required overview document for a repository.
    pub async fn fetch_overview(&self, repo: &RepositoryRecord) -> Result<String> {
        let url = self.endpoint(repo, "overview")?;
        let body = self
            .fetch_text(&url)
            .await
            .map_err(|e| StargazerError::acquisition(AcquisitionStep::OverviewFetch, e))?;

        if body.trim().is_empty() {
            return Err(StargazerError::acquisition(
                AcquisitionStep::OverviewFetch,
                format!("{url}: overview document is empty"),
            ));
        }
        Ok(body)
    }

    /// Fetch the supplementary documents (everything except the overview),
    /// order preserved as returned by the service.
    pub async fn fetch_supplementary(&self, repo: &RepositoryRecord) -> Result<Vec<NamedDoc>> {
        let url = self.endpoint(repo, "pages")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StargazerError::acquisition(AcquisitionStep::DocsCopy, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StargazerError::acquisition(
                AcquisitionStep::DocsCopy,
                format!("{url}: HTTP {status}"),
            ));
        }

        let parsed: PagesResponse = response.json().await.map_err(|e| {
            StargazerError::acquisition(AcquisitionStep::DocsCopy, format!("{url}: invalid response: {e}"))
        })?;

        // The overview has its own endpoint; drop any copy echoed in the
        // pages listing.
        let pages: Vec<NamedDoc> = parsed
            .pages
            .into_iter()
            .filter(|p| !p.name.to_lowercase().contains("overview"))
            .collect();

        debug!(count = pages.len(), "supplementary documents fetched");
        Ok(pages)
    }

    fn endpoint(&self, repo: &RepositoryRecord, tail: &str) -> Result<Url> {
        self.base_url
            .join(&format!("api/repos/{}/{}/{tail}", repo.owner, repo.name))
            .map_err(|e| {
                StargazerError::acquisition(AcquisitionStep::OverviewFetch, format!("bad docs URL: {e}"))
            })
    }

    async fn fetch_text(&self, url: &Url) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("{url}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("{url}: HTTP {status}"));
        }

        response.text().await.map_err(|e| format!("{url}: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Acquirer
// ---------------------------------------------------------------------------

/// Assembles the per-repository workspace from the docs service and GitHub.
pub struct Acquirer {
    docs: DocSource,
    feed: StarFeed,
    /// When set, each workspace is mirrored under this directory for
    /// debugging; the mirror write is part of the acquisition contract.
    workspace_root: Option<PathBuf>,
}

impl Acquirer {
    pub fn new(docs: DocSource, feed: StarFeed, workspace_root: Option<PathBuf>) -> Self {
        Self {
            docs,
            feed,
            workspace_root,
        }
    }

    /// Prepare the raw-material workspace for one repository.
    ///
    /// The overview is required; supplementary docs and the README degrade
    /// gracefully when unavailable.
    #[instrument(skip(self), fields(repo = %repo.full_name()))]
    pub async fn prepare(&self, repo: &RepositoryRecord) -> Result<Workspace> {
        let overview = self.docs.fetch_overview(repo).await?;

        let supplementary = match self.docs.fetch_supplementary(repo).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!(error = %e, "supplementary docs unavailable, continuing without them");
                Vec::new()
            }
        };

        let readme = match self.feed.fetch_readme(&repo.owner, &repo.name).await {
            Ok(readme) => {
                if readme.is_none() {
                    info!("no upstream README, pipeline degrades gracefully");
                }
                readme
            }
            Err(e) => {
                warn!(error = %e, "README fetch failed, continuing without it");
                None
            }
        };

        let workspace = Workspace {
            overview,
            supplementary,
            readme,
        };

        if let Some(root) = &self.workspace_root {
            self.mirror_workspace(root, repo, &workspace)?;
        }

        info!(
            supplementary = workspace.supplementary.len(),
            has_readme = workspace.readme.is_some(),
            "workspace prepared"
        );
        Ok(workspace)
    }

    /// Write the workspace contents to disk for debugging.
    ///
    /// Layout: `<root>/<owner>_<name>/overview.md`, `docs/*.md`, `README.md`.
    fn mirror_workspace(
        &self,
        root: &Path,
        repo: &RepositoryRecord,
        workspace: &Workspace,
    ) -> Result<()> {
        let dir = root.join(sanitize_filename(&repo.full_name()));
        let docs_dir = dir.join("docs");

        let copy_err = |path: &Path, e: std::io::Error| {
            StargazerError::acquisition(
                AcquisitionStep::DocsCopy,
                format!("{}: {e}", path.display()),
            )
        };

        std::fs::create_dir_all(&docs_dir).map_err(|e| copy_err(&docs_dir, e))?;

        let overview_path = dir.join("overview.md");
        std::fs::write(&overview_path, &workspace.overview)
            .map_err(|e| copy_err(&overview_path, e))?;

        for doc in &workspace.supplementary {
            let mut file_name = sanitize_filename(&doc.name);
            if !file_name.ends_with(".md") {
                file_name.push_str(".md");
            }
            let path = docs_dir.join(file_name);
            std::fs::write(&path, &doc.content).map_err(|e| copy_err(&path, e))?;
        }

        if let Some(readme) = &workspace.readme {
            let readme_path = dir.join("README.md");
            std::fs::write(&readme_path, readme).map_err(|e| copy_err(&readme_path, e))?;
        }

        debug!(path = %dir.display(), "workspace mirrored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stargazer_shared::RepoId;
    use wiremock::matchers::{method, path};
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

    async fn acquirer_for(server: &MockServer, workspace_root: Option<PathBuf>) -> Acquirer {
        let base = Url::parse(&server.uri()).unwrap();
        let docs = DocSource::new(base.clone()).unwrap();
        let feed = StarFeed::new(base.clone(), base, "test-token").unwrap();
        Acquirer::new(docs, feed, workspace_root)
    }

    fn mock_overview() -> Mock {
        Mock::given(method("GET"))
            .and(path("/api/repos/acme/widget/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Widget does X"))
    }

    fn mock_pages() -> Mock {
        Mock::given(method("GET"))
            .and(path("/api/repos/acme/widget/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": [
                    { "name": "Overview.md", "content": "echoed overview" },
                    { "name": "Architecture.md", "content": "modules ..." },
                    { "name": "Usage.md", "content": "how to ..." }
                ]
            })))
    }

    fn mock_readme() -> Mock {
        Mock::given(method("GET"))
            .and(path("/acme/widget/HEAD/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("install via ..."))
    }

    #[tokio::test]
    async fn prepare_assembles_full_workspace() {
        let server = MockServer::start().await;
        mock_overview().mount(&server).await;
        mock_pages().mount(&server).await;
        mock_readme().mount(&server).await;

        let acquirer = acquirer_for(&server, None).await;
        let ws = acquirer.prepare(&repo()).await.unwrap();

        assert_eq!(ws.overview, "Widget does X");
        // Overview echo filtered out of the supplementary set.
        assert_eq!(ws.supplementary.len(), 2);
        assert_eq!(ws.supplementary[0].name, "Architecture.md");
        assert_eq!(ws.readme.as_deref(), Some("install via ..."));
    }

    #[tokio::test]
    async fn missing_overview_is_fatal_with_step() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/repos/acme/widget/overview"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let acquirer = acquirer_for(&server, None).await;
        let err = acquirer.prepare(&repo()).await.unwrap_err();

        match err {
            StargazerError::Acquisition { step, .. } => {
                assert_eq!(step, AcquisitionStep::OverviewFetch);
            }
            other => panic!("expected Acquisition error, got {other}"),
        }
    }

    #[tokio::test]
    async fn empty_overview_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/repos/acme/widget/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
            .mount(&server)
            .await;

        let acquirer = acquirer_for(&server, None).await;
        let err = acquirer.prepare(&repo()).await.unwrap_err();
        assert!(err.to_string().contains("overview_fetch"));
    }

    #[tokio::test]
    async fn missing_supplementary_and_readme_degrade() {
        let server = MockServer::start().await;
        mock_overview().mount(&server).await;
        // pages endpoint and README candidates all 404
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let acquirer = acquirer_for(&server, None).await;
        let ws = acquirer.prepare(&repo()).await.unwrap();

        assert_eq!(ws.overview, "Widget does X");
        assert!(ws.supplementary.is_empty());
        assert!(ws.readme.is_none());
    }

    #[tokio::test]
    async fn workspace_is_mirrored_when_configured() {
        let server = MockServer::start().await;
        mock_overview().mount(&server).await;
        mock_pages().mount(&server).await;
        mock_readme().mount(&server).await;

        let tmp = tempfile::tempdir().unwrap();
        let acquirer = acquirer_for(&server, Some(tmp.path().to_path_buf())).await;
        acquirer.prepare(&repo()).await.unwrap();

        let dir = tmp.path().join("acme_widget");
        assert!(dir.join("overview.md").exists());
        assert!(dir.join("docs/Architecture.md").exists());
        assert!(dir.join("docs/Usage.md").exists());
        assert!(dir.join("README.md").exists());

        let overview = std::fs::read_to_string(dir.join("overview.md")).unwrap();
        assert_eq!(overview, "Widget does X");
    }
}
