//! Final-document output store.
//!
//! One markdown file per successfully processed repository at a path derived
//! from `(owner, name)`, plus a JSON metadata sidecar. Paths are
//! deterministic, so re-running a repository overwrites its previous output
//! with content-equivalent files — idempotent by construction.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use stargazer_shared::{
    DocumentMeta, RepositoryRecord, Result, StargazerError, sanitize_filename,
};

/// A successfully persisted final document.
#[derive(Debug, Clone)]
pub struct PersistedDocument {
    /// Path of the markdown file.
    pub path: PathBuf,
    /// Path of the JSON sidecar.
    pub meta_path: PathBuf,
    pub meta: DocumentMeta,
}

/// Filesystem store for final documents.
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Deterministic document path for a repository: `<root>/<owner>_<name>.md`.
    pub fn document_path(&self, repo: &RepositoryRecord) -> PathBuf {
        self.root
            .join(format!("{}.md", sanitize_filename(&repo.full_name())))
    }

    /// Write the final document and its sidecar. Both files are written to a
    /// temp sibling and atomically renamed into place; an existing document
    /// at the same path is overwritten.
    pub fn write(
        &self,
        repo: &RepositoryRecord,
        title: &str,
        body: &str,
    ) -> Result<PersistedDocument> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| StargazerError::io(&self.root, e))?;

        let path = self.document_path(repo);
        let meta_path = path.with_extension("json");
        let generated_at = Utc::now();

        let content = format!(
            "---\ntitle: {title}\nrepo: {repo_name}\ngenerated_at: {ts}\n---\n\n{body}",
            repo_name = repo.full_name(),
            ts = generated_at.to_rfc3339(),
        );

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let content_sha256 = format!("{:x}", hasher.finalize());

        let meta = DocumentMeta {
            title: title.to_string(),
            repo_id: repo.repo_id.clone(),
            repo_name: repo.full_name(),
            description: repo.description.clone(),
            generated_at,
            content_sha256,
            size_bytes: content.len(),
        };

        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StargazerError::Persistence(format!("sidecar serialization: {e}")))?;

        write_atomic(&path, content.as_bytes())?;
        write_atomic(&meta_path, meta_json.as_bytes())?;

        info!(path = %path.display(), bytes = meta.size_bytes, "final document persisted");
        Ok(PersistedDocument {
            path,
            meta_path,
            meta,
        })
    }
}

/// Write to a temp sibling, then atomically rename over the target.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    let temp = path.with_file_name(name);

    std::fs::write(&temp, content).map_err(|e| StargazerError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| StargazerError::io(path, e))?;

    debug!(path = %path.display(), "wrote file");
    Ok(())
}
