//! Core domain types for the Stargazer processing loop.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version for the on-disk ledger format.
pub const LEDGER_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RepoId
// ---------------------------------------------------------------------------

/// Stable unique identifier for a repository (the numeric GitHub id,
/// kept as a string so the ledger key format never depends on integer width).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub String);

impl RepoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RepoId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// RepositoryRecord
// ---------------------------------------------------------------------------

/// One starred repository as reported by the discovery source.
/// Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Stable unique identifier.
    pub repo_id: RepoId,
    /// Owning user or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// When the repository was starred; drives discovery ordering.
    pub starred_at: DateTime<Utc>,
    /// Upstream description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RepositoryRecord {
    /// `owner/name`, the human-facing repository identity.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

/// Terminal (or in-flight) outcome of one repository's processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Processing started but has not reached a terminal state.
    /// A `pending` entry left behind by a crash is eligible for reprocessing.
    Pending,
    /// Final document persisted; never revisited by the poll loop.
    Success,
    /// Pipeline failed; not retried automatically — the operator deletes the
    /// entry to force reprocessing.
    Failed,
}

/// One row per repository ever attempted, keyed by [`RepoId`] in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub repo_id: RepoId,
    /// `owner/name`, kept for operator readability of the ledger file.
    pub repo_name: String,
    pub status: EntryStatus,
    pub attempted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Set only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// A named document blob from the docs source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedDoc {
    pub name: String,
    pub content: String,
}

/// Ephemeral per-repository working set assembled by the acquisition stage
/// and consumed by the refinement pipeline. Discarded after the run.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Required overview document.
    pub overview: String,
    /// Best-effort supplementary documents, order preserved.
    pub supplementary: Vec<NamedDoc>,
    /// Best-effort upstream README; absence is not fatal.
    pub readme: Option<String>,
}

// ---------------------------------------------------------------------------
// DocumentMeta
// ---------------------------------------------------------------------------

/// Sidecar metadata written next to each persisted final document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Short LLM-generated title.
    pub title: String,
    pub repo_id: RepoId,
    /// `owner/name`.
    pub repo_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the persisted markdown file.
    pub content_sha256: String,
    pub size_bytes: usize,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replace characters that are unsafe in file names with `_`.
///
/// Applied to owner/name segments and generated titles before they are used
/// in output paths, so repository identity maps to a deterministic path.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_path_separators() {
        assert_eq!(sanitize_filename("acme/widget"), "acme_widget");
        assert_eq!(sanitize_filename("a<b>:c"), "a_b__c");
        assert_eq!(sanitize_filename("plain-name_1.md"), "plain-name_1.md");
        // Non-ASCII alphanumerics are kept (titles may be CJK).
        assert_eq!(sanitize_filename("Widget 工具"), "Widget_工具");
    }

    #[test]
    fn repo_id_from_numeric() {
        let id = RepoId::from(123_456_u64);
        assert_eq!(id.as_str(), "123456");
        assert_eq!(id.to_string(), "123456");
    }

    #[test]
    fn repository_record_full_name() {
        let repo = RepositoryRecord {
            repo_id: RepoId::new("1"),
            owner: "acme".into(),
            name: "widget".into(),
            starred_at: Utc::now(),
            description: Some("Widget does X".into()),
        };
        assert_eq!(repo.full_name(), "acme/widget");
    }

    #[test]
    fn entry_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EntryStatus::Success).unwrap(),
            r#""success""#
        );
        assert_eq!(
            serde_json::to_string(&EntryStatus::Failed).unwrap(),
            r#""failed""#
        );
        let parsed: EntryStatus = serde_json::from_str(r#""pending""#).unwrap();
        assert_eq!(parsed, EntryStatus::Pending);
    }

    #[test]
    fn ledger_entry_roundtrip() {
        let entry = LedgerEntry {
            repo_id: RepoId::new("42"),
            repo_name: "acme/widget".into(),
            status: EntryStatus::Success,
            attempted_at: Utc::now(),
            completed_at: Some(Utc::now()),
            output_path: Some(PathBuf::from("/docs/acme_widget.md")),
            error_message: None,
        };

        let json = serde_json::to_string_pretty(&entry).unwrap();
        let parsed: LedgerEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.repo_id, entry.repo_id);
        assert_eq!(parsed.status, EntryStatus::Success);
        assert!(parsed.error_message.is_none());
        // Nullable fields are omitted, not serialized as null.
        assert!(!json.contains("error_message"));
    }

    #[test]
    fn document_meta_roundtrip() {
        let meta = DocumentMeta {
            title: "Widget 工具".into(),
            repo_id: RepoId::new("42"),
            repo_name: "acme/widget".into(),
            description: None,
            generated_at: Utc::now(),
            content_sha256: "ab".repeat(32),
            size_bytes: 1024,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let parsed: DocumentMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.title, "Widget 工具");
        assert_eq!(parsed.size_bytes, 1024);
    }
}
