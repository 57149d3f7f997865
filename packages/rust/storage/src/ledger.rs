//! The repository-processing ledger.
//!
//! One JSON file maps `repo_id` to its last-known processing outcome. Every
//! mutation rewrites the full image to a sibling `.tmp` file and atomically
//! renames it over the previous one, so a crash mid-write can never corrupt
//! the existing ledger. The poll loop reloads the file at the start of every
//! cycle — an operator may delete an entry externally to force reprocessing,
//! and that edit must be observed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stargazer_shared::{
    EntryStatus, LEDGER_SCHEMA_VERSION, LedgerEntry, RepoId, RepositoryRecord, Result,
    StargazerError,
};

/// On-disk shape of the ledger file.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerImage {
    schema_version: u32,
    /// When the last poll cycle finished, for operator visibility.
    #[serde(default)]
    last_sync: Option<DateTime<Utc>>,
    /// Keyed by `repo_id`. BTreeMap keeps the file diff-stable.
    #[serde(default)]
    entries: BTreeMap<String, LedgerEntry>,
}

impl Default for LedgerImage {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION,
            last_sync: None,
            entries: BTreeMap::new(),
        }
    }
}

/// Durable record of repository-processing outcomes.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    image: LedgerImage,
}

impl Ledger {
    /// Load the ledger from disk. A missing file is an empty ledger; a
    /// present-but-unreadable file is an error (never silently start over).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            debug!(path = %path.display(), "no ledger file, starting empty");
            return Ok(Self {
                path,
                image: LedgerImage::default(),
            });
        }

        let content =
            std::fs::read_to_string(&path).map_err(|e| StargazerError::io(&path, e))?;
        let image: LedgerImage = serde_json::from_str(&content).map_err(|e| {
            StargazerError::Persistence(format!("invalid ledger {}: {e}", path.display()))
        })?;

        if image.schema_version != LEDGER_SCHEMA_VERSION {
            return Err(StargazerError::Persistence(format!(
                "unsupported ledger schema_version: {} (expected {LEDGER_SCHEMA_VERSION})",
                image.schema_version
            )));
        }

        debug!(entries = image.entries.len(), "ledger loaded");
        Ok(Self { path, image })
    }

    /// Has this repository reached a terminal state?
    ///
    /// `pending` entries answer false: they mark a run that crashed before
    /// completing and are eligible for reprocessing (at-least-once).
    pub fn has(&self, repo_id: &RepoId) -> bool {
        self.image
            .entries
            .get(repo_id.as_str())
            .is_some_and(|e| e.status != EntryStatus::Pending)
    }

    pub fn get(&self, repo_id: &RepoId) -> Option<&LedgerEntry> {
        self.image.entries.get(repo_id.as_str())
    }

    /// Record that processing of `repo` has started. Durable before the
    /// pipeline runs, so a crash leaves a visible `pending` marker.
    pub fn mark_pending(&mut self, repo: &RepositoryRecord) -> Result<()> {
        let entry = LedgerEntry {
            repo_id: repo.repo_id.clone(),
            repo_name: repo.full_name(),
            status: EntryStatus::Pending,
            attempted_at: Utc::now(),
            completed_at: None,
            output_path: None,
            error_message: None,
        };
        self.image
            .entries
            .insert(repo.repo_id.as_str().to_string(), entry);
        self.write()
    }

    /// Record a successful outcome with the persisted document's path.
    pub fn mark_success(&mut self, repo: &RepositoryRecord, output_path: &Path) -> Result<()> {
        self.finish(
            repo,
            EntryStatus::Success,
            Some(output_path.to_path_buf()),
            None,
        )
    }

    /// Record a failed outcome with the terminal error message.
    pub fn mark_failed(&mut self, repo: &RepositoryRecord, error_message: &str) -> Result<()> {
        self.finish(
            repo,
            EntryStatus::Failed,
            None,
            Some(error_message.to_string()),
        )
    }

    /// Record when the last poll cycle completed.
    pub fn record_sync(&mut self) -> Result<()> {
        self.image.last_sync = Some(Utc::now());
        self.write()
    }

    /// All entries, in stable key order.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.image.entries.values()
    }

    pub fn len(&self) -> usize {
        self.image.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn finish(
        &mut self,
        repo: &RepositoryRecord,
        status: EntryStatus,
        output_path: Option<PathBuf>,
        error_message: Option<String>,
    ) -> Result<()> {
        let key = repo.repo_id.as_str().to_string();
        // Keep the original attempted_at when a pending marker exists.
        let attempted_at = self
            .image
            .entries
            .get(&key)
            .map(|e| e.attempted_at)
            .unwrap_or_else(|| {
                warn!(repo = %repo.full_name(), "terminal outcome without pending marker");
                Utc::now()
            });

        let entry = LedgerEntry {
            repo_id: repo.repo_id.clone(),
            repo_name: repo.full_name(),
            status,
            attempted_at,
            completed_at: Some(Utc::now()),
            output_path,
            error_message,
        };
        self.image.entries.insert(key, entry);
        self.write()
    }

    /// Serialize the full image to `<path>.tmp`, then atomically rename it
    /// over the previous file.
    fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StargazerError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(&self.image)
            .map_err(|e| StargazerError::Persistence(format!("ledger serialization: {e}")))?;

        let temp = temp_path(&self.path);
        std::fs::write(&temp, json).map_err(|e| StargazerError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| StargazerError::io(&self.path, e))?;

        debug!(path = %self.path.display(), entries = self.image.entries.len(), "ledger written");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: &str, full: &str) -> RepositoryRecord {
        let (owner, name) = full.split_once('/').unwrap();
        RepositoryRecord {
            repo_id: RepoId::new(id),
            owner: owner.into(),
            name: name.into(),
            starred_at: Utc::now(),
            description: None,
        }
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(tmp.path().join("ledger.json")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.has(&RepoId::new("1")));
    }

    #[test]
    fn outcomes_survive_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state/ledger.json");

        let mut ledger = Ledger::load(&path).unwrap();
        let widget = repo("1", "acme/widget");
        let gadget = repo("2", "umbrella/gadget");

        ledger.mark_pending(&widget).unwrap();
        ledger
            .mark_success(&widget, Path::new("/docs/acme_widget.md"))
            .unwrap();
        ledger.mark_pending(&gadget).unwrap();
        ledger.mark_failed(&gadget, "overview_fetch: HTTP 404").unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);

        let entry = reloaded.get(&widget.repo_id).unwrap();
        assert_eq!(entry.status, EntryStatus::Success);
        assert_eq!(
            entry.output_path.as_deref(),
            Some(Path::new("/docs/acme_widget.md"))
        );
        assert!(entry.completed_at.is_some());

        let entry = reloaded.get(&gadget.repo_id).unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("overview_fetch: HTTP 404"));
    }

    #[test]
    fn pending_is_not_terminal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(tmp.path().join("ledger.json")).unwrap();
        let widget = repo("1", "acme/widget");

        ledger.mark_pending(&widget).unwrap();
        // A crash after mark_pending leaves the repo eligible for retry.
        assert!(!ledger.has(&widget.repo_id));

        ledger
            .mark_success(&widget, Path::new("/docs/acme_widget.md"))
            .unwrap();
        assert!(ledger.has(&widget.repo_id));
    }

    #[test]
    fn success_keeps_pending_attempt_time() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(tmp.path().join("ledger.json")).unwrap();
        let widget = repo("1", "acme/widget");

        ledger.mark_pending(&widget).unwrap();
        let attempted_at = ledger.get(&widget.repo_id).unwrap().attempted_at;

        ledger.mark_success(&widget, Path::new("/x.md")).unwrap();
        let entry = ledger.get(&widget.repo_id).unwrap();
        assert_eq!(entry.attempted_at, attempted_at);
        assert!(entry.completed_at.unwrap() >= attempted_at);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.json");
        let mut ledger = Ledger::load(&path).unwrap();
        ledger.mark_pending(&repo("1", "acme/widget")).unwrap();

        assert!(path.exists());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn stale_temp_file_does_not_affect_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.json");

        let mut ledger = Ledger::load(&path).unwrap();
        let widget = repo("1", "acme/widget");
        ledger.mark_pending(&widget).unwrap();
        ledger.mark_success(&widget, Path::new("/x.md")).unwrap();

        // Simulate a crash between "write temp" and "rename": a garbage temp
        // file sits next to a valid ledger.
        std::fs::write(temp_path(&path), "{ not json").unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert!(reloaded.has(&widget.repo_id));

        // The next mutation replaces the garbage temp and stays consistent.
        let mut reloaded = reloaded;
        reloaded.mark_pending(&repo("2", "umbrella/gadget")).unwrap();
        let again = Ledger::load(&path).unwrap();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn corrupted_ledger_is_an_error_not_a_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.json");
        std::fs::write(&path, "{ definitely not a ledger").unwrap();

        let err = Ledger::load(&path).unwrap_err();
        assert!(matches!(err, StargazerError::Persistence(_)));
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.json");
        std::fs::write(
            &path,
            r#"{ "schema_version": 99, "entries": {} }"#,
        )
        .unwrap();

        let err = Ledger::load(&path).unwrap_err();
        assert!(err.to_string().contains("schema_version"));
    }

    #[test]
    fn record_sync_persists_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ledger.json");

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.record_sync().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("last_sync"));
    }
}
