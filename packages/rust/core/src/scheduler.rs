//! The poll loop.
//!
//! Each cycle reloads the ledger, lists recently starred repositories, and
//! runs the pipeline for every candidate without a terminal ledger entry.
//! A failure in one repository never affects the others; a failure of the
//! whole cycle (discovery down, ledger unreadable) is logged and retried on
//! the next cycle. Only startup configuration errors stop the loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use stargazer_acquisition::Acquirer;
use stargazer_discovery::StarFeed;
use stargazer_notify::Notifier;
use stargazer_shared::{RepositoryRecord, Result, Workspace};
use stargazer_storage::{Ledger, OutputStore};

use crate::pipeline::{self, Refine};

/// Bounded retries for ledger writes after a pipeline outcome. Losing the
/// outcome record would re-run completed work, so a transient write failure
/// is worth a few attempts before giving up on the cycle.
const LEDGER_WRITE_ATTEMPTS: u32 = 3;
const LEDGER_WRITE_RETRY_DELAY: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Source of starred-repository candidates.
#[allow(async_fn_in_trait)]
pub trait StarSource {
    async fn list_recent_stars(&self, limit: u32) -> Result<Vec<RepositoryRecord>>;
}

impl StarSource for StarFeed {
    async fn list_recent_stars(&self, limit: u32) -> Result<Vec<RepositoryRecord>> {
        StarFeed::list_recent_stars(self, limit).await
    }
}

/// Assembles the document workspace for one repository.
#[allow(async_fn_in_trait)]
pub trait WorkspaceSource {
    async fn prepare(&self, repo: &RepositoryRecord) -> Result<Workspace>;
}

impl WorkspaceSource for Acquirer {
    async fn prepare(&self, repo: &RepositoryRecord) -> Result<Workspace> {
        Acquirer::prepare(self, repo).await
    }
}

/// Terminal-outcome notifications. Best effort; implementations never fail.
#[allow(async_fn_in_trait)]
pub trait Notify {
    async fn notify_success(&self, repo: &RepositoryRecord, title: &str, file_path: &Path);
    async fn notify_failure(&self, repo: &RepositoryRecord, error_message: &str);
}

impl Notify for Notifier {
    async fn notify_success(&self, repo: &RepositoryRecord, title: &str, file_path: &Path) {
        Notifier::notify_success(self, repo, title, file_path).await;
    }

    async fn notify_failure(&self, repo: &RepositoryRecord, error_message: &str) {
        Notifier::notify_failure(self, repo, error_message).await;
    }
}

// ---------------------------------------------------------------------------
// Configuration and reporting
// ---------------------------------------------------------------------------

/// Runtime settings for the poll loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// How many recent stars to consider per cycle.
    pub star_limit: u32,
    pub ledger_path: PathBuf,
    pub output_dir: PathBuf,
}

/// The scheduler's collaborators, injected at the seams above.
pub struct Deps<S, W, R, N> {
    pub stars: S,
    pub workspaces: W,
    pub refiner: R,
    pub notifier: N,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Candidates returned by discovery.
    pub discovered: usize,
    /// Candidates with an existing terminal ledger entry.
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run poll cycles forever. Cycle-level errors are logged and the loop
/// continues; it only returns if the runtime is shutting down.
pub async fn run_loop<S, W, R, N>(deps: &Deps<S, W, R, N>, config: &SchedulerConfig) -> Result<()>
where
    S: StarSource,
    W: WorkspaceSource,
    R: Refine,
    N: Notify,
{
    info!(
        interval_secs = config.poll_interval.as_secs(),
        star_limit = config.star_limit,
        "poll loop started"
    );

    let mut cycle: u64 = 0;
    loop {
        cycle += 1;
        match run_once(deps, config).await {
            Ok(report) => info!(
                cycle,
                discovered = report.discovered,
                skipped = report.skipped,
                succeeded = report.succeeded,
                failed = report.failed,
                "poll cycle complete"
            ),
            Err(e) => error!(cycle, error = %e, "poll cycle failed"),
        }

        debug!(secs = config.poll_interval.as_secs(), "sleeping until next cycle");
        tokio::time::sleep(config.poll_interval).await;
    }
}

/// Run exactly one poll cycle.
///
/// The ledger is reloaded from disk here so external edits (an operator
/// deleting an entry to force reprocessing) take effect on the next cycle.
#[instrument(skip_all)]
pub async fn run_once<S, W, R, N>(
    deps: &Deps<S, W, R, N>,
    config: &SchedulerConfig,
) -> Result<TickReport>
where
    S: StarSource,
    W: WorkspaceSource,
    R: Refine,
    N: Notify,
{
    let mut ledger = Ledger::load(&config.ledger_path)?;
    let store = OutputStore::new(&config.output_dir);
    let mut report = TickReport::default();

    let candidates = match deps.stars.list_recent_stars(config.star_limit).await {
        Ok(candidates) => candidates,
        Err(e) => {
            // Discovery outages are transient; the next cycle retries.
            warn!(error = %e, "star discovery failed, retrying next cycle");
            return Ok(report);
        }
    };
    report.discovered = candidates.len();

    for repo in &candidates {
        if ledger.has(&repo.repo_id) {
            debug!(repo = %repo.full_name(), "already processed, skipping");
            report.skipped += 1;
            continue;
        }

        info!(repo = %repo.full_name(), "processing starred repository");
        ledger.mark_pending(repo)?;

        match process_one(deps, repo, &store).await {
            Ok((title, path)) => {
                record_outcome(&mut ledger, |l| l.mark_success(repo, &path)).await?;
                deps.notifier.notify_success(repo, &title, &path).await;
                report.succeeded += 1;
            }
            Err(e) => {
                let message = e.to_string();
                error!(repo = %repo.full_name(), error = %message, "processing failed");
                record_outcome(&mut ledger, |l| l.mark_failed(repo, &message)).await?;
                deps.notifier.notify_failure(repo, &message).await;
                report.failed += 1;
            }
        }
    }

    if let Err(e) = ledger.record_sync() {
        // Informational timestamp only; the outcome entries are already durable.
        warn!(error = %e, "failed to record sync timestamp");
    }

    Ok(report)
}

/// Acquire the workspace and run the pipeline for one repository.
async fn process_one<S, W, R, N>(
    deps: &Deps<S, W, R, N>,
    repo: &RepositoryRecord,
    store: &OutputStore,
) -> Result<(String, PathBuf)>
where
    W: WorkspaceSource,
    R: Refine,
{
    let workspace = deps.workspaces.prepare(repo).await?;
    let doc = pipeline::run(repo, &workspace, &deps.refiner, store).await?;
    Ok((doc.meta.title, doc.path))
}

/// Persist a terminal outcome with bounded retries. An outcome that cannot
/// be written after retries fails the cycle: continuing would risk
/// re-running work the ledger never learned about.
async fn record_outcome<F>(ledger: &mut Ledger, mut write: F) -> Result<()>
where
    F: FnMut(&mut Ledger) -> Result<()>,
{
    let mut last_err = None;
    for attempt in 1..=LEDGER_WRITE_ATTEMPTS {
        match write(ledger) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, error = %e, "ledger write failed");
                last_err = Some(e);
                if attempt < LEDGER_WRITE_ATTEMPTS {
                    tokio::time::sleep(LEDGER_WRITE_RETRY_DELAY).await;
                }
            }
        }
    }
    // Loop above always sets last_err before falling through.
    Err(last_err.unwrap_or_else(|| {
        stargazer_shared::StargazerError::Persistence("ledger write failed".into())
    }))
}
