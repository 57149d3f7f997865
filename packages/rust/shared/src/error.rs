//! Error types for Stargazer.
//!
//! Library crates use [`StargazerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The variants map directly onto the handling policy of the poll loop:
//! `Discovery` means "no candidates this tick, retry on the next one",
//! `Acquisition`/`Refinement` are terminal for one repository, and
//! `Persistence` is the only failure allowed to abort a whole tick.

use std::path::PathBuf;

/// The acquisition sub-step that failed, recorded in ledger error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStep {
    /// Fetching the required overview document.
    OverviewFetch,
    /// Collecting or mirroring the supplementary documents.
    DocsCopy,
    /// Fetching the upstream README.
    ReadmeFetch,
}

impl AcquisitionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OverviewFetch => "overview_fetch",
            Self::DocsCopy => "docs_copy",
            Self::ReadmeFetch => "readme_fetch",
        }
    }
}

impl std::fmt::Display for AcquisitionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two LLM calls failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementStage {
    /// First call: overview + README → draft.
    Draft,
    /// Second call: draft + supplementary docs → final text + title.
    Finalize,
}

impl RefinementStage {
    /// Failure reason string recorded in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft_generation_failed",
            Self::Finalize => "finalization_failed",
        }
    }
}

impl std::fmt::Display for RefinementStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for all Stargazer operations.
#[derive(Debug, thiserror::Error)]
pub enum StargazerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Starred-repository feed error (transient; retried next poll cycle).
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A required documentation source was unavailable.
    #[error("acquisition error ({step}): {message}")]
    Acquisition {
        step: AcquisitionStep,
        message: String,
    },

    /// One of the two refinement calls failed or returned unusable output.
    #[error("{}: {message}", stage.as_str())]
    Refinement {
        stage: RefinementStage,
        message: String,
    },

    /// Writing the final document or the ledger failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Webhook delivery error. Logged by callers, never escalated.
    #[error("notify error: {0}")]
    Notify(String),

    /// Generic HTTP transport error (LLM backend and other collaborators).
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StargazerError>;

impl StargazerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an acquisition error naming the failing sub-step.
    pub fn acquisition(step: AcquisitionStep, msg: impl Into<String>) -> Self {
        Self::Acquisition {
            step,
            message: msg.into(),
        }
    }

    /// Create a refinement error for the given stage.
    pub fn refinement(stage: RefinementStage, msg: impl Into<String>) -> Self {
        Self::Refinement {
            stage,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
