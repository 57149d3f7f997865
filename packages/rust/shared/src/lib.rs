//! Shared types, error model, and configuration for Stargazer.
//!
//! This crate is the foundation depended on by all other Stargazer crates.
//! It provides:
//! - [`StargazerError`] — the unified error type
//! - Domain types ([`RepositoryRecord`], [`LedgerEntry`], [`Workspace`], [`DocumentMeta`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DeepWikiConfig, DefaultsConfig, FeishuConfig, GitHubConfig, OpenRouterConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
    validate_credentials,
};
pub use error::{AcquisitionStep, RefinementStage, Result, StargazerError};
pub use types::{
    DocumentMeta, EntryStatus, LEDGER_SCHEMA_VERSION, LedgerEntry, NamedDoc, RepoId,
    RepositoryRecord, Workspace, sanitize_filename,
};
