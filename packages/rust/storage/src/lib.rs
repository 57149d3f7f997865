//! Durable state for Stargazer.
//!
//! Two concerns live here:
//! - [`Ledger`] — the single source of truth for "has this repository been
//!   handled", persisted with atomic replace-on-write
//! - [`OutputStore`] — final documents plus their metadata sidecars at
//!   deterministic paths keyed by repository identity

pub mod ledger;
pub mod output;

pub use ledger::Ledger;
pub use output::{OutputStore, PersistedDocument};
