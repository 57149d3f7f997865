//! Orchestration core: the refinement pipeline and the poll loop.
//!
//! [`pipeline`] drives one repository's workspace through the two-stage
//! refinement state machine; [`scheduler`] is the top-level loop that
//! discovers candidates, isolates per-repository failures, and keeps the
//! ledger consistent.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{PipelineState, Refine};
pub use scheduler::{Deps, Notify, SchedulerConfig, StarSource, TickReport, WorkspaceSource};
