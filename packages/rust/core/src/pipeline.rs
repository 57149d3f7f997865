//! Two-stage refinement pipeline.
//!
//! One repository's workspace goes through a fixed state machine:
//! `Fetched -> Drafted -> Finalized -> Persisted`. Stage one condenses the
//! raw overview (plus the upstream README when available) into a draft;
//! stage two polishes the draft against the supplementary pages and emits
//! the final titled document. Any error stops the machine and surfaces with
//! the stage that failed.

use tracing::{debug, info, instrument};

use stargazer_refiner::Refinery;
use stargazer_shared::{RefinementStage, RepositoryRecord, Result, StargazerError, Workspace};
use stargazer_storage::{OutputStore, PersistedDocument};

/// System prompt for the draft stage.
const DRAFT_PROMPT: &str = "\
You are a technical writer. You are given machine-generated documentation \
for a software repository, and possibly its README. Rewrite it into a clear, \
well-structured Markdown article in Chinese that explains what the project \
is, the problems it solves, how it works, and how to get started. Preserve \
factual and technical detail; remove navigation artifacts and boilerplate. \
Output only the article body.";

/// System prompt for the finalize stage. The first line of the response is
/// the document title, followed by a `---` separator and the body.
const FINALIZE_PROMPT: &str = "\
You are an editor. You are given a draft article about a software \
repository, together with supplementary documentation pages. Produce the \
final version: tighten the prose, fold in important details from the \
supplementary pages, and fix structural issues. Respond with a short \
descriptive title on the first line, then a line containing only `---`, \
then the final Markdown body.";

/// Where a pipeline run currently stands. Terminal success is `Persisted`;
/// failures surface as errors rather than a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Fetched,
    Drafted,
    Finalized,
    Persisted,
}

/// Seam over the refinement backend so the pipeline is testable without HTTP.
#[allow(async_fn_in_trait)]
pub trait Refine {
    async fn refine(&self, prompt: &str, context: &str) -> Result<String>;
}

impl Refine for Refinery {
    async fn refine(&self, prompt: &str, context: &str) -> Result<String> {
        Refinery::refine(self, prompt, context).await
    }
}

/// Run the full pipeline for one repository's workspace and persist the
/// resulting document.
#[instrument(skip_all, fields(repo = %repo.full_name()))]
pub async fn run<R: Refine>(
    repo: &RepositoryRecord,
    workspace: &Workspace,
    refiner: &R,
    store: &OutputStore,
) -> Result<PersistedDocument> {
    let mut state = PipelineState::Fetched;
    debug!(?state, "pipeline started");

    let draft_context = build_draft_context(workspace);
    let draft = refiner
        .refine(DRAFT_PROMPT, &draft_context)
        .await
        .map_err(|e| attribute(e, RefinementStage::Draft))?;
    if draft.trim().is_empty() {
        return Err(StargazerError::refinement(
            RefinementStage::Draft,
            "backend produced an empty draft",
        ));
    }
    state = PipelineState::Drafted;
    debug!(?state, draft_len = draft.len(), "draft stage complete");

    let finalize_context = build_finalize_context(&draft, workspace);
    let response = refiner
        .refine(FINALIZE_PROMPT, &finalize_context)
        .await
        .map_err(|e| attribute(e, RefinementStage::Finalize))?;
    let (title, body) = parse_titled_response(&response)?;
    state = PipelineState::Finalized;
    debug!(?state, title, "finalize stage complete");

    let doc = store.write(repo, &title, &body)?;
    state = PipelineState::Persisted;
    info!(?state, path = %doc.path.display(), "pipeline complete");
    Ok(doc)
}

/// Attribute a backend transport error to the stage it interrupted. Errors
/// already carrying a stage pass through unchanged.
fn attribute(err: StargazerError, stage: RefinementStage) -> StargazerError {
    match err {
        StargazerError::Refinement { .. } => err,
        other => StargazerError::refinement(stage, other.to_string()),
    }
}

/// Context for the draft stage: the overview, plus the README when present.
fn build_draft_context(workspace: &Workspace) -> String {
    let mut context = format!("# Overview\n\n{}", workspace.overview);
    if let Some(readme) = &workspace.readme {
        context.push_str("\n\n# Upstream README\n\n");
        context.push_str(readme);
    }
    context
}

/// Context for the finalize stage: the draft followed by every supplementary
/// page under its own heading.
fn build_finalize_context(draft: &str, workspace: &Workspace) -> String {
    let mut context = format!("# Draft\n\n{draft}");
    for doc in &workspace.supplementary {
        context.push_str(&format!("\n\n# {}\n\n{}", doc.name, doc.content));
    }
    context
}

/// Split a finalize response into `(title, body)`.
///
/// The title is the first non-empty line, with any Markdown heading markers
/// stripped. A line containing only `---` separates title from body; without
/// one, everything after the title line is the body. A missing title or an
/// empty body fails the finalize stage.
fn parse_titled_response(response: &str) -> Result<(String, String)> {
    let mut lines = response.lines();

    let title = loop {
        match lines.next() {
            Some(line) if !line.trim().is_empty() => {
                break line.trim().trim_start_matches('#').trim().to_string();
            }
            Some(_) => continue,
            None => {
                return Err(StargazerError::refinement(
                    RefinementStage::Finalize,
                    "backend response has no title line",
                ));
            }
        }
    };

    let rest: Vec<&str> = lines.collect();
    let body_lines = match rest.iter().position(|l| l.trim() == "---") {
        Some(idx) => &rest[idx + 1..],
        None => &rest[..],
    };
    let body = body_lines.join("\n").trim().to_string();

    if body.is_empty() {
        return Err(StargazerError::refinement(
            RefinementStage::Finalize,
            "backend response has no body",
        ));
    }

    Ok((title, body))
}
