//! `eligible` and `run` command handlers.

use std::io::Write;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use notewriter_core::{AppConfig, NoteOutcome, NoteResult, NoteSubmitter, PostSource};
use notewriter_pipeline::{cancellation, validate_note_text, Cancellation, NoteWriter};
use notewriter_xapi::XurlSubmitter;

use crate::wiring::{build_note_writer, build_x_client};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RunOptions {
    pub max_results: u32,
    pub test_mode: bool,
    pub submit: bool,
}

/// What happened to a drafted note at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitOutcome {
    Submitted,
    Skipped,
    Failed,
}

/// Per-outcome counts printed at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub noted: usize,
    pub refused: usize,
    pub errored: usize,
    pub submitted: usize,
    pub submit_skipped: usize,
    pub submit_failed: usize,
}

impl RunSummary {
    pub(crate) fn record(&mut self, result: &NoteResult, submission: Option<SubmitOutcome>) {
        match result.outcome {
            NoteOutcome::Note(_) => self.noted += 1,
            NoteOutcome::Refusal(_) => self.refused += 1,
            NoteOutcome::Error(_) => self.errored += 1,
        }
        match submission {
            Some(SubmitOutcome::Submitted) => self.submitted += 1,
            Some(SubmitOutcome::Skipped) => self.submit_skipped += 1,
            Some(SubmitOutcome::Failed) => self.submit_failed += 1,
            None => {}
        }
    }
}

/// Knobs for one [`run_batch`].
pub(crate) struct Batch<'a> {
    pub max_results: u32,
    pub test_mode: bool,
    pub max_concurrent: usize,
    /// Accepted notes are submitted only when this is set.
    pub submitter: Option<&'a dyn NoteSubmitter>,
}

pub(crate) async fn run_eligible(
    config: &AppConfig,
    max_results: u32,
    test_mode: bool,
) -> anyhow::Result<()> {
    let source: Arc<dyn PostSource> = build_x_client(config)?;
    let posts = source.fetch_eligible(max_results, test_mode).await?;

    let mut out = std::io::stdout().lock();
    for post in &posts {
        writeln!(out, "{}", serde_json::to_string(post)?)?;
    }
    Ok(())
}

/// Fetch eligible posts, run the pipeline over them with bounded
/// concurrency, print each result as a JSON line and optionally submit
/// accepted notes.
///
/// Ctrl-C cancels in-flight runs; they still print, as `error` results.
///
/// # Errors
///
/// Returns an error if collaborators cannot be built or the eligible-posts
/// fetch fails. Per-post failures are reported in their results.
pub(crate) async fn run_notes(config: &AppConfig, options: RunOptions) -> anyhow::Result<()> {
    let x_client = build_x_client(config)?;
    let writer = build_note_writer(config, x_client.clone())?;
    let source: Arc<dyn PostSource> = x_client;
    let submitter = XurlSubmitter::new(config.xurl_bin.clone());

    let (cancel_handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received ctrl-c, cancelling in-flight posts");
            cancel_handle.cancel();
        }
    });

    let batch = Batch {
        max_results: options.max_results,
        test_mode: options.test_mode,
        max_concurrent: config.max_concurrent_posts,
        submitter: options.submit.then_some(&submitter as &dyn NoteSubmitter),
    };
    let mut out = std::io::stdout().lock();
    let summary = run_batch(source.as_ref(), &writer, &batch, &cancel, &mut out).await?;

    writeln!(out, "{}", format_summary(&summary))?;
    Ok(())
}

/// Pull work from `source`, run each post through `writer` and, when the
/// batch has a submitter, submit its accepted note from the same task so
/// other posts keep progressing. Writes one JSON line per result to `out`.
///
/// # Errors
///
/// Returns an error if the eligible-posts fetch or writing to `out` fails.
pub(crate) async fn run_batch(
    source: &dyn PostSource,
    writer: &NoteWriter,
    batch: &Batch<'_>,
    cancel: &Cancellation,
    out: &mut impl Write,
) -> anyhow::Result<RunSummary> {
    let posts = source.fetch_eligible(batch.max_results, batch.test_mode).await?;
    tracing::info!(
        count = posts.len(),
        test_mode = batch.test_mode,
        "running note writer"
    );

    let mut results = stream::iter(posts)
        .map(|post| async move {
            let result = writer.write_note(post, cancel).await;
            let submission = match batch.submitter {
                Some(submitter) => submit_if_valid(submitter, &result, batch.test_mode, cancel).await,
                None => None,
            };
            (result, submission)
        })
        .buffer_unordered(batch.max_concurrent.max(1));

    let mut summary = RunSummary::default();
    while let Some((result, submission)) = results.next().await {
        summary.record(&result, submission);
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
    }
    Ok(summary)
}

/// `None` when the result carries no note.
async fn submit_if_valid(
    submitter: &dyn NoteSubmitter,
    result: &NoteResult,
    test_mode: bool,
    cancel: &Cancellation,
) -> Option<SubmitOutcome> {
    let note = result.note()?;
    if cancel.is_cancelled() {
        return Some(SubmitOutcome::Skipped);
    }

    let violations = validate_note_text(note.note_text());
    if !violations.is_empty() {
        let reasons: Vec<String> = violations.iter().map(ToString::to_string).collect();
        tracing::warn!(
            post_id = note.post_id(),
            violations = %reasons.join("; "),
            "drafted note failed validation; not submitting"
        );
        return Some(SubmitOutcome::Skipped);
    }

    match submitter.submit(note, test_mode).await {
        Ok(response) => {
            tracing::debug!(post_id = note.post_id(), response = %response, "submission response");
            Some(SubmitOutcome::Submitted)
        }
        Err(e) => {
            tracing::error!(post_id = note.post_id(), error = %e, "note submission failed");
            Some(SubmitOutcome::Failed)
        }
    }
}

pub(crate) fn format_summary(summary: &RunSummary) -> String {
    format!(
        "noted={} refused={} errored={} submitted={} submit_skipped={} submit_failed={}",
        summary.noted,
        summary.refused,
        summary.errored,
        summary.submitted,
        summary.submit_skipped,
        summary.submit_failed
    )
}
