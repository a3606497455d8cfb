//! Note-writing pipeline orchestration.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use notewriter_core::{
    ChatCompletion, CommentSource, EligiblePost, EvidenceSource, ImageDescriber, NoteResult,
    PostWithContext, ProposedMisleadingNote, UpstreamError,
};

use crate::cancel::{guarded, Cancellation};
use crate::context::describe_context;
use crate::drafting::{
    interpret_draft, live_search_prompt, no_evidence_refusal, note_writing_prompt, Draft,
    LIVE_SEARCH_SYSTEM_PROMPT, NOTE_WRITER_SYSTEM_PROMPT,
};
use crate::error::PipelineError;
use crate::relevance::RelevanceClassifier;
use crate::sampler::{sample_comments, sampler_rng};
use crate::tags::{dedupe_tags, TagClassifier, TagError};
use crate::types::{PipelineConfig, Step};

/// Where drafting evidence comes from.
#[derive(Clone)]
pub enum Evidence {
    /// Conversation replies, filtered for relevance and sampled.
    Comments {
        source: Arc<dyn CommentSource>,
        relevance: Arc<dyn RelevanceClassifier>,
    },
    /// A research answer from the chat model's live search.
    LiveSearch,
}

impl Evidence {
    #[must_use]
    pub fn source(&self) -> EvidenceSource {
        match self {
            Evidence::Comments { .. } => EvidenceSource::Comments,
            Evidence::LiveSearch => EvidenceSource::LiveSearch,
        }
    }
}

enum Decision {
    Noted(ProposedMisleadingNote),
    Refused(String),
}

/// Turns one post into exactly one [`NoteResult`].
///
/// Holds only shared, reentrant collaborators; clone the `Arc` and call
/// [`NoteWriter::write_note`] from as many tasks as needed.
pub struct NoteWriter {
    config: PipelineConfig,
    evidence: Evidence,
    describer: Arc<dyn ImageDescriber>,
    chat: Arc<dyn ChatCompletion>,
    tags: Arc<dyn TagClassifier>,
}

impl NoteWriter {
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        evidence: Evidence,
        describer: Arc<dyn ImageDescriber>,
        chat: Arc<dyn ChatCompletion>,
        tags: Arc<dyn TagClassifier>,
    ) -> Self {
        Self {
            config,
            evidence,
            describer,
            chat,
            tags,
        }
    }

    /// Validate `eligible`'s references, then run the pipeline.
    ///
    /// A malformed reference list (two quoted posts, two replied-to posts, or
    /// an unknown reference type) yields an `error` result carrying the bare
    /// post.
    pub async fn write_note(&self, eligible: EligiblePost, cancel: &Cancellation) -> NoteResult {
        let bare = PostWithContext::new(eligible.post.clone());
        match PostWithContext::assemble(eligible.post, eligible.references) {
            Ok(context) => self.write_note_for_context(context, cancel).await,
            Err(e) => {
                let err = PipelineError::from(e);
                tracing::warn!(post_id = %bare.post.id, error = %err, "note run failed");
                NoteResult::failed(bare, err.to_string(), None)
            }
        }
    }

    /// Run the pipeline for an already-assembled context.
    ///
    /// 1. Reject unsupported media before any external call.
    /// 2. Caption photos and render the context description.
    /// 3. Gather evidence: fetch, filter and sample comments, or live search.
    /// 4. Draft; a refusal sentinel ends the run as a refusal.
    /// 5. Tag the accepted note.
    pub async fn write_note_for_context(
        &self,
        context: PostWithContext,
        cancel: &Cancellation,
    ) -> NoteResult {
        let post_id = context.post.id.clone();

        let description = match describe_context(
            &context,
            self.describer.as_ref(),
            self.config.step_timeout,
            cancel,
        )
        .await
        {
            Ok(description) => description,
            Err(err) => {
                tracing::warn!(post_id = %post_id, error = %err, "note run failed");
                return NoteResult::failed(context, err.to_string(), None);
            }
        };

        match self.decide(&context, &description, cancel).await {
            Ok(Decision::Noted(note)) => {
                tracing::info!(
                    post_id = %post_id,
                    tags = ?note.misleading_tags,
                    "note drafted"
                );
                NoteResult::noted(context, note, description)
            }
            Ok(Decision::Refused(refusal)) => {
                tracing::info!(post_id = %post_id, refusal = %refusal, "note refused");
                NoteResult::refused(context, refusal, description)
            }
            Err(err) => {
                tracing::warn!(post_id = %post_id, error = %err, "note run failed");
                NoteResult::failed(context, err.to_string(), Some(description))
            }
        }
    }

    async fn decide(
        &self,
        context: &PostWithContext,
        description: &str,
        cancel: &Cancellation,
    ) -> Result<Decision, PipelineError> {
        let post_id = context.post.id.as_str();

        let evidence = match &self.evidence {
            Evidence::Comments { source, relevance } => {
                let limit = self.config.reply_fetch_limit;
                let fetch_timeout = source
                    .fetch_budget(limit)
                    .map_or(self.config.step_timeout, |budget| {
                        budget.max(self.config.step_timeout)
                    });
                let comments = self
                    .call_within(
                        Step::FetchComments,
                        fetch_timeout,
                        cancel,
                        source.fetch_comments(post_id, limit),
                    )
                    .await?;
                let fetched = comments.len();
                let relevant = self
                    .call(
                        Step::ClassifyRelevance,
                        cancel,
                        relevance.filter(&context.post.text, comments),
                    )
                    .await?;

                if relevant.is_empty() || relevant.len() < self.config.min_relevant_comments {
                    tracing::debug!(
                        post_id,
                        fetched,
                        relevant = relevant.len(),
                        "not enough relevant comments"
                    );
                    return Ok(Decision::Refused(no_evidence_refusal()));
                }

                let mut rng = sampler_rng(self.config.sample_seed, post_id);
                let sampled = sample_comments(relevant, self.config.sample_cap, &mut rng);
                tracing::debug!(post_id, fetched, sampled = sampled.len(), "sampled evidence");
                sampled.join("\n")
            }
            Evidence::LiveSearch => {
                self.call(
                    Step::LiveSearch,
                    cancel,
                    self.chat
                        .complete(LIVE_SEARCH_SYSTEM_PROMPT, &[live_search_prompt(description)]),
                )
                .await?
            }
        };

        let prompt = note_writing_prompt(description, &evidence, self.evidence.source());
        let raw = self
            .call(
                Step::DraftNote,
                cancel,
                self.chat.complete(NOTE_WRITER_SYSTEM_PROMPT, &[prompt]),
            )
            .await?;

        let note_text = match interpret_draft(raw) {
            Draft::Refusal(refusal) => return Ok(Decision::Refused(refusal)),
            Draft::Note(text) => text,
        };

        let tags = guarded(
            Step::ClassifyTags,
            self.config.step_timeout,
            cancel,
            self.tags.infer_tags(description, &note_text),
        )
        .await?
        .map_err(|e| match e {
            TagError::Upstream(source) => PipelineError::Upstream {
                step: Step::ClassifyTags,
                source,
            },
            TagError::Invalid(reason) => PipelineError::InvalidTagSet(reason),
        })?;

        let tags = dedupe_tags(tags);
        if tags.is_empty() {
            return Err(PipelineError::InvalidTagSet(
                "tag classifier returned no tags".to_owned(),
            ));
        }

        Ok(Decision::Noted(ProposedMisleadingNote::new(
            post_id, note_text, tags,
        )))
    }

    async fn call<T, F>(&self, step: Step, cancel: &Cancellation, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        self.call_within(step, self.config.step_timeout, cancel, fut)
            .await
    }

    async fn call_within<T, F>(
        &self,
        step: Step,
        timeout: Duration,
        cancel: &Cancellation,
        fut: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        guarded(step, timeout, cancel, fut)
            .await?
            .map_err(|source| PipelineError::Upstream { step, source })
    }
}
