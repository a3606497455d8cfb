use std::fmt;
use std::time::Duration;

use notewriter_core::AppConfig;

/// One external call inside a pipeline run. Used to name the step that
/// failed, timed out or was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DescribeImage,
    FetchComments,
    ClassifyRelevance,
    LiveSearch,
    DraftNote,
    ClassifyTags,
}

impl Step {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Step::DescribeImage => "describe_image",
            Step::FetchComments => "fetch_comments",
            Step::ClassifyRelevance => "classify_relevance",
            Step::LiveSearch => "live_search",
            Step::DraftNote => "draft_note",
            Step::ClassifyTags => "classify_tags",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning knobs for a [`crate::NoteWriter`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on comments passed to the drafting prompt.
    pub sample_cap: usize,
    /// Upper bound on replies fetched per post.
    pub reply_fetch_limit: usize,
    /// Fewer relevant comments than this short-circuits to a refusal.
    pub min_relevant_comments: usize,
    /// Deadline for each external call. The comment fetch gets at least the
    /// source's own [`notewriter_core::CommentSource::fetch_budget`].
    pub step_timeout: Duration,
    /// Fixed seed for comment sampling; `None` samples from entropy.
    pub sample_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_cap: 300,
            reply_fetch_limit: 300,
            min_relevant_comments: 1,
            step_timeout: Duration::from_secs(300),
            sample_seed: None,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            sample_cap: config.sample_cap,
            reply_fetch_limit: config.reply_fetch_limit,
            min_relevant_comments: config.min_relevant_comments.max(1),
            step_timeout: Duration::from_secs(config.step_timeout_secs),
            sample_seed: config.sample_seed,
        }
    }
}
