use notewriter_core::{ReferenceError, UpstreamError};
use thiserror::Error;

use crate::types::Step;

/// Why a pipeline run ended in the `error` outcome. The `Display` text is
/// what lands in `NoteResult::error`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unsupported media type ({media_type}) found in post or in referenced post {post_id}")]
    UnsupportedMedia { post_id: String, media_type: String },

    #[error("malformed post references: {0}")]
    MalformedReference(#[from] ReferenceError),

    #[error("invalid misleading tag set: {0}")]
    InvalidTagSet(String),

    #[error("{step} failed: {source}")]
    Upstream {
        step: Step,
        #[source]
        source: UpstreamError,
    },

    #[error("{step} timed out after {after_secs}s")]
    TimedOut { step: Step, after_secs: u64 },

    #[error("cancelled during {step}")]
    Cancelled { step: Step },
}
