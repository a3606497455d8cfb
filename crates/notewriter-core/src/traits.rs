//! Collaborator interfaces consumed by the note-writing pipeline.
//!
//! Every external system the pipeline talks to sits behind one of these
//! traits so that concrete clients are injected (usually as `Arc<dyn _>`) and
//! tests can substitute deterministic stubs. Implementations must be
//! reentrant: one instance is shared by every concurrently running pipeline.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::notes::ProposedMisleadingNote;
use crate::posts::EligiblePost;

/// Source of work items: posts currently eligible for notes.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_eligible(
        &self,
        max_results: u32,
        test_mode: bool,
    ) -> Result<Vec<EligiblePost>, UpstreamError>;
}

/// Conversation replies for a post, used as candidate fact-check evidence.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch up to `limit` comment texts for `post_id`.
    async fn fetch_comments(&self, post_id: &str, limit: usize)
        -> Result<Vec<String>, UpstreamError>;

    /// Longest one `fetch_comments(_, limit)` call may run while the source
    /// waits out rate limits itself. The pipeline never cuts the call off
    /// before this. `None` means the source does not wait internally.
    fn fetch_budget(&self, _limit: usize) -> Option<Duration> {
        None
    }
}

/// Captions an image by URL.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe_image(&self, url: &str) -> Result<String, UpstreamError>;
}

/// A chat-completion LLM.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send one system prompt plus the user content parts and return the
    /// assistant's text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &[String],
    ) -> Result<String, UpstreamError>;
}

/// Publishes an accepted note.
#[async_trait]
pub trait NoteSubmitter: Send + Sync {
    async fn submit(
        &self,
        note: &ProposedMisleadingNote,
        test_mode: bool,
    ) -> Result<serde_json::Value, UpstreamError>;
}
