//! Community-note decision pipeline.
//!
//! Describes a post and its quoted / replied-to posts, gathers evidence
//! (relevance-filtered conversation replies or a live-search answer), asks an
//! LLM to draft a note or refuse, tags accepted notes, and returns exactly
//! one [`notewriter_core::NoteResult`] per post.

pub mod cancel;
pub mod context;
pub mod drafting;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod relevance;
pub mod sampler;
pub mod tags;
pub mod types;
pub mod validate;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use drafting::{interpret_draft, Draft, NOT_ENOUGH_EVIDENCE, NO_NOTE_NEEDED};
pub use error::PipelineError;
pub use llm::OpenAiChatClient;
pub use pipeline::{Evidence, NoteWriter};
pub use relevance::{RelevanceClassifier, TeiRelevanceClassifier};
pub use tags::{LlmTagClassifier, TagClassifier, TagError};
pub use types::{PipelineConfig, Step};
pub use validate::{validate_note_text, NoteViolation};
