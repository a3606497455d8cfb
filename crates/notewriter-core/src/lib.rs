//! Shared data model, collaborator traits and configuration for the note
//! writer workspace.

pub mod app_config;
pub mod config;
pub mod error;
pub mod notes;
pub mod posts;
pub mod traits;

pub use app_config::{AppConfig, EvidenceSource};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{ConfigError, ReferenceError, UpstreamError};
pub use notes::{MisleadingTag, NoteOutcome, NoteResult, ProposedMisleadingNote, ProposedNote};
pub use posts::{EligiblePost, Media, Post, PostReference, PostWithContext, PHOTO_MEDIA_TYPE};
pub use traits::{ChatCompletion, CommentSource, ImageDescriber, NoteSubmitter, PostSource};
