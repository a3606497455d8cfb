use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::posts::PostWithContext;

/// Why a post is misleading. Closed set: unknown names fail to parse and
/// fail to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisleadingTag {
    FactualError,
    ManipulatedMedia,
    OutdatedInformation,
    MissingImportantContext,
    DisputedClaimAsFact,
    MisinterpretedSatire,
    Other,
}

impl MisleadingTag {
    pub const ALL: [MisleadingTag; 7] = [
        MisleadingTag::FactualError,
        MisleadingTag::ManipulatedMedia,
        MisleadingTag::OutdatedInformation,
        MisleadingTag::MissingImportantContext,
        MisleadingTag::DisputedClaimAsFact,
        MisleadingTag::MisinterpretedSatire,
        MisleadingTag::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MisleadingTag::FactualError => "factual_error",
            MisleadingTag::ManipulatedMedia => "manipulated_media",
            MisleadingTag::OutdatedInformation => "outdated_information",
            MisleadingTag::MissingImportantContext => "missing_important_context",
            MisleadingTag::DisputedClaimAsFact => "disputed_claim_as_fact",
            MisleadingTag::MisinterpretedSatire => "misinterpreted_satire",
            MisleadingTag::Other => "other",
        }
    }
}

impl fmt::Display for MisleadingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MisleadingTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MisleadingTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown misleading tag: {s}"))
    }
}

fn default_trustworthy_sources() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedNote {
    pub post_id: String,
    pub note_text: String,
    #[serde(default = "default_trustworthy_sources")]
    pub trustworthy_sources: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedMisleadingNote {
    #[serde(flatten)]
    pub note: ProposedNote,
    pub misleading_tags: Vec<MisleadingTag>,
}

impl ProposedMisleadingNote {
    #[must_use]
    pub fn new(post_id: &str, note_text: String, misleading_tags: Vec<MisleadingTag>) -> Self {
        Self {
            note: ProposedNote {
                post_id: post_id.to_owned(),
                note_text,
                trustworthy_sources: true,
            },
            misleading_tags,
        }
    }

    #[must_use]
    pub fn post_id(&self) -> &str {
        &self.note.post_id
    }

    #[must_use]
    pub fn note_text(&self) -> &str {
        &self.note.note_text
    }
}

/// The single terminal outcome of one pipeline run. Serialized as exactly one
/// of the `note`, `refusal` or `error` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOutcome {
    Note(ProposedMisleadingNote),
    Refusal(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostWithContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_description: Option<String>,
    #[serde(flatten)]
    pub outcome: NoteOutcome,
}

impl NoteResult {
    #[must_use]
    pub fn noted(
        post: PostWithContext,
        note: ProposedMisleadingNote,
        context_description: String,
    ) -> Self {
        Self {
            post: Some(post),
            context_description: Some(context_description),
            outcome: NoteOutcome::Note(note),
        }
    }

    #[must_use]
    pub fn refused(post: PostWithContext, refusal: String, context_description: String) -> Self {
        Self {
            post: Some(post),
            context_description: Some(context_description),
            outcome: NoteOutcome::Refusal(refusal),
        }
    }

    #[must_use]
    pub fn failed(
        post: PostWithContext,
        error: String,
        context_description: Option<String>,
    ) -> Self {
        Self {
            post: Some(post),
            context_description,
            outcome: NoteOutcome::Error(error),
        }
    }

    #[must_use]
    pub fn note(&self) -> Option<&ProposedMisleadingNote> {
        match &self.outcome {
            NoteOutcome::Note(note) => Some(note),
            _ => None,
        }
    }

    #[must_use]
    pub fn refusal(&self) -> Option<&str> {
        match &self.outcome {
            NoteOutcome::Refusal(refusal) => Some(refusal),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            NoteOutcome::Error(error) => Some(error),
            _ => None,
        }
    }
}
