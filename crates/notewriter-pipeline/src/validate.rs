//! Checks a drafted note against the drafting policy before submission.
//!
//! The drafting prompt asks for these properties but the model does not
//! always comply, so callers that publish notes run [`validate_note_text`]
//! first. The pipeline itself never rejects a draft on these grounds.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_NOTE_CHARS: usize = 280;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid regex"));
static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w&])#\w").expect("valid regex"));
static PREAMBLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\W*community\s+note\s*:").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteViolation {
    Empty,
    TooLong { chars: usize },
    MissingUrl,
    Hashtag,
    CommunityNotePreamble,
}

impl fmt::Display for NoteViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteViolation::Empty => f.write_str("note is empty"),
            NoteViolation::TooLong { chars } => write!(
                f,
                "note is {chars} characters excluding URLs (max {MAX_NOTE_CHARS})"
            ),
            NoteViolation::MissingUrl => f.write_str("note cites no URL"),
            NoteViolation::Hashtag => f.write_str("note contains a hashtag"),
            NoteViolation::CommunityNotePreamble => {
                f.write_str("note starts with a \"Community Note:\" preamble")
            }
        }
    }
}

/// Characters in `text` once every URL is removed.
#[must_use]
pub fn chars_excluding_urls(text: &str) -> usize {
    URL_RE.replace_all(text.trim(), "").chars().count()
}

/// Every policy violation in `text`; empty means the note may be submitted.
#[must_use]
pub fn validate_note_text(text: &str) -> Vec<NoteViolation> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return vec![NoteViolation::Empty];
    }

    let mut violations = Vec::new();
    let chars = chars_excluding_urls(trimmed);
    if chars > MAX_NOTE_CHARS {
        violations.push(NoteViolation::TooLong { chars });
    }
    if !URL_RE.is_match(trimmed) {
        violations.push(NoteViolation::MissingUrl);
    }
    // URL fragments are not hashtags.
    if HASHTAG_RE.is_match(&URL_RE.replace_all(trimmed, " ")) {
        violations.push(NoteViolation::Hashtag);
    }
    if PREAMBLE_RE.is_match(trimmed) {
        violations.push(NoteViolation::CommunityNotePreamble);
    }
    violations
}
