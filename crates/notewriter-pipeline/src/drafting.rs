//! Note-drafting prompts and interpretation of the model's answer.
//!
//! The two refusal sentinels are part of the prompt contract: the model is
//! told to answer with one of them, and [`interpret_draft`] matches on them
//! (case-sensitive substring).

use notewriter_core::EvidenceSource;

pub const NO_NOTE_NEEDED: &str = "NO NOTE NEEDED";
pub const NOT_ENOUGH_EVIDENCE: &str = "NOT ENOUGH EVIDENCE TO WRITE A GOOD COMMUNITY NOTE";

/// System message for the drafting call.
pub const NOTE_WRITER_SYSTEM_PROMPT: &str = "X has a crowd-sourced fact-checking program, \
called Community Notes. Here, users can write 'notes' on potentially misleading content. \
Community Notes will be shown publicly alongside the piece of content.\n\
You will be provided with a post from X and some evidence. Your job is to find fact-check \
information in that evidence that indicates that something in the post is inaccurate, and use \
that information to write a Community Note of your own. It should be in unbiased language, not \
argumentative. It should also be within 280 characters, not counting URLs.";

/// System message for the live-search research call.
pub const LIVE_SEARCH_SYSTEM_PROMPT: &str = "You are a careful fact-checking researcher with \
access to live web and X search. Cite every claim with a URL.";

/// The model's answer, classified exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Draft {
    Note(String),
    Refusal(String),
}

/// Classify raw model output. Anything containing a refusal sentinel is a
/// refusal; everything else is the note body, verbatim.
#[must_use]
pub fn interpret_draft(raw: String) -> Draft {
    if raw.contains(NO_NOTE_NEEDED) || raw.contains(NOT_ENOUGH_EVIDENCE) {
        Draft::Refusal(raw)
    } else {
        Draft::Note(raw)
    }
}

/// Refusal text used when no relevant evidence survives filtering.
#[must_use]
pub fn no_evidence_refusal() -> String {
    format!("{NOT_ENOUGH_EVIDENCE}.")
}

/// Prompt asking the model to research a post before drafting.
#[must_use]
pub fn live_search_prompt(context_description: &str) -> String {
    format!(
        "Below will be a post on X. Do research on the post to determine if the post is \
potentially misleading. Your response MUST include URLs/links directly in the text, next to the \
claim it supports. Don't include any sort of wasted characters e.g. [Source] when listing a URL. \
Just state the URL directly in the text.\n\n{context_description}\n"
    )
}

/// Build the drafting prompt for `evidence` gathered from `source`.
#[must_use]
pub fn note_writing_prompt(
    context_description: &str,
    evidence: &str,
    source: EvidenceSource,
) -> String {
    let (intro, evidence_label) = match source {
        EvidenceSource::Comments => (
            "Below will be a post from X and some comments on it.",
            "Comments",
        ),
        EvidenceSource::LiveSearch => (
            "Below will be a post on X, and live search results from the web.",
            "Live search results",
        ),
    };

    format!(
        "{intro} \
If the post is misleading and needs a community note, then your response should be the proposed \
community note itself. If the post is not misleading, or does not contain any concrete \
fact-checkable claims, or there is not strong enough evidence to write a \
100%-supported-by-evidence community note, then do not write a note, and instead respond with \
\"{NO_NOTE_NEEDED}.\" or \"{NOT_ENOUGH_EVIDENCE}.\".

If a note is justified, then please write a very good community note, which is concise \
(tweet-length at most), interesting and clear to read, contains no unnecessary words, is backed by \
very solid evidence from sources that would be most likely to be found trustworthy by people on \
both sides of the political spectrum (citing URL(s)), and is written in a way that would be most \
likely to be found trustworthy by people on both sides of the political spectrum.

The answer MUST be short, like a post on X (280 characters maximum, not counting URLs). \
The note should not include any sort of wasted characters e.g. [Source] when listing a URL. \
Just state the URL directly in the text. \
Each note MUST include at least one URL/link source. Nothing else counts as a source other than a \
URL/link. \
Each note MUST NOT use any hashtags (#). Keep a professional tone with no hashtags, emojis, etc.

If the post does not need a community note (either because the original post is not misleading, \
or does not contain any concrete fact-checkable claims), then your response should simply be \
\"{NO_NOTE_NEEDED}.\".

If the post may need a community note, but you weren't able to find enough concrete evidence to \
write an ironclad community note, then your response should be \"{NOT_ENOUGH_EVIDENCE}.\".

If you are writing a note, don't preface it with anything like \"Community Note:\". Just write the \
note.

{context_description}
{evidence_label}:
```
{evidence}
```

If you aren't sure whether the post is misleading and warrants a note, then err on the side of \
not writing a note (instead, say \"{NO_NOTE_NEEDED}\" or \"{NOT_ENOUGH_EVIDENCE}\"). \
Only write a note if you are extremely confident that the post is misleading, that the evidence \
is strong, and that the note will be found helpful by the community. For example, if a post is \
just making a prediction about the future, don't write a note saying that the prediction is \
uncertain or likely to be wrong.
"
    )
}
