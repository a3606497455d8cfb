//! Misleading-tag assignment for accepted notes.

use std::sync::Arc;

use async_trait::async_trait;
use notewriter_core::{ChatCompletion, MisleadingTag, UpstreamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Invalid(String),
}

/// Assigns taxonomy tags to a drafted note.
#[async_trait]
pub trait TagClassifier: Send + Sync {
    async fn infer_tags(
        &self,
        context_description: &str,
        note_text: &str,
    ) -> Result<Vec<MisleadingTag>, TagError>;
}

/// Drop repeated tags, keeping first occurrences in order.
#[must_use]
pub fn dedupe_tags(tags: Vec<MisleadingTag>) -> Vec<MisleadingTag> {
    let mut unique = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

const TAG_SYSTEM_PROMPT: &str = "You label Community Notes with the reasons the noted post is \
misleading. Answer only with a JSON array of tag names.";

fn tag_prompt(context_description: &str, note_text: &str) -> String {
    let tags = MisleadingTag::ALL
        .iter()
        .map(|tag| format!("- {tag}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Below is a post on X and a Community Note written about it. Choose every reason that \
applies to why the post is misleading, from this list:\n{tags}\n\n\
{context_description}\nCommunity Note:\n```\n{note_text}\n```\n\n\
Respond with a JSON array of one or more tag names from the list and nothing else, \
e.g. [\"factual_error\", \"missing_important_context\"]."
    )
}

/// Parse the first `[...]` block of `raw` as a tag list.
///
/// # Errors
///
/// Returns [`TagError::Invalid`] if there is no array, it names a tag outside
/// the taxonomy, or it is empty.
pub fn parse_tag_response(raw: &str) -> Result<Vec<MisleadingTag>, TagError> {
    let array = raw
        .find('[')
        .and_then(|start| raw[start..].find(']').map(|len| &raw[start..=start + len]))
        .ok_or_else(|| TagError::Invalid(format!("no JSON array in tag response: {raw}")))?;

    let tags: Vec<MisleadingTag> = serde_json::from_str(array)
        .map_err(|e| TagError::Invalid(format!("unparseable tag list {array}: {e}")))?;

    let tags = dedupe_tags(tags);
    if tags.is_empty() {
        return Err(TagError::Invalid("tag response named no tags".to_owned()));
    }
    Ok(tags)
}

/// Tag classifier backed by a chat model.
pub struct LlmTagClassifier {
    chat: Arc<dyn ChatCompletion>,
}

impl LlmTagClassifier {
    #[must_use]
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl TagClassifier for LlmTagClassifier {
    async fn infer_tags(
        &self,
        context_description: &str,
        note_text: &str,
    ) -> Result<Vec<MisleadingTag>, TagError> {
        let raw = self
            .chat
            .complete(TAG_SYSTEM_PROMPT, &[tag_prompt(context_description, note_text)])
            .await?;
        parse_tag_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_inside_prose() {
        let tags =
            parse_tag_response("Sure! [\"factual_error\", \"outdated_information\"] hope it helps")
                .unwrap();
        assert_eq!(
            tags,
            vec![MisleadingTag::FactualError, MisleadingTag::OutdatedInformation]
        );
    }

    #[test]
    fn duplicates_collapse_in_order() {
        let tags = parse_tag_response(r#"["other", "factual_error", "other"]"#).unwrap();
        assert_eq!(tags, vec![MisleadingTag::Other, MisleadingTag::FactualError]);
    }

    #[test]
    fn unknown_tag_is_invalid() {
        assert!(matches!(
            parse_tag_response(r#"["factual_error", "clickbait"]"#),
            Err(TagError::Invalid(_))
        ));
    }

    #[test]
    fn empty_array_is_invalid() {
        assert!(matches!(parse_tag_response("[]"), Err(TagError::Invalid(_))));
    }

    #[test]
    fn missing_array_is_invalid() {
        assert!(matches!(
            parse_tag_response("factual_error"),
            Err(TagError::Invalid(_))
        ));
    }

    #[test]
    fn prompt_lists_every_tag() {
        let prompt = tag_prompt("Post text:\n```\nx\n```\n", "note");
        for tag in MisleadingTag::ALL {
            assert!(prompt.contains(tag.as_str()), "missing {tag}");
        }
    }
}
