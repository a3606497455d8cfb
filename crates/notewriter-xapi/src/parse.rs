//! Conversion of the eligible-posts envelope into [`EligiblePost`]s.
//!
//! Media keys and referenced post ids are resolved against the response's
//! `includes`. A referenced post missing from `includes` is logged and
//! skipped; reference *types* are left unvalidated here and checked when the
//! pipeline assembles the post's context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use notewriter_core::{EligiblePost, Media, Post, PostReference};

use crate::error::XApiError;
use crate::types::{EligiblePostsResponse, RawMedia, RawPost};

/// Parse a raw `posts_eligible_for_notes` body.
///
/// A post that lacks `author_id` or has an unparseable `created_at` is logged
/// and skipped, as is an eligible post whose referenced post is malformed.
/// The remaining posts are returned.
#[must_use]
pub fn parse_eligible_response(response: &EligiblePostsResponse) -> Vec<EligiblePost> {
    let media_by_key: HashMap<&str, &RawMedia> = response
        .includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();
    let posts_by_id: HashMap<&str, &RawPost> = response
        .includes
        .tweets
        .iter()
        .map(|t| (t.id.as_str(), t))
        .collect();

    response
        .data
        .iter()
        .filter_map(|item| match parse_eligible(item, &posts_by_id, &media_by_key) {
            Ok(eligible) => Some(eligible),
            Err(e) => {
                tracing::warn!(post_id = %item.id, error = %e, "skipping malformed eligible post");
                None
            }
        })
        .collect()
}

fn parse_eligible(
    item: &RawPost,
    posts_by_id: &HashMap<&str, &RawPost>,
    media_by_key: &HashMap<&str, &RawMedia>,
) -> Result<EligiblePost, XApiError> {
    let post = parse_post(item, media_by_key)?;

    let mut references = Vec::with_capacity(item.referenced_tweets.len());
    for reference in &item.referenced_tweets {
        let Some(referenced) = posts_by_id.get(reference.id.as_str()) else {
            tracing::warn!(
                post_id = %post.id,
                referenced_post_id = %reference.id,
                "referenced post not found in includes; skipping"
            );
            continue;
        };
        references.push(PostReference {
            kind: reference.kind.clone(),
            post: parse_post(referenced, media_by_key)?,
        });
    }

    Ok(EligiblePost { post, references })
}

fn parse_post(item: &RawPost, media_by_key: &HashMap<&str, &RawMedia>) -> Result<Post, XApiError> {
    let malformed = |reason: String| XApiError::MalformedPost {
        post_id: item.id.clone(),
        reason,
    };

    let author_id = item
        .author_id
        .clone()
        .ok_or_else(|| malformed("missing author_id".to_owned()))?;
    let raw_created_at = item
        .created_at
        .as_deref()
        .ok_or_else(|| malformed("missing created_at".to_owned()))?;
    let created_at = DateTime::parse_from_rfc3339(raw_created_at)
        .map_err(|e| malformed(format!("invalid created_at '{raw_created_at}': {e}")))?
        .with_timezone(&Utc);

    let media = item
        .attachments
        .iter()
        .flat_map(|a| a.media_keys.iter())
        .filter_map(|key| media_by_key.get(key.as_str()))
        .map(|raw| to_media(raw))
        .collect();

    let text = match &item.note_tweet {
        Some(note) if !note.text.is_empty() => note.text.clone(),
        _ => item.text.clone(),
    };

    Ok(Post {
        id: item.id.clone(),
        author_id,
        created_at,
        text,
        media,
    })
}

fn to_media(raw: &RawMedia) -> Media {
    Media {
        media_key: raw.media_key.clone(),
        media_type: raw.media_type.clone(),
        url: raw.url.clone(),
        preview_image_url: raw.preview_image_url.clone(),
        height: raw.height,
        width: raw.width,
        duration_ms: raw.duration_ms,
        view_count: raw.public_metrics.as_ref().and_then(|m| m.view_count),
    }
}
