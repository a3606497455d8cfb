//! Prompt description of a post and its quoted / replied-to posts.

use std::fmt::Write as _;
use std::time::Duration;

use notewriter_core::{ImageDescriber, Post, PostWithContext};

use crate::cancel::{guarded, Cancellation};
use crate::error::PipelineError;
use crate::types::Step;

/// Fail with [`PipelineError::UnsupportedMedia`] if any post in the context
/// carries a non-photo medium.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedMedia`] naming the first offending
/// media type.
pub fn ensure_supported_media(context: &PostWithContext) -> Result<(), PipelineError> {
    match context.first_unsupported_media() {
        Some(media) => Err(PipelineError::UnsupportedMedia {
            post_id: context.post.id.clone(),
            media_type: media.media_type.clone(),
        }),
        None => Ok(()),
    }
}

/// Caption summaries for each post in a context. Empty when the post has no
/// photos or is absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageSummaries {
    pub post: String,
    pub quoted_post: String,
    pub in_reply_to_post: String,
}

/// Caption every photo in the context, then render the description.
///
/// Captioning runs in post order (main, quoted, replied-to), one guarded call
/// per photo.
///
/// # Errors
///
/// - [`PipelineError::UnsupportedMedia`] before any captioning happens.
/// - [`PipelineError::Upstream`] / `TimedOut` / `Cancelled` from a caption call.
pub async fn describe_context(
    context: &PostWithContext,
    describer: &dyn ImageDescriber,
    step_timeout: Duration,
    cancel: &Cancellation,
) -> Result<String, PipelineError> {
    ensure_supported_media(context)?;

    let mut summaries = ImageSummaries {
        post: summarize_images(&context.post, describer, step_timeout, cancel).await?,
        ..ImageSummaries::default()
    };
    if let Some(quoted) = &context.quoted_post {
        summaries.quoted_post = summarize_images(quoted, describer, step_timeout, cancel).await?;
    }
    if let Some(replied_to) = &context.in_reply_to_post {
        summaries.in_reply_to_post =
            summarize_images(replied_to, describer, step_timeout, cancel).await?;
    }

    Ok(render_description(context, &summaries))
}

async fn summarize_images(
    post: &Post,
    describer: &dyn ImageDescriber,
    step_timeout: Duration,
    cancel: &Cancellation,
) -> Result<String, PipelineError> {
    let mut summary = String::new();
    for (i, media) in post.media.iter().enumerate() {
        let Some(url) = media.url.as_deref().or(media.preview_image_url.as_deref()) else {
            tracing::warn!(
                post_id = %post.id,
                media_key = %media.media_key,
                "photo has no URL; skipping caption"
            );
            continue;
        };
        let caption = guarded(
            Step::DescribeImage,
            step_timeout,
            cancel,
            describer.describe_image(url),
        )
        .await?
        .map_err(|source| PipelineError::Upstream {
            step: Step::DescribeImage,
            source,
        })?;
        let _ = writeln!(summary, "Image {i}: {caption}");
    }
    Ok(summary)
}

/// Render the description text. The main post's text is always present;
/// every other section is appended only when it has content.
#[must_use]
pub fn render_description(context: &PostWithContext, images: &ImageSummaries) -> String {
    let mut description = String::new();
    push_section(&mut description, "Post text:", &context.post.text);
    if !images.post.is_empty() {
        push_section(&mut description, "Summary of images in the post:", &images.post);
    }

    if let Some(quoted) = &context.quoted_post {
        push_section(
            &mut description,
            "The post of interest had quoted (referenced) another post. Here is the quoted post's text:",
            &quoted.text,
        );
        if !images.quoted_post.is_empty() {
            push_section(
                &mut description,
                "Summary of images in the quoted post:",
                &images.quoted_post,
            );
        }
    }

    if let Some(replied_to) = &context.in_reply_to_post {
        push_section(
            &mut description,
            "The post of interest was a reply to another post. Here is the replied-to post's text:",
            &replied_to.text,
        );
        if !images.in_reply_to_post.is_empty() {
            push_section(
                &mut description,
                "Summary of images in the replied-to post:",
                &images.in_reply_to_post,
            );
        }
    }

    description
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    let _ = write!(out, "{heading}\n```\n{body}\n```\n");
}
