use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

/// The only media type the note writer can reason about.
pub const PHOTO_MEDIA_TYPE: &str = "photo";

const QUOTED: &str = "quoted";
const REPLIED_TO: &str = "replied_to";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub media_key: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

impl Media {
    #[must_use]
    pub fn is_photo(&self) -> bool {
        self.media_type == PHOTO_MEDIA_TYPE
    }
}

/// A post as fetched from the platform. `text` already holds the long-form
/// body when the post has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(alias = "post_id")]
    pub id: String,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub media: Vec<Media>,
}

impl Post {
    fn first_unsupported_media(&self) -> Option<&Media> {
        self.media.iter().find(|m| !m.is_photo())
    }
}

/// A post referenced by another one, tagged with the raw reference type from
/// the API (`quoted`, `replied_to`, or anything else the API invents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReference {
    pub kind: String,
    pub post: Post,
}

/// A post eligible for notes together with its unvalidated references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligiblePost {
    pub post: Post,
    #[serde(default)]
    pub references: Vec<PostReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithContext {
    pub post: Post,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_post: Option<Post>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_post: Option<Post>,
}

impl PostWithContext {
    #[must_use]
    pub fn new(post: Post) -> Self {
        Self {
            post,
            quoted_post: None,
            in_reply_to_post: None,
        }
    }

    /// Attach references to `post`, enforcing at most one quoted and one
    /// replied-to post.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError`] on a duplicate reference of either kind or
    /// on a reference type other than `quoted` / `replied_to`.
    pub fn assemble(post: Post, references: Vec<PostReference>) -> Result<Self, ReferenceError> {
        let mut context = Self::new(post);

        for reference in references {
            match reference.kind.as_str() {
                QUOTED => {
                    if context.quoted_post.is_some() {
                        return Err(ReferenceError::MultipleQuoted {
                            post_id: context.post.id,
                        });
                    }
                    context.quoted_post = Some(reference.post);
                }
                REPLIED_TO => {
                    if context.in_reply_to_post.is_some() {
                        return Err(ReferenceError::MultipleRepliedTo {
                            post_id: context.post.id,
                        });
                    }
                    context.in_reply_to_post = Some(reference.post);
                }
                _ => {
                    return Err(ReferenceError::UnknownType {
                        post_id: context.post.id,
                        kind: reference.kind,
                    });
                }
            }
        }

        Ok(context)
    }

    /// Main post first, then quoted, then replied-to.
    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        std::iter::once(&self.post)
            .chain(self.quoted_post.as_ref())
            .chain(self.in_reply_to_post.as_ref())
    }

    /// First medium anywhere in the context whose type is not a photo.
    #[must_use]
    pub fn first_unsupported_media(&self) -> Option<&Media> {
        self.posts().find_map(Post::first_unsupported_media)
    }

    #[must_use]
    pub fn has_unsupported_media(&self) -> bool {
        self.first_unsupported_media().is_some()
    }
}
