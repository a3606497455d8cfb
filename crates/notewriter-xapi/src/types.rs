//! Wire types for the X API v2 endpoints the note writer touches.

use serde::Deserialize;

/// Envelope of `GET /2/notes/search/posts_eligible_for_notes`.
#[derive(Debug, Default, Deserialize)]
pub struct EligiblePostsResponse {
    #[serde(default)]
    pub data: Vec<RawPost>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub media: Vec<RawMedia>,
    #[serde(default)]
    pub tweets: Vec<RawPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Option<Attachments>,
    #[serde(default)]
    pub note_tweet: Option<NoteTweet>,
    #[serde(default)]
    pub referenced_tweets: Vec<ReferencedTweet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

/// Long-form body of a post longer than the classic limit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteTweet {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedTweet {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    pub media_key: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub preview_image_url: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub public_metrics: Option<MediaMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetrics {
    #[serde(default)]
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub result_count: Option<u32>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Envelope of `GET /2/tweets/search/recent`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<SearchPost>,
    #[serde(default)]
    pub meta: Meta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPost {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub note_tweet: Option<NoteTweet>,
}

impl SearchPost {
    /// Full reply text, preferring the long-form body when present.
    #[must_use]
    pub fn full_text(&self) -> &str {
        match &self.note_tweet {
            Some(note) if !note.text.is_empty() => &note.text,
            _ => &self.text,
        }
    }
}
