//! HTTP client for the X API v2 endpoints used by the note writer.
//!
//! Wraps `reqwest` with bearer-token auth, 429 detection and the bounded
//! [`RetryPolicy`]. Use [`XApiClient::new`] for production or
//! [`XApiClient::with_base_url`] to point at a mock server in tests.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use notewriter_core::{CommentSource, EligiblePost, PostSource, UpstreamError};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::XApiError;
use crate::parse::parse_eligible_response;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::{EligiblePostsResponse, SearchResponse};

const DEFAULT_BASE_URL: &str = "https://api.x.com/";
const ELIGIBLE_PATH: &str = "2/notes/search/posts_eligible_for_notes";
const SEARCH_RECENT_PATH: &str = "2/tweets/search/recent";

const ELIGIBLE_TWEET_FIELDS: &str = "author_id,created_at,referenced_tweets,media_metadata,note_tweet";
const ELIGIBLE_EXPANSIONS: &str =
    "attachments.media_keys,referenced_tweets.id,referenced_tweets.id.attachments.media_keys";
const ELIGIBLE_MEDIA_FIELDS: &str =
    "alt_text,duration_ms,height,media_key,preview_image_url,public_metrics,type,url,width,variants";

/// The search endpoint accepts `max_results` in `10..=100`.
const SEARCH_PAGE_MIN: usize = 10;
const SEARCH_PAGE_MAX: usize = 100;

pub struct XApiClient {
    client: Client,
    bearer_token: String,
    base_url: Url,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl XApiClient {
    /// Creates a new client pointed at the production X API.
    ///
    /// # Errors
    ///
    /// Returns [`XApiError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(bearer_token: &str, timeout_secs: u64, retry: RetryPolicy) -> Result<Self, XApiError> {
        Self::with_base_url(bearer_token, timeout_secs, retry, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`XApiError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`XApiError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn with_base_url(
        bearer_token: &str,
        timeout_secs: u64,
        retry: RetryPolicy,
        base_url: &str,
    ) -> Result<Self, XApiError> {
        let request_timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("notewriter/0.1 (community-notes)")
            .build()?;

        // Exactly one trailing slash so relative joins append to the base path.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| XApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            bearer_token: bearer_token.to_owned(),
            base_url,
            retry,
            request_timeout,
        })
    }

    /// Fetches posts currently eligible for notes.
    ///
    /// # Errors
    ///
    /// - [`XApiError::RateLimited`] once the retry policy is exhausted.
    /// - [`XApiError::UnexpectedStatus`] / [`XApiError::Http`] on other failures.
    /// - [`XApiError::Deserialize`] if the body is not the expected envelope.
    ///   Individual malformed posts are logged and skipped.
    pub async fn fetch_eligible_posts(
        &self,
        max_results: u32,
        test_mode: bool,
    ) -> Result<Vec<EligiblePost>, XApiError> {
        let max_results = max_results.to_string();
        let test_mode = test_mode.to_string();
        let url = self.build_url(
            ELIGIBLE_PATH,
            &[
                ("test_mode", test_mode.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", ELIGIBLE_TWEET_FIELDS),
                ("expansions", ELIGIBLE_EXPANSIONS),
                ("media.fields", ELIGIBLE_MEDIA_FIELDS),
            ],
        )?;

        let response: EligiblePostsResponse = self.get_json(ELIGIBLE_PATH, &url).await?;
        let posts = parse_eligible_response(&response);
        tracing::info!(count = posts.len(), "fetched posts eligible for notes");
        Ok(posts)
    }

    /// Fetches up to `limit` replies in the conversation rooted at `post_id`.
    ///
    /// Pages through `search/recent` via `next_token`, de-duplicating by reply
    /// id and excluding the root post itself. Recent search only covers the
    /// last seven days.
    ///
    /// # Errors
    ///
    /// Same as [`XApiClient::fetch_eligible_posts`].
    pub async fn fetch_replies(&self, post_id: &str, limit: usize) -> Result<Vec<String>, XApiError> {
        let mut replies = Vec::new();
        if limit == 0 {
            return Ok(replies);
        }

        let query = format!("conversation_id:{post_id}");
        let page_size = limit.clamp(SEARCH_PAGE_MIN, SEARCH_PAGE_MAX).to_string();
        let mut seen: HashSet<String> = HashSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("query", query.as_str()),
                ("max_results", page_size.as_str()),
                ("tweet.fields", "author_id,created_at,lang,note_tweet"),
            ];
            if let Some(token) = next_token.as_deref() {
                params.push(("next_token", token));
            }
            let url = self.build_url(SEARCH_RECENT_PATH, &params)?;
            let page: SearchResponse = self.get_json(SEARCH_RECENT_PATH, &url).await?;

            for reply in &page.data {
                if reply.id == post_id || !seen.insert(reply.id.clone()) {
                    continue;
                }
                replies.push(reply.full_text().to_owned());
                if replies.len() >= limit {
                    return Ok(replies);
                }
            }

            match page.meta.next_token {
                Some(token) if !page.data.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(post_id, count = replies.len(), "fetched conversation replies");
        Ok(replies)
    }

    /// Longest [`XApiClient::fetch_replies`] can take for `limit` replies:
    /// the retry policy's worst case for every page it may request.
    #[must_use]
    pub fn reply_fetch_budget(&self, limit: usize) -> Duration {
        let page_size = limit.clamp(SEARCH_PAGE_MIN, SEARCH_PAGE_MAX);
        let pages = u32::try_from(limit.div_ceil(page_size).max(1)).unwrap_or(u32::MAX);
        self.retry
            .worst_case(self.request_timeout)
            .saturating_mul(pages)
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, XApiError> {
        let mut url = self.base_url.join(path).map_err(|e| XApiError::InvalidBaseUrl {
            url: self.base_url.to_string(),
            reason: e.to_string(),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: &Url) -> Result<T, XApiError> {
        retry_with_policy(self.retry, endpoint, || self.get_json_once(endpoint, url)).await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &Url,
    ) -> Result<T, XApiError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after_secs(response.headers());
            return Err(XApiError::RateLimited {
                endpoint: endpoint.to_owned(),
                retry_after_secs,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(endpoint, status = status.as_u16(), body = %body, "X API error response");
            return Err(XApiError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: endpoint.to_owned(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| XApiError::Deserialize {
            context: endpoint.to_owned(),
            source: e,
        })
    }
}

/// Seconds until the rate-limit window resets, from `x-rate-limit-reset`
/// (epoch seconds). Zero when the header is absent or already past.
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    let reset = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());
    match reset {
        Some(reset) => {
            let now = chrono::Utc::now().timestamp();
            u64::try_from(reset - now).unwrap_or(0)
        }
        None => 0,
    }
}

#[async_trait]
impl PostSource for XApiClient {
    async fn fetch_eligible(
        &self,
        max_results: u32,
        test_mode: bool,
    ) -> Result<Vec<EligiblePost>, UpstreamError> {
        Ok(self.fetch_eligible_posts(max_results, test_mode).await?)
    }
}

#[async_trait]
impl CommentSource for XApiClient {
    async fn fetch_comments(&self, post_id: &str, limit: usize) -> Result<Vec<String>, UpstreamError> {
        Ok(self.fetch_replies(post_id, limit).await?)
    }

    fn fetch_budget(&self, limit: usize) -> Option<Duration> {
        Some(self.reply_fetch_budget(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> XApiClient {
        XApiClient::with_base_url("test-token", 30, RetryPolicy::none(), base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn build_url_joins_path_onto_base() {
        let client = test_client("https://api.x.com");
        let url = client
            .build_url(ELIGIBLE_PATH, &[("max_results", "2")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.x.com/2/notes/search/posts_eligible_for_notes?max_results=2"
        );
    }

    #[test]
    fn build_url_encodes_query() {
        let client = test_client("https://api.x.com/");
        let url = client
            .build_url(SEARCH_RECENT_PATH, &[("query", "conversation_id:123")])
            .unwrap();
        assert!(
            url.as_str().contains("query=conversation_id%3A123"),
            "query param should be percent-encoded: {url}"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = XApiClient::with_base_url("t", 30, RetryPolicy::none(), "not a url");
        assert!(matches!(result, Err(XApiError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn reply_fetch_budget_counts_every_page() {
        let client = XApiClient::with_base_url(
            "t",
            60,
            RetryPolicy::default(),
            "https://api.x.com",
        )
        .unwrap();
        let per_page = RetryPolicy::default().worst_case(Duration::from_secs(60));
        assert_eq!(client.reply_fetch_budget(300), per_page * 3);
        assert_eq!(client.reply_fetch_budget(5), per_page);
        assert_eq!(client.fetch_budget(300), Some(per_page * 3));
    }

    #[test]
    fn retry_after_is_zero_without_header() {
        assert_eq!(retry_after_secs(&reqwest::header::HeaderMap::new()), 0);
    }
}
