use notewriter_core::UpstreamError;
use thiserror::Error;

/// Errors returned by the X API client and the note submitter.
#[derive(Debug, Error)]
pub enum XApiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429. `retry_after_secs` comes from the `x-rate-limit-reset`
    /// header when present.
    #[error("rate limited on {endpoint} (retry after {retry_after_secs}s)")]
    RateLimited {
        endpoint: String,
        retry_after_secs: u64,
    },

    #[error("unexpected HTTP status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        status: u16,
        endpoint: String,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A post in the response is missing a field or has a malformed value.
    #[error("malformed post {post_id}: {reason}")]
    MalformedPost { post_id: String, reason: String },

    #[error("note submission failed: {0}")]
    Submission(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl From<XApiError> for UpstreamError {
    fn from(err: XApiError) -> Self {
        match err {
            XApiError::RateLimited {
                retry_after_secs, ..
            } => UpstreamError::RateLimited {
                service: "x-api".to_owned(),
                retry_after_secs,
            },
            XApiError::Deserialize { .. } | XApiError::MalformedPost { .. } => {
                UpstreamError::invalid_response("x-api", err)
            }
            XApiError::Submission(_) => UpstreamError::request("xurl", err),
            other => UpstreamError::request("x-api", other),
        }
    }
}
