use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Failure reported by an external collaborator (X API, LLM, classifier,
/// submission tool).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{service} rate limited the request (retry after {retry_after_secs}s)")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    #[error("{service} request failed: {message}")]
    Request { service: String, message: String },

    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse { service: String, message: String },
}

impl UpstreamError {
    pub fn request(service: &str, message: impl std::fmt::Display) -> Self {
        Self::Request {
            service: service.to_owned(),
            message: message.to_string(),
        }
    }

    pub fn invalid_response(service: &str, message: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            service: service.to_owned(),
            message: message.to_string(),
        }
    }
}

/// A post's `referenced_tweets` list violates the one-quoted, one-replied-to
/// shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("multiple quoted posts found in post {post_id}")]
    MultipleQuoted { post_id: String },

    #[error("multiple in-reply-to posts found in post {post_id}")]
    MultipleRepliedTo { post_id: String },

    #[error("unknown referenced post type '{kind}' in post {post_id} (expected 'quoted' or 'replied_to')")]
    UnknownType { post_id: String, kind: String },
}
