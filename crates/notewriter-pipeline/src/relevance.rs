//! Relevance filter over (post, comment) pairs.
//!
//! [`TeiRelevanceClassifier`] calls a Text Embeddings Inference `/predict`
//! endpoint serving a fine-tuned E5 pair classifier.

use std::time::Duration;

use async_trait::async_trait;
use notewriter_core::UpstreamError;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "relevance-classifier";

/// Maximum number of pairs per /predict call.
const BATCH_SIZE: usize = 32;

/// Binary predicate selecting comments likely to carry fact-check signal.
#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, post_text: &str, comment_text: &str) -> Result<bool, UpstreamError>;

    /// Keep the comments judged relevant, preserving input order.
    async fn filter(
        &self,
        post_text: &str,
        comments: Vec<String>,
    ) -> Result<Vec<String>, UpstreamError> {
        let mut relevant = Vec::new();
        for comment in comments {
            if self.classify(post_text, &comment).await? {
                relevant.push(comment);
            }
        }
        Ok(relevant)
    }
}

/// E5 pair format the classifier was fine-tuned on.
#[must_use]
pub fn pair_input(post_text: &str, comment_text: &str) -> String {
    format!("query: {post_text} passage: {comment_text}")
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    score: f32,
}

pub struct TeiRelevanceClassifier {
    client: reqwest::Client,
    url: String,
    positive_label: String,
}

impl TeiRelevanceClassifier {
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] if the HTTP client cannot be built.
    pub fn new(
        tei_url: &str,
        positive_label: &str,
        timeout_secs: u64,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UpstreamError::request(SERVICE, e))?;
        Ok(Self {
            client,
            url: format!("{}/predict", tei_url.trim_end_matches('/')),
            positive_label: positive_label.to_owned(),
        })
    }

    /// Classify a batch of pair inputs, one verdict per input in order.
    async fn predict(&self, inputs: &[String]) -> Result<Vec<bool>, UpstreamError> {
        let mut verdicts = Vec::with_capacity(inputs.len());

        for chunk in inputs.chunks(BATCH_SIZE) {
            let request = PredictRequest {
                inputs: chunk,
                truncate: true,
            };
            let response = self
                .client
                .post(&self.url)
                .json(&request)
                .send()
                .await
                .map_err(|e| UpstreamError::request(SERVICE, format!("TEI request failed: {e}")))?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(UpstreamError::RateLimited {
                    service: SERVICE.to_owned(),
                    retry_after_secs: 0,
                });
            }
            if !status.is_success() {
                return Err(UpstreamError::request(
                    SERVICE,
                    format!("TEI returned status {status}"),
                ));
            }

            let predictions: Vec<Vec<Prediction>> = response.json().await.map_err(|e| {
                UpstreamError::invalid_response(SERVICE, format!("TEI response parse error: {e}"))
            })?;

            if predictions.len() != chunk.len() {
                return Err(UpstreamError::invalid_response(
                    SERVICE,
                    format!(
                        "TEI returned {} predictions for {} inputs",
                        predictions.len(),
                        chunk.len()
                    ),
                ));
            }

            verdicts.extend(predictions.iter().map(|scores| self.is_positive(scores)));
        }

        Ok(verdicts)
    }

    fn is_positive(&self, scores: &[Prediction]) -> bool {
        scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .is_some_and(|top| top.label == self.positive_label)
    }
}

#[async_trait]
impl RelevanceClassifier for TeiRelevanceClassifier {
    async fn classify(&self, post_text: &str, comment_text: &str) -> Result<bool, UpstreamError> {
        let verdicts = self.predict(&[pair_input(post_text, comment_text)]).await?;
        Ok(verdicts.first().copied().unwrap_or(false))
    }

    async fn filter(
        &self,
        post_text: &str,
        comments: Vec<String>,
    ) -> Result<Vec<String>, UpstreamError> {
        if comments.is_empty() {
            return Ok(comments);
        }
        let inputs: Vec<String> = comments
            .iter()
            .map(|comment| pair_input(post_text, comment))
            .collect();
        let verdicts = self.predict(&inputs).await?;
        let relevant: Vec<String> = comments
            .into_iter()
            .zip(verdicts)
            .filter_map(|(comment, keep)| keep.then_some(comment))
            .collect();
        tracing::debug!(relevant = relevant.len(), total = inputs.len(), "filtered comments");
        Ok(relevant)
    }
}
