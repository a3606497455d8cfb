//! OpenAI-compatible `/chat/completions` client.
//!
//! Serves both the text model ([`ChatCompletion`]) and the vision model used
//! to caption photos ([`ImageDescriber`]).

use std::time::Duration;

use async_trait::async_trait;
use notewriter_core::{ChatCompletion, ImageDescriber, UpstreamError};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "llm";

const DESCRIBE_IMAGE_PROMPT: &str = "Describe this image in detail. Transcribe any visible text \
verbatim and note anything that suggests when or where it was taken.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChatClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    vision_model: String,
}

impl OpenAiChatClient {
    /// # Errors
    ///
    /// Returns [`UpstreamError::Request`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        vision_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::request(SERVICE, e))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            vision_model: vision_model.to_owned(),
        })
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, UpstreamError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::request(SERVICE, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Err(UpstreamError::RateLimited {
                service: SERVICE.to_owned(),
                retry_after_secs,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::request(
                SERVICE,
                format!("{} returned {status}: {body}", request.model),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::invalid_response(SERVICE, e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::invalid_response(SERVICE, "response had no message content"))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &[String],
    ) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: vec![ContentPart::Text {
                        text: system_prompt,
                    }],
                },
                WireMessage {
                    role: "user",
                    content: user_content
                        .iter()
                        .map(|text| ContentPart::Text { text: text.as_str() })
                        .collect(),
                },
            ],
        };
        self.send(&request).await
    }
}

#[async_trait]
impl ImageDescriber for OpenAiChatClient {
    async fn describe_image(&self, url: &str) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.vision_model,
            messages: vec![WireMessage {
                role: "user",
                content: vec![
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url,
                            detail: "high",
                        },
                    },
                    ContentPart::Text {
                        text: DESCRIBE_IMAGE_PROMPT,
                    },
                ],
            }],
        };
        self.send(&request).await
    }
}
