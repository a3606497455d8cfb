//! Builds concrete collaborators from `AppConfig`.

use std::sync::Arc;

use notewriter_core::{AppConfig, ChatCompletion, EvidenceSource};
use notewriter_pipeline::{
    Evidence, LlmTagClassifier, NoteWriter, OpenAiChatClient, PipelineConfig,
    TeiRelevanceClassifier,
};
use notewriter_xapi::{RetryPolicy, XApiClient};

pub(crate) fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: config.max_retries,
        rate_limit_cooldown_secs: config.rate_limit_cooldown_secs,
        backoff_base_ms: config.retry_backoff_base_ms,
    }
}

pub(crate) fn build_x_client(config: &AppConfig) -> anyhow::Result<Arc<XApiClient>> {
    let client = XApiClient::with_base_url(
        &config.x_bearer_token,
        config.request_timeout_secs,
        retry_policy(config),
        &config.x_api_base_url,
    )?;
    Ok(Arc::new(client))
}

pub(crate) fn build_note_writer(
    config: &AppConfig,
    x_client: Arc<XApiClient>,
) -> anyhow::Result<NoteWriter> {
    let llm = Arc::new(OpenAiChatClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
        &config.vision_model,
        config.request_timeout_secs,
    )?);

    let evidence = match config.evidence_source {
        EvidenceSource::Comments => {
            let classifier_url = config.classifier_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("NOTEWRITER_CLASSIFIER_URL is required for comment evidence")
            })?;
            let relevance = TeiRelevanceClassifier::new(
                classifier_url,
                &config.classifier_positive_label,
                config.request_timeout_secs,
            )?;
            Evidence::Comments {
                source: x_client,
                relevance: Arc::new(relevance),
            }
        }
        EvidenceSource::LiveSearch => Evidence::LiveSearch,
    };

    let chat: Arc<dyn ChatCompletion> = llm.clone();
    Ok(NoteWriter::new(
        PipelineConfig::from_app_config(config),
        evidence,
        llm,
        chat.clone(),
        Arc::new(LlmTagClassifier::new(chat)),
    ))
}
