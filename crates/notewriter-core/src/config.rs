use crate::app_config::{AppConfig, EvidenceSource};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let x_bearer_token = require("X_BEARER_TOKEN")?;
    let llm_api_key = require("NOTEWRITER_LLM_API_KEY")?;

    let log_level = or_default("NOTEWRITER_LOG_LEVEL", "info");

    let x_api_base_url = or_default("NOTEWRITER_X_API_BASE_URL", "https://api.x.com");
    let llm_base_url = or_default("NOTEWRITER_LLM_BASE_URL", "https://api.x.ai/v1");
    let llm_model = or_default("NOTEWRITER_LLM_MODEL", "grok-3-latest");
    let vision_model = or_default("NOTEWRITER_VISION_MODEL", "grok-2-vision-latest");

    let classifier_url = lookup("NOTEWRITER_CLASSIFIER_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());
    let classifier_positive_label = or_default("NOTEWRITER_CLASSIFIER_POSITIVE_LABEL", "LABEL_1");

    let evidence_source = parse_evidence_source(&or_default("NOTEWRITER_EVIDENCE_SOURCE", "comments"))
        .map_err(|reason| invalid("NOTEWRITER_EVIDENCE_SOURCE", reason))?;
    if evidence_source == EvidenceSource::Comments && classifier_url.is_none() {
        return Err(ConfigError::MissingEnvVar(
            "NOTEWRITER_CLASSIFIER_URL".to_string(),
        ));
    }

    let sample_cap = parse_usize("NOTEWRITER_SAMPLE_CAP", "300")?;
    if sample_cap == 0 {
        return Err(invalid("NOTEWRITER_SAMPLE_CAP", "must be at least 1".to_string()));
    }
    let reply_fetch_limit = parse_usize("NOTEWRITER_REPLY_FETCH_LIMIT", "300")?;
    let min_relevant_comments = parse_usize("NOTEWRITER_MIN_RELEVANT_COMMENTS", "1")?.max(1);
    let sample_seed = match lookup("NOTEWRITER_SAMPLE_SEED") {
        Ok(raw) => Some(
            raw.parse::<u64>()
                .map_err(|e| invalid("NOTEWRITER_SAMPLE_SEED", e.to_string()))?,
        ),
        Err(_) => None,
    };

    let request_timeout_secs = parse_u64("NOTEWRITER_REQUEST_TIMEOUT_SECS", "60")?;
    let step_timeout_secs = parse_u64("NOTEWRITER_STEP_TIMEOUT_SECS", "300")?;
    let max_concurrent_posts = parse_usize("NOTEWRITER_MAX_CONCURRENT_POSTS", "4")?.max(1);
    let max_retries = parse_u32("NOTEWRITER_MAX_RETRIES", "3")?;
    let rate_limit_cooldown_secs = parse_u64("NOTEWRITER_RATE_LIMIT_COOLDOWN_SECS", "900")?;
    let retry_backoff_base_ms = parse_u64("NOTEWRITER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let xurl_bin = or_default("NOTEWRITER_XURL_BIN", "xurl");

    Ok(AppConfig {
        log_level,
        x_bearer_token,
        x_api_base_url,
        llm_base_url,
        llm_api_key,
        llm_model,
        vision_model,
        classifier_url,
        classifier_positive_label,
        evidence_source,
        sample_cap,
        reply_fetch_limit,
        min_relevant_comments,
        sample_seed,
        request_timeout_secs,
        step_timeout_secs,
        max_concurrent_posts,
        max_retries,
        rate_limit_cooldown_secs,
        retry_backoff_base_ms,
        xurl_bin,
    })
}

fn parse_evidence_source(s: &str) -> Result<EvidenceSource, String> {
    match s {
        "comments" => Ok(EvidenceSource::Comments),
        "live_search" => Ok(EvidenceSource::LiveSearch),
        other => Err(format!(
            "expected 'comments' or 'live_search', got '{other}'"
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
