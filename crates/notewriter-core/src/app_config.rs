/// Where the drafting step gets its evidence from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSource {
    /// Conversation replies, filtered by the relevance classifier and sampled.
    Comments,
    /// A live-search LLM call researching the post.
    LiveSearch,
}

impl std::fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceSource::Comments => write!(f, "comments"),
            EvidenceSource::LiveSearch => write!(f, "live_search"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub x_bearer_token: String,
    pub x_api_base_url: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub vision_model: String,
    pub classifier_url: Option<String>,
    pub classifier_positive_label: String,
    pub evidence_source: EvidenceSource,
    pub sample_cap: usize,
    pub reply_fetch_limit: usize,
    pub min_relevant_comments: usize,
    pub sample_seed: Option<u64>,
    pub request_timeout_secs: u64,
    pub step_timeout_secs: u64,
    pub max_concurrent_posts: usize,
    pub max_retries: u32,
    pub rate_limit_cooldown_secs: u64,
    pub retry_backoff_base_ms: u64,
    pub xurl_bin: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("x_bearer_token", &"[redacted]")
            .field("x_api_base_url", &self.x_api_base_url)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key", &"[redacted]")
            .field("llm_model", &self.llm_model)
            .field("vision_model", &self.vision_model)
            .field("classifier_url", &self.classifier_url)
            .field("classifier_positive_label", &self.classifier_positive_label)
            .field("evidence_source", &self.evidence_source)
            .field("sample_cap", &self.sample_cap)
            .field("reply_fetch_limit", &self.reply_fetch_limit)
            .field("min_relevant_comments", &self.min_relevant_comments)
            .field("sample_seed", &self.sample_seed)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("step_timeout_secs", &self.step_timeout_secs)
            .field("max_concurrent_posts", &self.max_concurrent_posts)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_cooldown_secs", &self.rate_limit_cooldown_secs)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("xurl_bin", &self.xurl_bin)
            .finish()
    }
}
