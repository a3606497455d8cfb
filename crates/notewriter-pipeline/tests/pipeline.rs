//! End-to-end pipeline runs against deterministic in-process collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notewriter_core::{
    ChatCompletion, CommentSource, EligiblePost, ImageDescriber, Media, MisleadingTag, Post,
    PostReference, UpstreamError,
};
use notewriter_pipeline::drafting::LIVE_SEARCH_SYSTEM_PROMPT;
use notewriter_pipeline::{
    cancellation, validate_note_text, Cancellation, Evidence, NoteWriter, PipelineConfig,
    RelevanceClassifier, TagClassifier, TagError,
};
use notewriter_xapi::{RetryPolicy, XApiClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Stubs
// ---------------------------------------------------------------------------

struct StubComments {
    comments: Vec<String>,
}

#[async_trait]
impl CommentSource for StubComments {
    async fn fetch_comments(
        &self,
        _post_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, UpstreamError> {
        Ok(self.comments.iter().take(limit).cloned().collect())
    }
}

struct FailingComments;

#[async_trait]
impl CommentSource for FailingComments {
    async fn fetch_comments(&self, _: &str, _: usize) -> Result<Vec<String>, UpstreamError> {
        Err(UpstreamError::request("x-api", "connection reset"))
    }
}

/// Takes `delay` to answer but declares `budget` as its worst case.
struct SlowComments {
    delay: Duration,
    budget: Option<Duration>,
}

#[async_trait]
impl CommentSource for SlowComments {
    async fn fetch_comments(&self, _: &str, _: usize) -> Result<Vec<String>, UpstreamError> {
        tokio::time::sleep(self.delay).await;
        Ok(nasa_comments())
    }

    fn fetch_budget(&self, _limit: usize) -> Option<Duration> {
        self.budget
    }
}

/// Relevant iff the comment contains a URL.
struct UrlRelevance;

#[async_trait]
impl RelevanceClassifier for UrlRelevance {
    async fn classify(&self, _post_text: &str, comment: &str) -> Result<bool, UpstreamError> {
        Ok(comment.contains("https://"))
    }
}

#[derive(Default)]
struct StubDescriber {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageDescriber for StubDescriber {
    async fn describe_image(&self, url: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("A flooded street ({url})"))
    }
}

/// Answers live-search prompts with `research` and every other prompt with
/// `draft`, recording the drafting prompts it receives.
struct ScriptedChat {
    draft: String,
    research: String,
    drafting_prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    fn drafting(draft: &str) -> Self {
        Self {
            draft: draft.to_owned(),
            research: String::new(),
            drafting_prompts: Mutex::new(Vec::new()),
        }
    }

    fn drafting_calls(&self) -> usize {
        self.drafting_prompts.lock().unwrap().len()
    }

    fn last_drafting_prompt(&self) -> String {
        self.drafting_prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("drafting was called")
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &[String],
    ) -> Result<String, UpstreamError> {
        if system_prompt == LIVE_SEARCH_SYSTEM_PROMPT {
            return Ok(self.research.clone());
        }
        self.drafting_prompts
            .lock()
            .unwrap()
            .push(user_content.join("\n"));
        Ok(self.draft.clone())
    }
}

/// Never answers.
struct HangingChat;

#[async_trait]
impl ChatCompletion for HangingChat {
    async fn complete(&self, _: &str, _: &[String]) -> Result<String, UpstreamError> {
        std::future::pending().await
    }
}

struct StubTags(Vec<MisleadingTag>);

#[async_trait]
impl TagClassifier for StubTags {
    async fn infer_tags(&self, _: &str, _: &str) -> Result<Vec<MisleadingTag>, TagError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const NOTE: &str = "Earth is an oblate spheroid, as NASA imagery shows. https://nasa.gov/x";

fn post(id: &str, text: &str) -> Post {
    Post {
        id: id.to_owned(),
        author_id: "42".to_owned(),
        created_at: "2025-07-01T12:00:00Z".parse().unwrap(),
        text: text.to_owned(),
        media: vec![],
    }
}

fn media(media_type: &str) -> Media {
    Media {
        media_key: "3_1".to_owned(),
        media_type: media_type.to_owned(),
        url: Some("https://pbs.twimg.com/media/flood.jpg".to_owned()),
        preview_image_url: None,
        height: Some(600),
        width: Some(800),
        duration_ms: None,
        view_count: None,
    }
}

fn eligible(post: Post) -> EligiblePost {
    EligiblePost {
        post,
        references: vec![],
    }
}

fn flat_earth() -> EligiblePost {
    eligible(post("1001", "Earth is flat"))
}

fn seeded_config() -> PipelineConfig {
    PipelineConfig {
        sample_seed: Some(7),
        ..PipelineConfig::default()
    }
}

struct Harness {
    chat: Arc<ScriptedChat>,
    describer: Arc<StubDescriber>,
    writer: NoteWriter,
}

fn harness_with(
    config: PipelineConfig,
    comments: Vec<String>,
    chat: ScriptedChat,
    tags: Vec<MisleadingTag>,
) -> Harness {
    let chat = Arc::new(chat);
    let describer = Arc::new(StubDescriber::default());
    let writer = NoteWriter::new(
        config,
        Evidence::Comments {
            source: Arc::new(StubComments { comments }),
            relevance: Arc::new(UrlRelevance),
        },
        describer.clone(),
        chat.clone(),
        Arc::new(StubTags(tags)),
    );
    Harness {
        chat,
        describer,
        writer,
    }
}

fn harness(comments: Vec<String>, draft: &str) -> Harness {
    harness_with(
        seeded_config(),
        comments,
        ScriptedChat::drafting(draft),
        vec![MisleadingTag::FactualError],
    )
}

fn nasa_comments() -> Vec<String> {
    vec!["NASA confirms Earth is round: https://nasa.gov/x".to_owned()]
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refuting_comment_produces_note() {
    let h = harness(nasa_comments(), NOTE);
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    let note = result.note().expect("expected a note");
    assert_eq!(note.post_id(), "1001");
    assert!(note.note_text().contains("https://nasa.gov/x"));
    assert!(validate_note_text(note.note_text()).is_empty());
    assert_eq!(note.misleading_tags, vec![MisleadingTag::FactualError]);
    assert!(note.note.trustworthy_sources);
    assert!(result.refusal().is_none() && result.error().is_none());
    assert!(result
        .context_description
        .as_deref()
        .unwrap()
        .contains("Earth is flat"));
    assert!(h
        .chat
        .last_drafting_prompt()
        .contains("NASA confirms Earth is round: https://nasa.gov/x"));
}

#[tokio::test]
async fn sentinel_answer_is_refusal() {
    let h = harness(nasa_comments(), "NO NOTE NEEDED.");
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert_eq!(result.refusal(), Some("NO NOTE NEEDED."));
    assert!(result.note().is_none());
    assert!(result.error().is_none());
}

#[tokio::test]
async fn photo_caption_lands_in_description() {
    let h = harness(nasa_comments(), "NO NOTE NEEDED.");
    let mut flood = post("1001", "Miami flooding today");
    flood.media.push(media("photo"));

    let result = h
        .writer
        .write_note(eligible(flood), &Cancellation::never())
        .await;

    let description = result.context_description.unwrap();
    assert!(description.contains("Summary of images in the post:"));
    assert!(description
        .contains("Image 0: A flooded street (https://pbs.twimg.com/media/flood.jpg)"));
    assert_eq!(h.describer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_quoted_references_is_error() {
    let h = harness(nasa_comments(), NOTE);
    let mut item = flat_earth();
    item.references = vec![
        PostReference {
            kind: "quoted".to_owned(),
            post: post("2", "first"),
        },
        PostReference {
            kind: "quoted".to_owned(),
            post: post("3", "second"),
        },
    ];

    let result = h.writer.write_note(item, &Cancellation::never()).await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("multiple quoted posts"), "got: {error}");
    assert_eq!(result.post.as_ref().unwrap().post.id, "1001");
    assert!(result.post.as_ref().unwrap().quoted_post.is_none());
    assert_eq!(h.chat.drafting_calls(), 0);
}

#[tokio::test]
async fn unknown_reference_type_is_error() {
    let h = harness(nasa_comments(), NOTE);
    let mut item = flat_earth();
    item.references = vec![PostReference {
        kind: "retweeted".to_owned(),
        post: post("2", "x"),
    }];

    let result = h.writer.write_note(item, &Cancellation::never()).await;

    assert!(result.error().unwrap().contains("retweeted"));
    assert_eq!(h.chat.drafting_calls(), 0);
}

#[tokio::test]
async fn quoted_and_replied_to_are_described() {
    let h = harness(nasa_comments(), "NO NOTE NEEDED.");
    let mut item = flat_earth();
    item.references = vec![
        PostReference {
            kind: "quoted".to_owned(),
            post: post("2", "the quoted claim"),
        },
        PostReference {
            kind: "replied_to".to_owned(),
            post: post("3", "the parent post"),
        },
    ];

    let result = h.writer.write_note(item, &Cancellation::never()).await;

    let context = result.post.as_ref().unwrap();
    assert_eq!(context.quoted_post.as_ref().unwrap().id, "2");
    assert_eq!(context.in_reply_to_post.as_ref().unwrap().id, "3");
    let description = result.context_description.unwrap();
    assert!(description.contains("the quoted claim"));
    assert!(description.contains("the parent post"));
}

#[tokio::test]
async fn non_photo_media_never_reaches_drafting() {
    for holder in ["post", "quoted", "replied_to"] {
        let h = harness(nasa_comments(), NOTE);
        let mut item = flat_earth();
        let mut other = post("2", "with a clip");
        match holder {
            "post" => item.post.media.push(media("video")),
            kind => {
                other.media.push(media("animated_gif"));
                item.references.push(PostReference {
                    kind: kind.to_owned(),
                    post: other,
                });
            }
        }

        let result = h.writer.write_note(item, &Cancellation::never()).await;

        let error = result.error().expect("expected an error");
        assert!(error.starts_with("Unsupported media type"), "got: {error}");
        assert_eq!(h.chat.drafting_calls(), 0, "{holder}: drafting must not run");
        assert_eq!(
            h.describer.calls.load(Ordering::SeqCst),
            0,
            "{holder}: no captioning before the media check"
        );
    }
}

#[tokio::test]
async fn no_relevant_comments_is_refusal_not_error() {
    let h = harness(
        vec!["lol".to_owned(), "ratio".to_owned()],
        NOTE,
    );
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert_eq!(
        result.refusal(),
        Some("NOT ENOUGH EVIDENCE TO WRITE A GOOD COMMUNITY NOTE.")
    );
    assert!(result.error().is_none());
    assert!(result.context_description.is_some());
    assert_eq!(h.chat.drafting_calls(), 0);
}

#[tokio::test]
async fn empty_conversation_is_refusal() {
    let h = harness(vec![], NOTE);
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert!(result.refusal().is_some());
}

#[tokio::test]
async fn below_min_relevant_comments_is_refusal() {
    let config = PipelineConfig {
        min_relevant_comments: 5,
        ..seeded_config()
    };
    let comments = (0..3)
        .map(|i| format!("source {i}: https://example.org/{i}"))
        .collect();
    let h = harness_with(
        config,
        comments,
        ScriptedChat::drafting(NOTE),
        vec![MisleadingTag::Other],
    );

    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert!(result.refusal().is_some());
    assert_eq!(h.chat.drafting_calls(), 0);
}

#[tokio::test]
async fn large_evidence_is_sampled_to_cap() {
    let comments: Vec<String> = (0..1_000)
        .map(|i| format!("evidence-{i} https://example.org/{i}"))
        .collect();
    let config = PipelineConfig {
        reply_fetch_limit: 1_000,
        ..seeded_config()
    };
    let h = harness_with(
        config,
        comments,
        ScriptedChat::drafting(NOTE),
        vec![MisleadingTag::FactualError],
    );

    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;
    assert!(result.note().is_some());

    let prompt = h.chat.last_drafting_prompt();
    let passed: Vec<&str> = prompt
        .lines()
        .filter(|line| line.starts_with("evidence-"))
        .collect();
    assert_eq!(passed.len(), 300);
    let unique: HashSet<&&str> = passed.iter().collect();
    assert_eq!(unique.len(), 300, "sampled without replacement");
}

#[tokio::test]
async fn repeated_runs_are_identical() {
    let comments: Vec<String> = (0..500)
        .map(|i| format!("evidence-{i} https://example.org/{i}"))
        .collect();

    let first = harness(comments.clone(), NOTE);
    let second = harness(comments, NOTE);
    let a = first
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;
    let b = second
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert_eq!(a, b);
    assert_eq!(
        first.chat.last_drafting_prompt(),
        second.chat.last_drafting_prompt()
    );
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[tokio::test]
async fn empty_tag_set_is_error() {
    let h = harness_with(
        seeded_config(),
        nasa_comments(),
        ScriptedChat::drafting(NOTE),
        vec![],
    );
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("invalid misleading tag set"), "got: {error}");
    assert!(result.note().is_none());
}

#[tokio::test]
async fn duplicate_tags_are_collapsed() {
    let h = harness_with(
        seeded_config(),
        nasa_comments(),
        ScriptedChat::drafting(NOTE),
        vec![
            MisleadingTag::MissingImportantContext,
            MisleadingTag::MissingImportantContext,
        ],
    );
    let result = h
        .writer
        .write_note(flat_earth(), &Cancellation::never())
        .await;

    assert_eq!(
        result.note().unwrap().misleading_tags,
        vec![MisleadingTag::MissingImportantContext]
    );
}

#[tokio::test]
async fn upstream_failure_is_error_naming_the_step() {
    let chat = Arc::new(ScriptedChat::drafting(NOTE));
    let writer = NoteWriter::new(
        seeded_config(),
        Evidence::Comments {
            source: Arc::new(FailingComments),
            relevance: Arc::new(UrlRelevance),
        },
        Arc::new(StubDescriber::default()),
        chat.clone(),
        Arc::new(StubTags(vec![MisleadingTag::Other])),
    );

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("fetch_comments failed"), "got: {error}");
    assert!(error.contains("connection reset"), "got: {error}");
    assert_eq!(chat.drafting_calls(), 0);
}

#[tokio::test]
async fn cancelled_before_start_is_error() {
    let h = harness(nasa_comments(), NOTE);
    let (handle, cancel) = cancellation();
    handle.cancel();

    let result = h.writer.write_note(flat_earth(), &cancel).await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("cancelled during fetch_comments"), "got: {error}");
    assert!(result.note().is_none() && result.refusal().is_none());
}

#[tokio::test]
async fn cancel_mid_draft_is_error_never_partial() {
    let writer = NoteWriter::new(
        seeded_config(),
        Evidence::Comments {
            source: Arc::new(StubComments {
                comments: nasa_comments(),
            }),
            relevance: Arc::new(UrlRelevance),
        },
        Arc::new(StubDescriber::default()),
        Arc::new(HangingChat),
        Arc::new(StubTags(vec![MisleadingTag::FactualError])),
    );
    let (handle, cancel) = cancellation();

    let run = writer.write_note(flat_earth(), &cancel);
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    };
    let (result, ()) = tokio::join!(run, trigger);

    let error = result.error().expect("expected an error");
    assert!(error.contains("cancelled during draft_note"), "got: {error}");
    assert!(result.context_description.is_some());
    assert!(result.note().is_none() && result.refusal().is_none());
}

#[tokio::test]
async fn slow_step_times_out_as_error() {
    let writer = NoteWriter::new(
        PipelineConfig {
            step_timeout: Duration::from_millis(20),
            ..seeded_config()
        },
        Evidence::LiveSearch,
        Arc::new(StubDescriber::default()),
        Arc::new(HangingChat),
        Arc::new(StubTags(vec![MisleadingTag::FactualError])),
    );

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("live_search timed out"), "got: {error}");
}

#[tokio::test]
async fn live_search_answer_feeds_drafting() {
    let chat = Arc::new(ScriptedChat {
        draft: NOTE.to_owned(),
        research: "NASA: Earth is round https://nasa.gov/x".to_owned(),
        drafting_prompts: Mutex::new(Vec::new()),
    });
    let writer = NoteWriter::new(
        seeded_config(),
        Evidence::LiveSearch,
        Arc::new(StubDescriber::default()),
        chat.clone(),
        Arc::new(StubTags(vec![MisleadingTag::FactualError])),
    );

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    assert!(result.note().is_some());
    let prompt = chat.last_drafting_prompt();
    assert!(prompt.contains("Live search results:\n```\nNASA: Earth is round https://nasa.gov/x"));
    assert!(prompt.contains("Earth is flat"));
}

fn writer_with_source(source: Arc<dyn CommentSource>, step_timeout: Duration) -> NoteWriter {
    NoteWriter::new(
        PipelineConfig {
            step_timeout,
            ..seeded_config()
        },
        Evidence::Comments {
            source,
            relevance: Arc::new(UrlRelevance),
        },
        Arc::new(StubDescriber::default()),
        Arc::new(ScriptedChat::drafting(NOTE)),
        Arc::new(StubTags(vec![MisleadingTag::FactualError])),
    )
}

#[tokio::test]
async fn comment_fetch_gets_the_source_budget_not_the_step_timeout() {
    let writer = writer_with_source(
        Arc::new(SlowComments {
            delay: Duration::from_millis(100),
            budget: Some(Duration::from_secs(5)),
        }),
        Duration::from_millis(20),
    );

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    assert!(result.note().is_some(), "got: {:?}", result.outcome);
}

#[tokio::test]
async fn comment_fetch_without_budget_uses_step_timeout() {
    let writer = writer_with_source(
        Arc::new(SlowComments {
            delay: Duration::from_millis(200),
            budget: None,
        }),
        Duration::from_millis(20),
    );

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    let error = result.error().expect("expected an error");
    assert!(error.contains("fetch_comments timed out"), "got: {error}");
}

#[tokio::test]
async fn rate_limited_reply_fetch_recovers_inside_the_x_client() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                { "id": "2001", "text": "NASA confirms Earth is round: https://nasa.gov/x" }
            ],
            "meta": { "result_count": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    // The cooldown outlasts the step timeout, as with the production defaults.
    let retry = RetryPolicy {
        max_retries: 1,
        rate_limit_cooldown_secs: 1,
        backoff_base_ms: 0,
    };
    let step_timeout = Duration::from_millis(300);
    assert!(Duration::from_secs(retry.rate_limit_cooldown_secs) > step_timeout);

    let client = XApiClient::with_base_url("test-token", 5, retry, &server.uri())
        .expect("client construction should not fail");
    let writer = writer_with_source(Arc::new(client), step_timeout);

    let result = writer.write_note(flat_earth(), &Cancellation::never()).await;

    let note = result.note().expect("rate limit should be absorbed by the X client");
    assert!(note.note_text().contains("https://nasa.gov/x"));
}
