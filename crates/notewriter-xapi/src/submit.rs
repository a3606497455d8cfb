//! Note submission via the `xurl` CLI.
//!
//! Invokes `xurl -X POST /2/notes -d '{payload}'` as a subprocess; `xurl`
//! owns the OAuth user context that the notes endpoint requires.

use async_trait::async_trait;
use notewriter_core::{MisleadingTag, NoteSubmitter, ProposedMisleadingNote, UpstreamError};
use serde_json::{json, Value};

use crate::error::XApiError;

const NOTES_ENDPOINT: &str = "/2/notes";
const MISLEADING_CLASSIFICATION: &str = "misinformed_or_potentially_misleading";

/// Build the JSON body for `POST /2/notes`.
#[must_use]
pub fn build_submission_payload(note: &ProposedMisleadingNote, test_mode: bool) -> Value {
    let tags: Vec<&str> = note.misleading_tags.iter().copied().map(MisleadingTag::as_str).collect();
    json!({
        "test_mode": test_mode,
        "post_id": note.post_id(),
        "info": {
            "text": note.note_text(),
            "classification": MISLEADING_CLASSIFICATION,
            "misleading_tags": tags,
            "trustworthy_sources": note.note.trustworthy_sources,
        }
    })
}

pub struct XurlSubmitter {
    program: String,
}

impl XurlSubmitter {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Submit `note` and return the endpoint's JSON response.
    ///
    /// Output that is not JSON is wrapped as `{"raw": "<stdout>"}`.
    ///
    /// # Errors
    ///
    /// Returns [`XApiError::Submission`] if the subprocess cannot be spawned
    /// or exits non-zero.
    pub async fn submit_note(
        &self,
        note: &ProposedMisleadingNote,
        test_mode: bool,
    ) -> Result<Value, XApiError> {
        let payload = build_submission_payload(note, test_mode).to_string();

        let output = tokio::process::Command::new(&self.program)
            .args(["-X", "POST", NOTES_ENDPOINT, "-d", payload.as_str()])
            .output()
            .await
            .map_err(|e| XApiError::Submission(format!("{} subprocess error: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(XApiError::Submission(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let response = serde_json::from_str(&stdout)
            .unwrap_or_else(|_| json!({ "raw": stdout.trim() }));
        tracing::info!(post_id = note.post_id(), test_mode, "note submitted");
        Ok(response)
    }
}

#[async_trait]
impl NoteSubmitter for XurlSubmitter {
    async fn submit(
        &self,
        note: &ProposedMisleadingNote,
        test_mode: bool,
    ) -> Result<Value, UpstreamError> {
        Ok(self.submit_note(note, test_mode).await?)
    }
}
