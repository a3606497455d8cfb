//! X API collaborator for the note writer.
//!
//! Fetches posts eligible for notes (with their quoted / replied-to posts and
//! media expanded), pulls conversation replies as candidate evidence, and
//! submits accepted notes through the `xurl` CLI. Rate limits are absorbed
//! here by a bounded retry policy and never reach the pipeline.

pub mod client;
pub mod error;
pub mod parse;
pub mod retry;
pub mod submit;
pub mod types;

pub use client::XApiClient;
pub use error::XApiError;
pub use parse::parse_eligible_response;
pub use retry::RetryPolicy;
pub use submit::{build_submission_payload, XurlSubmitter};
