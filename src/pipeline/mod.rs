pub mod types;
pub mod sanitize;
pub mod prompt;
pub mod client;
pub mod watsonx;
pub mod interpret;
pub mod history;
pub mod orchestrator;

pub use types::*;
pub use client::*;
pub use history::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::models::ValidationError;
use crate::report::ReportError;

/// Failure of a single completion call. Every variant surfaces to the user
/// as "service unavailable".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Completion service unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Completion service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Completion service returned no results")]
    EmptyResults,
}

/// Model output for a structured request could not be accepted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    #[error("Malformed model output: {reason}")]
    MalformedModelOutput { reason: String, raw: String },
}

impl InterpretError {
    pub fn raw(&self) -> &str {
        match self {
            InterpretError::MalformedModelOutput { raw, .. } => raw,
        }
    }
}

/// Errors returned by assistant operations. None of them end the session.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Shown to the user as the fixed fallback text; the provider detail is
    /// kept in the source error and logged where the call failed.
    #[error("{}", interpret::FALLBACK_MESSAGE)]
    ServiceUnavailable(#[from] CompletionError),

    #[error("Could not understand the AI response")]
    MalformedModelOutput(#[from] InterpretError),

    #[error("Report export failed: {0}")]
    Export(#[from] ReportError),
}
