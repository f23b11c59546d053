//! Text-correction service boundary
//!
//! The transaction needs two things from the network: a cheap
//! reachability probe and the correction call itself.

mod openai;

use std::future::Future;

use thiserror::Error;

pub use openai::OpenAiService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("API returned no text")]
    EmptyReply,
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Decode(err.to_string())
        } else {
            ServiceError::Transport(err.to_string())
        }
    }
}

pub trait CorrectionService {
    /// Pre-flight connectivity check against the service host
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;

    /// Return the corrected version of `text`
    fn correct(
        &self,
        text: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;
}
