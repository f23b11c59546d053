//! Failure taxonomy surfaced to the user
//!
//! Every variant is recovered where it is detected and shown as a
//! notification: [`CorrectorError::title`] is the heading, `Display` the
//! body. None of them stops the process.

use thiserror::Error;

use crate::desktop::DesktopError;
use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum CorrectorError {
    #[error("Please select some text first.")]
    SelectionEmpty,

    #[error("Selection is {len} characters; the limit is {max}.")]
    SelectionTooLong { len: usize, max: usize },

    #[error("Please enter your OpenAI API key.")]
    MissingCredential,

    #[error("Check your connection.")]
    NoConnectivity,

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("Failed to read encrypted config file: {0}")]
    ConfigRead(String),

    #[error("Failed to save API key: {0}")]
    ConfigWrite(String),

    #[error("API key cannot be empty")]
    EmptyCredential,

    #[error("{0}")]
    Hook(#[from] DesktopError),
}

impl CorrectorError {
    /// Notification heading for this failure
    pub fn title(&self) -> &'static str {
        match self {
            CorrectorError::SelectionEmpty => "Nothing Selected",
            CorrectorError::SelectionTooLong { .. } => "Limit Exceeded",
            CorrectorError::MissingCredential => "API Key Error",
            CorrectorError::NoConnectivity => "No Internet",
            CorrectorError::Service(_) => "API Error",
            CorrectorError::ConfigRead(_) => "Config Error",
            CorrectorError::ConfigWrite(_) => "Save Error",
            CorrectorError::EmptyCredential => "Error",
            CorrectorError::Hook(_) => HOOK_ERROR_TITLE,
        }
    }
}

/// Heading used for any fault inside the triggered action
pub const HOOK_ERROR_TITLE: &str = "Hotkey Error";
