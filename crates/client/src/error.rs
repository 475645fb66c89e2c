//! Error taxonomy of the panel client.
//!
//! Every variant is raised where it is detected and caught once at the
//! top of a user-triggered action (submission or mask apply), where its
//! `Display` text is what the user sees.

use atelier_core::error::CoreError;

/// Errors surfaced by the panel client.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Non-2xx response, or a payload whose `status` reads `"error"`.
    ///
    /// Displays the server-supplied message verbatim, or `HTTP <status>`
    /// when the server sent none.
    #[error("{message}")]
    Transport {
        /// HTTP status code of the response.
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, connect, timeout...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not JSON.
    #[error("Non-JSON response ({status}): {body}")]
    NonJsonResponse {
        status: u16,
        /// First 200 characters of the raw body.
        body: String,
    },

    /// JSON parsed but lacked a required field.
    #[error("Unexpected response payload: {0}")]
    MalformedPayload(String),

    /// The upload endpoint did not report success.
    #[error("{0}")]
    UploadFailed(String),

    /// The active mode needs a file and none was selected.
    #[error("{0}")]
    MissingUpload(&'static str),

    /// Mask apply was requested with nothing drawn.
    #[error("Draw the region to repair first")]
    MaskNotDrawn,

    /// The drawn mask could not be encoded.
    #[error("Could not export mask: {0}")]
    MaskExportFailed(String),

    /// Mask apply needs a previously displayed result.
    #[error("No result to apply the mask to")]
    NoPreviousResult,

    /// The result never appeared within the polling budget.
    #[error("Timed out waiting for result after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    /// A newer submission started and cancelled this one.
    #[error("Superseded by a newer submission")]
    Superseded,

    /// The form failed validation before any network call.
    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CoreError> for PanelError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::InvalidForm(msg),
            CoreError::Encode(msg) => Self::MaskExportFailed(msg),
        }
    }
}
