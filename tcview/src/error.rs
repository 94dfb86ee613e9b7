//! Error taxonomy shared by the explorer client and the analysis pipeline.

/// Errors produced while talking to the explorer or interpreting user input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The explorer answered with an error status (anything but "no data").
    #[error("explorer error: {message} ({detail})")]
    Upstream {
        /// The envelope's `message` field (usually `NOTOK`).
        message: String,
        /// The envelope's `result` field rendered as text.
        detail: String,
    },

    /// The HTTP request failed, timed out, or returned a non-2xx status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The explorer payload was missing a required field or had a bad value.
    #[error("malformed explorer response: {0}")]
    Decode(String),

    /// A date, range, or pool token supplied by the user was not understood.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No usable API key: missing, rejected, or entry was cancelled.
    #[error("API key error: {0}")]
    Credential(String),
}

impl Error {
    /// Whether the error came from the explorer side (HTTP, status, payload).
    ///
    /// Upstream failures during a single pool's fetch degrade that pool only.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Http(_) | Self::Decode(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
