//! Controller error types.
//!
//! Only transport and formatting errors reach the user, through an editor
//! notification carrying [`TransportError::user_message`] or
//! [`FormatError::user_message`]. Cancellation is an outcome, not a failure,
//! and authorization errors are logged only: the user retries the gesture.

use thiserror::Error;

/// Outcome of an editor `encrypt` call other than success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// The user dismissed the editor dialog.
    #[error("editor dialog cancelled")]
    Cancelled,

    /// The editor or crypto engine failed.
    #[error("editor failed: {0}")]
    Failed(String),
}

impl EditorError {
    /// Returns true for the distinguished user-cancellation outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Mail transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request did not reach the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Provider answered with an error status.
    #[error("provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Provider message.
        message: String,
    },

    /// The referenced message does not exist.
    #[error("message not found: {message_id}")]
    NotFound {
        /// Requested id.
        message_id: String,
    },

    /// Token was refused.
    #[error("access token refused")]
    Unauthorized,
}

impl TransportError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Unauthorized => false,
        }
    }

    /// Message shown in the editor's error notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Sending failed: the mail server could not be reached.".to_owned(),
            Self::Rejected { message, .. } => format!("Sending failed: {message}"),
            Self::NotFound { .. } => "The original message could not be found.".to_owned(),
            Self::Unauthorized => "Sending failed: authorization expired, please sign in again.".to_owned(),
        }
    }
}

/// Failures building the outbound message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No recipient to send to.
    #[error("message has no recipients")]
    NoRecipients,

    /// Encoded message exceeds the provider quota.
    #[error("message of {size} bytes exceeds quota of {quota} bytes")]
    TooLarge {
        /// Encoded size.
        size: usize,
        /// Provider limit.
        quota: usize,
    },

    /// Message construction failed.
    #[error("message build failed: {0}")]
    Build(String),
}

impl FormatError {
    /// Message shown in the editor's error notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoRecipients => "Please add at least one recipient.".to_owned(),
            Self::TooLarge { quota, .. } => {
                format!("The message is too large. The limit is {} MB.", quota / (1024 * 1024))
            },
            Self::Build(_) => "The message could not be built.".to_owned(),
        }
    }
}

/// Authorization prompt failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The user closed the prompt.
    #[error("authorization cancelled")]
    Cancelled,

    /// The provider denied the grant.
    #[error("authorization denied: {0}")]
    Denied(String),

    /// The prompt could not be completed.
    #[error("authorization failed: {0}")]
    Failed(String),
}
