//! Error types for the pair-chat engine
//!
//! Client-visible failures carry an [`ErrorCode`] that the transport layer
//! forwards verbatim; everything else stays internal.

use serde::{Deserialize, Serialize};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Error codes surfaced to the originating connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimited,
    BadRequest,
    MessageTooLong,
    ImageTooLarge,
    UnsupportedImage,
    NotInRoom,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::MessageTooLong => "MESSAGE_TOO_LONG",
            ErrorCode::ImageTooLarge => "IMAGE_TOO_LARGE",
            ErrorCode::UnsupportedImage => "UNSUPPORTED_IMAGE",
            ErrorCode::NotInRoom => "NOT_IN_ROOM",
        };
        write!(f, "{}", name)
    }
}

/// Custom error types for specific chat-engine scenarios
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Rate limited: {action}")]
    RateLimited { action: String },

    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    #[error("Message exceeds maximum length of {max}")]
    MessageTooLong { max: usize },

    #[error("Image exceeds maximum size of {max} bytes")]
    ImageTooLarge { max: usize },

    #[error("Unsupported image mime type: {mime}")]
    UnsupportedImage { mime: String },

    #[error("User is not in an active room")]
    NotInRoom,

    #[error("Internal engine error: {message}")]
    Internal { message: String },
}

impl ChatError {
    /// Client-facing code for this error, if it has one.
    ///
    /// `Internal` deliberately maps to nothing: inconsistencies are cleaned
    /// up in place and never reported to a connection.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ChatError::RateLimited { .. } => Some(ErrorCode::RateLimited),
            ChatError::BadRequest { .. } => Some(ErrorCode::BadRequest),
            ChatError::MessageTooLong { .. } => Some(ErrorCode::MessageTooLong),
            ChatError::ImageTooLarge { .. } => Some(ErrorCode::ImageTooLarge),
            ChatError::UnsupportedImage { .. } => Some(ErrorCode::UnsupportedImage),
            ChatError::NotInRoom => Some(ErrorCode::NotInRoom),
            ChatError::Internal { .. } => None,
        }
    }
}
