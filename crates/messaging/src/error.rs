//! Messaging error types.

use thiserror::Error;

/// Errors raised by the broker or while encoding messages.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The message could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel refused the message.
    #[error("Publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// An envelope was decoded as a message of another topic.
    #[error("Topic mismatch: expected '{expected}', got '{actual}'")]
    TopicMismatch { expected: String, actual: String },
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
