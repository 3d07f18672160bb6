//! Error types for the authentication session.

use thiserror::Error;

use super::capture::CaptureError;
use super::storage::StorageError;
use crate::api::ApiError;

/// Errors that end an authentication attempt.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither the stored token nor a fresh authorization produced a session.
    #[error("authentication failed: {reason}")]
    Failed {
        /// What went wrong on the last attempt.
        reason: String,
    },

    /// The user interrupted the authorization step.
    #[error("authorization aborted by user")]
    Aborted,

    /// A token grant failed.
    #[error("token request failed: {0}")]
    Token(#[from] ApiError),

    /// Refresh-token persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Creates an authentication failure with the given reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the user aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

impl From<CaptureError> for AuthError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::Aborted => Self::Aborted,
            other => Self::failed(format!("could not obtain an authorization code: {other}")),
        }
    }
}
