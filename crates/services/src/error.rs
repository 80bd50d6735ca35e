//! Errors surfaced by the progress tracker.

use thiserror::Error;

use api::ApiError;
use tracking_core::model::{SessionArgsError, UpdateArgsError};

/// Errors emitted by `ProgressTracker`.
///
/// `Clone` because one save outcome is delivered to every caller whose update
/// went into it.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TrackerError {
    #[error(transparent)]
    InvalidSessionArgs(#[from] SessionArgsError),
    #[error(transparent)]
    InvalidUpdateArgs(#[from] UpdateArgsError),
    #[error("no session initialized")]
    NoSession,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("session was replaced before its pending updates were saved")]
    SessionReplaced,
    #[error("tracker shut down before the update was saved")]
    Closed,
}

impl TrackerError {
    /// True when an update arrived before any session was initialized.
    #[must_use]
    pub fn is_no_session(&self) -> bool {
        matches!(self, Self::NoSession)
    }
}
