use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::attempt::AttemptRecord;

/// Contract violations in the arguments passed to a session update.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum UpdateArgsError {
    #[error("must provide only one of progress or progress_delta")]
    ProgressConflict,

    #[error("progress must be a finite number, got {0}")]
    InvalidProgress(f64),

    #[error("progress_delta must be a finite number, got {0}")]
    InvalidProgressDelta(f64),

    #[error("interaction must carry an id or an item")]
    UnidentifiedInteraction,
}

/// A local update to the live content session.
///
/// Every field is optional; an empty update only accounts for elapsed time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub progress: Option<f64>,
    pub progress_delta: Option<f64>,
    pub content_state: Option<Map<String, Value>>,
    pub interaction: Option<AttemptRecord>,
    pub immediate: bool,
    pub force: bool,
}

/// How an update moves progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressChange {
    Absolute(f64),
    Relative(f64),
}

/// A `SessionUpdate` that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedUpdate {
    pub progress: Option<ProgressChange>,
    pub content_state: Option<Map<String, Value>>,
    pub interaction: Option<AttemptRecord>,
    pub immediate: bool,
    pub force: bool,
}

impl SessionUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn progress_delta(mut self, delta: f64) -> Self {
        self.progress_delta = Some(delta);
        self
    }

    #[must_use]
    pub fn content_state(mut self, state: Map<String, Value>) -> Self {
        self.content_state = Some(state);
        self
    }

    #[must_use]
    pub fn interaction(mut self, interaction: AttemptRecord) -> Self {
        self.interaction = Some(interaction);
        self
    }

    /// Skip the debounce delay and flush as soon as possible.
    #[must_use]
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// Save whatever is pending even if no threshold has been reached.
    #[must_use]
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Check the caller contract.
    ///
    /// # Errors
    ///
    /// Returns `UpdateArgsError` when both `progress` and `progress_delta` are
    /// given, when either is not finite, or when an interaction has neither an
    /// id nor an item.
    pub fn validate(self) -> Result<ValidatedUpdate, UpdateArgsError> {
        let progress = match (self.progress, self.progress_delta) {
            (Some(_), Some(_)) => return Err(UpdateArgsError::ProgressConflict),
            (Some(p), None) if !p.is_finite() => return Err(UpdateArgsError::InvalidProgress(p)),
            (None, Some(d)) if !d.is_finite() => {
                return Err(UpdateArgsError::InvalidProgressDelta(d));
            }
            (Some(p), None) => Some(ProgressChange::Absolute(p)),
            (None, Some(d)) => Some(ProgressChange::Relative(d)),
            (None, None) => None,
        };

        if let Some(interaction) = &self.interaction {
            if interaction.id.is_none() && interaction.item.is_none() {
                return Err(UpdateArgsError::UnidentifiedInteraction);
            }
        }

        Ok(ValidatedUpdate {
            progress,
            content_state: self.content_state,
            interaction: self.interaction,
            immediate: self.immediate,
            force: self.force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_and_delta_are_exclusive() {
        let err = SessionUpdate::new()
            .progress(0.5)
            .progress_delta(0.1)
            .validate()
            .unwrap_err();
        assert_eq!(err, UpdateArgsError::ProgressConflict);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = SessionUpdate::new().progress(f64::NAN).validate().unwrap_err();
        assert!(matches!(err, UpdateArgsError::InvalidProgress(_)));

        let err = SessionUpdate::new()
            .progress_delta(f64::INFINITY)
            .validate()
            .unwrap_err();
        assert!(matches!(err, UpdateArgsError::InvalidProgressDelta(_)));
    }

    #[test]
    fn interaction_needs_an_identity() {
        let err = SessionUpdate::new()
            .interaction(AttemptRecord::default())
            .validate()
            .unwrap_err();
        assert_eq!(err, UpdateArgsError::UnidentifiedInteraction);
    }

    #[test]
    fn empty_update_is_valid() {
        let update = SessionUpdate::new().validate().unwrap();
        assert_eq!(update, ValidatedUpdate::default());
    }

    #[test]
    fn flags_carry_over() {
        let update = SessionUpdate::new()
            .progress_delta(0.2)
            .immediate()
            .force()
            .validate()
            .unwrap();
        assert_eq!(update.progress, Some(ProgressChange::Relative(0.2)));
        assert!(update.immediate);
        assert!(update.force);
    }
}
