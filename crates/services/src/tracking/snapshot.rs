use serde_json::{Map, Value};

use tracking_core::model::{
    AttemptRecord, ContentSession, MasteryCriterion, SessionContext, SessionId,
};

use super::tracker::ProgressTracker;

/// Read-only view of the live session, published after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Option<SessionId>,
    pub context: Option<SessionContext>,
    pub progress: f64,
    pub time_spent: f64,
    pub complete: bool,
    pub extra_fields: Map<String, Value>,
    pub mastery_criterion: Option<MasteryCriterion>,
    pub total_attempts: u64,
    /// Most recent first.
    pub past_attempts: Vec<AttemptRecord>,
}

impl From<&ContentSession> for SessionSnapshot {
    fn from(session: &ContentSession) -> Self {
        Self {
            session_id: session.session_id().cloned(),
            context: session.context().cloned(),
            progress: session.progress(),
            time_spent: session.time_spent(),
            complete: session.complete(),
            extra_fields: session.extra_fields().clone(),
            mastery_criterion: session.mastery_criterion().cloned(),
            total_attempts: session.total_attempts(),
            past_attempts: session.past_attempts(),
        }
    }
}

/// Remembers which session was live when it was taken.
///
/// Lets a view drop results of work it started for a session that has
/// since been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionGuard {
    pub(super) generation: u64,
}

impl SessionGuard {
    /// True while `tracker` has not switched to another session.
    #[must_use]
    pub fn is_current(&self, tracker: &ProgressTracker) -> bool {
        tracker.generation() == self.generation
    }
}
