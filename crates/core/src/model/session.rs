use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::attempt::{AttemptChange, AttemptHistory, AttemptRecord};
use crate::model::context::{MasteryCriterion, SessionContext};
use crate::model::ids::SessionId;
use crate::model::update::{ProgressChange, ValidatedUpdate};
use crate::numeric::{clamp01, round_up_3};

/// Key under `extra_fields` holding the content renderer's saved state.
pub const CONTENT_STATE_KEY: &str = "contentState";

//
// ─── FLUSH THRESHOLDS ──────────────────────────────────────────────────────────
//

/// Limits past which accumulated changes are worth a server round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushThresholds {
    /// Unsaved progress at or above this is flushed.
    pub progress: f64,
    /// Unsaved seconds at or above this are flushed.
    pub time_spent: f64,
    /// More queued interactions than this are flushed.
    pub max_queued_interactions: usize,
}

impl Default for FlushThresholds {
    fn default() -> Self {
        Self {
            progress: 0.4,
            time_spent: 120.0,
            max_queued_interactions: 2,
        }
    }
}

//
// ─── SEED / DELTA ──────────────────────────────────────────────────────────────
//

/// Server state a session is (re)started from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSeed {
    pub session_id: SessionId,
    pub context: Option<SessionContext>,
    pub complete: bool,
    pub progress: f64,
    pub time_spent: f64,
    pub extra_fields: Map<String, Value>,
    pub mastery_criterion: Option<MasteryCriterion>,
    /// Most recent first.
    pub past_attempts: Vec<AttemptRecord>,
    pub total_attempts: u64,
}

/// Changes accumulated since the last save; the body of an update request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_delta: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_fields: Option<Map<String, Value>>,
}

impl SessionDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.progress_delta.is_none()
            && self.time_spent_delta.is_none()
            && self.interactions.is_empty()
            && self.extra_fields.is_none()
    }
}

/// What a local update did that matters for flush scheduling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalChange {
    /// Progress went from below 1 to 1.
    pub completed: bool,
    /// An interaction without a server id was queued.
    pub unidentified_interaction: bool,
}

impl LocalChange {
    #[must_use]
    pub fn requires_immediate_flush(&self) -> bool {
        self.completed || self.unidentified_interaction
    }
}

//
// ─── CONTENT SESSION ───────────────────────────────────────────────────────────
//

/// The one live content session of a tracker.
///
/// Holds the server-confirmed state plus everything accumulated locally since
/// the last save. `progress` never decreases within a session and `complete`
/// only ever goes from false to true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentSession {
    session_id: Option<SessionId>,
    context: Option<SessionContext>,
    progress: f64,
    progress_delta: f64,
    time_spent: f64,
    time_spent_delta: f64,
    extra_fields: Map<String, Value>,
    extra_fields_dirty: bool,
    complete: bool,
    mastery_criterion: Option<MasteryCriterion>,
    total_attempts: u64,
    attempts: AttemptHistory,
    unsaved_interactions: Vec<AttemptRecord>,
}

impl ContentSession {
    /// Start from the state the server returned; all deltas are zero.
    #[must_use]
    pub fn from_seed(seed: SessionSeed) -> Self {
        Self {
            session_id: Some(seed.session_id),
            context: seed.context,
            progress: clamp01(seed.progress),
            progress_delta: 0.0,
            time_spent: seed.time_spent,
            time_spent_delta: 0.0,
            extra_fields: seed.extra_fields,
            extra_fields_dirty: false,
            complete: seed.complete,
            mastery_criterion: seed.mastery_criterion,
            total_attempts: seed.total_attempts,
            attempts: AttemptHistory::from_most_recent_first(seed.past_attempts),
            unsaved_interactions: Vec::new(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// True when this is a live session for exactly `context`.
    #[must_use]
    pub fn is_for(&self, context: &SessionContext) -> bool {
        self.session_id.is_some() && self.context.as_ref() == Some(context)
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn progress_delta(&self) -> f64 {
        self.progress_delta
    }

    #[must_use]
    pub fn time_spent(&self) -> f64 {
        self.time_spent
    }

    #[must_use]
    pub fn time_spent_delta(&self) -> f64 {
        self.time_spent_delta
    }

    #[must_use]
    pub fn extra_fields(&self) -> &Map<String, Value> {
        &self.extra_fields
    }

    #[must_use]
    pub fn content_state(&self) -> Option<&Value> {
        self.extra_fields.get(CONTENT_STATE_KEY)
    }

    #[must_use]
    pub fn is_extra_fields_dirty(&self) -> bool {
        self.extra_fields_dirty
    }

    #[must_use]
    pub fn complete(&self) -> bool {
        self.complete
    }

    #[must_use]
    pub fn mastery_criterion(&self) -> Option<&MasteryCriterion> {
        self.mastery_criterion.as_ref()
    }

    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    #[must_use]
    pub fn attempts(&self) -> &AttemptHistory {
        &self.attempts
    }

    /// Past attempts, most recent first.
    #[must_use]
    pub fn past_attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.most_recent_first().cloned().collect()
    }

    #[must_use]
    pub fn unsaved_interactions(&self) -> &[AttemptRecord] {
        &self.unsaved_interactions
    }

    //
    // ─── LOCAL BOOKKEEPING ─────────────────────────────────────────────────────
    //

    /// Apply a validated update. Does not account for time; see
    /// `add_time_spent`.
    pub fn apply_update(&mut self, update: ValidatedUpdate) -> LocalChange {
        let was_incomplete = self.progress < 1.0;

        match update.progress {
            Some(ProgressChange::Absolute(progress)) => self.set_progress(progress),
            Some(ProgressChange::Relative(delta)) => self.add_progress(delta),
            None => {}
        }

        if let Some(state) = update.content_state {
            self.merge_content_state(state);
        }

        let mut unidentified_interaction = false;
        if let Some(interaction) = update.interaction {
            unidentified_interaction = interaction.id.is_none();
            self.record_interaction(interaction);
        }

        LocalChange {
            completed: was_incomplete && self.progress >= 1.0,
            unidentified_interaction,
        }
    }

    /// Move progress to an absolute value. Lower values are ignored.
    pub fn set_progress(&mut self, progress: f64) {
        let progress = round_up_3(clamp01(progress));
        if progress > self.progress {
            self.progress_delta = clamp01(round_up_3(self.progress_delta + progress - self.progress));
            self.progress = progress;
        }
    }

    /// Advance progress by a relative amount, capped at 1.
    pub fn add_progress(&mut self, delta: f64) {
        let delta = round_up_3(clamp01(delta));
        self.progress_delta = clamp01(round_up_3(self.progress_delta + delta));
        self.progress = (self.progress + delta).min(1.0);
    }

    /// Merge keys into the saved content state. Marks extra fields dirty only
    /// when the merged state actually differs.
    pub fn merge_content_state(&mut self, state: Map<String, Value>) {
        let previous = match self.extra_fields.get(CONTENT_STATE_KEY) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        let mut merged = previous.clone();
        merged.extend(state);
        if merged != previous {
            self.extra_fields
                .insert(CONTENT_STATE_KEY.to_owned(), Value::Object(merged));
            self.extra_fields_dirty = true;
        }
    }

    /// Queue an interaction for saving and fold it into the attempt history.
    pub fn record_interaction(&mut self, interaction: AttemptRecord) {
        if self.attempts.record(&interaction) == AttemptChange::Created && interaction.id.is_none()
        {
            self.total_attempts += 1;
        }
        self.unsaved_interactions.push(interaction);
    }

    /// Account for time spent viewing the content.
    pub fn add_time_spent(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.time_spent = round_up_3(self.time_spent + seconds);
            self.time_spent_delta = round_up_3(self.time_spent_delta + seconds);
        }
    }

    //
    // ─── SAVING ────────────────────────────────────────────────────────────────
    //

    /// Whether accumulated changes call for a server round-trip.
    #[must_use]
    pub fn needs_flush(&self, force: bool, thresholds: &FlushThresholds) -> bool {
        force
            || self.unsaved_interactions.iter().any(|i| i.id.is_none())
            || self.unsaved_interactions.len() > thresholds.max_queued_interactions
            || self.progress_delta >= thresholds.progress
            || (self.progress_delta > 0.0 && self.progress >= 1.0)
            || self.time_spent_delta >= thresholds.time_spent
            || self.extra_fields_dirty
    }

    /// Take everything accumulated since the last save and reset the local
    /// markers, before the server has acknowledged anything.
    ///
    /// If the save then fails these changes are not re-queued; callers see the
    /// failure and decide whether to resend.
    pub fn take_delta(&mut self) -> Option<SessionDelta> {
        let delta = SessionDelta {
            progress_delta: (self.progress_delta > 0.0).then_some(self.progress_delta),
            time_spent_delta: (self.time_spent_delta > 0.0).then_some(self.time_spent_delta),
            interactions: std::mem::take(&mut self.unsaved_interactions),
            extra_fields: self.extra_fields_dirty.then(|| self.extra_fields.clone()),
        };
        self.progress_delta = 0.0;
        self.time_spent_delta = 0.0;
        self.extra_fields_dirty = false;
        (!delta.is_empty()).then_some(delta)
    }

    /// Fold attempts returned by the server (now carrying ids) into history.
    pub fn merge_server_attempts(&mut self, attempts: &[AttemptRecord]) {
        for attempt in attempts.iter().filter(|a| a.id.is_some()) {
            self.attempts.merge_identified(attempt);
        }
    }

    /// Record server-confirmed completion. Returns true on the first
    /// transition only.
    pub fn mark_complete(&mut self) -> bool {
        if self.complete {
            return false;
        }
        self.complete = true;
        self.progress = 1.0;
        true
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionUpdate;
    use serde_json::json;

    fn seed(progress: f64) -> SessionSeed {
        SessionSeed {
            session_id: SessionId::new("s1"),
            context: Some(SessionContext::node("n1", None)),
            complete: false,
            progress,
            time_spent: 0.0,
            extra_fields: Map::new(),
            mastery_criterion: None,
            past_attempts: Vec::new(),
            total_attempts: 0,
        }
    }

    fn session_at(progress: f64) -> ContentSession {
        ContentSession::from_seed(seed(progress))
    }

    fn apply(session: &mut ContentSession, update: SessionUpdate) -> LocalChange {
        session.apply_update(update.validate().unwrap())
    }

    fn state(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn seed_starts_with_nothing_unsaved() {
        let mut resumed = seed(0.25);
        resumed.time_spent = 42.0;
        resumed.extra_fields = state(json!({ "contentState": { "page": 1 } }));
        resumed.past_attempts = vec![AttemptRecord::for_id("a2"), AttemptRecord::for_id("a1")];
        resumed.total_attempts = 2;
        let mut session = ContentSession::from_seed(resumed);

        assert_eq!(session.session_id(), Some(&SessionId::new("s1")));
        assert!(session.is_for(&SessionContext::node("n1", None)));
        assert_eq!(session.progress(), 0.25);
        assert_eq!(session.time_spent(), 42.0);
        assert_eq!(session.content_state(), Some(&json!({ "page": 1 })));
        assert_eq!(session.total_attempts(), 2);
        assert_eq!(
            session.past_attempts()[0].id,
            Some(crate::model::AttemptId::new("a2"))
        );
        assert!(session.take_delta().is_none());
    }

    #[test]
    fn absolute_progress_never_decreases() {
        let mut session = session_at(0.0);
        apply(&mut session, SessionUpdate::new().progress(0.6));
        apply(&mut session, SessionUpdate::new().progress(0.3));
        assert_eq!(session.progress(), 0.6);
        assert_eq!(session.progress_delta(), 0.6);
    }

    #[test]
    fn absolute_progress_is_clamped_and_delta_is_the_headroom() {
        let mut session = session_at(0.5);
        let change = apply(&mut session, SessionUpdate::new().progress(2.0));
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.progress_delta(), 0.5);
        assert!(change.completed);
        assert!(change.requires_immediate_flush());
    }

    #[test]
    fn relative_progress_is_capped_at_one() {
        let mut session = session_at(0.9);
        apply(&mut session, SessionUpdate::new().progress_delta(0.5));
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.progress_delta(), 0.5);
    }

    #[test]
    fn tiny_increments_still_reach_completion() {
        let mut session = session_at(0.5);
        let mut completed = false;
        for _ in 0..1000 {
            let change = apply(&mut session, SessionUpdate::new().progress_delta(0.5 / 999.0));
            completed |= change.completed;
        }
        assert!(completed);
        assert_eq!(session.progress(), 1.0);
        assert!(session.progress_delta() >= 0.5);
    }

    #[test]
    fn identical_content_state_is_not_dirty() {
        let mut session = session_at(0.0);
        apply(
            &mut session,
            SessionUpdate::new().content_state(state(json!({ "page": 3 }))),
        );
        assert!(session.is_extra_fields_dirty());
        session.take_delta();
        assert!(!session.is_extra_fields_dirty());

        apply(
            &mut session,
            SessionUpdate::new().content_state(state(json!({ "page": 3 }))),
        );
        assert!(!session.is_extra_fields_dirty());

        apply(
            &mut session,
            SessionUpdate::new().content_state(state(json!({ "zoom": 2 }))),
        );
        assert!(session.is_extra_fields_dirty());
        assert_eq!(session.content_state(), Some(&json!({ "page": 3, "zoom": 2 })));
    }

    #[test]
    fn repeated_unsaved_interaction_counts_once() {
        let mut session = session_at(0.0);
        let change = apply(
            &mut session,
            SessionUpdate::new().interaction(AttemptRecord::for_item("q1").with_answer(json!(1))),
        );
        assert!(change.unidentified_interaction);
        apply(
            &mut session,
            SessionUpdate::new().interaction(AttemptRecord::for_item("q1").with_answer(json!(2))),
        );
        assert_eq!(session.total_attempts(), 1);
        assert_eq!(session.past_attempts().len(), 1);
        assert_eq!(session.past_attempts()[0].answer, Some(json!(2)));
        assert_eq!(session.unsaved_interactions().len(), 2);
    }

    #[test]
    fn thresholds_decide_when_to_flush() {
        let thresholds = FlushThresholds::default();
        let mut session = session_at(0.0);
        assert!(!session.needs_flush(false, &thresholds));
        assert!(session.needs_flush(true, &thresholds));

        session.add_progress(0.2);
        assert!(!session.needs_flush(false, &thresholds));
        session.add_progress(0.2);
        assert!(session.needs_flush(false, &thresholds));

        let mut session = session_at(0.0);
        session.add_time_spent(119.0);
        assert!(!session.needs_flush(false, &thresholds));
        session.add_time_spent(1.0);
        assert!(session.needs_flush(false, &thresholds));

        let mut session = session_at(0.0);
        for n in 0..3 {
            assert!(!session.needs_flush(false, &thresholds));
            session.record_interaction(AttemptRecord::for_id(format!("a{n}")));
        }
        assert!(session.needs_flush(false, &thresholds));
    }

    #[test]
    fn any_progress_at_completion_flushes() {
        let thresholds = FlushThresholds::default();
        let mut session = session_at(0.99);
        session.add_progress(0.01);
        assert_eq!(session.progress(), 1.0);
        assert!(session.needs_flush(false, &thresholds));
    }

    #[test]
    fn take_delta_resets_markers() {
        let mut session = session_at(0.0);
        session.add_progress(0.5);
        session.add_time_spent(3.0);
        session.record_interaction(AttemptRecord::for_item("q1"));

        let delta = session.take_delta().unwrap();
        assert_eq!(delta.progress_delta, Some(0.5));
        assert_eq!(delta.time_spent_delta, Some(3.0));
        assert_eq!(delta.interactions.len(), 1);
        assert!(delta.extra_fields.is_none());

        assert_eq!(session.progress_delta(), 0.0);
        assert_eq!(session.time_spent_delta(), 0.0);
        assert!(session.unsaved_interactions().is_empty());
        assert_eq!(session.progress(), 0.5);
        assert!(session.take_delta().is_none());
    }

    #[test]
    fn delta_serializes_only_present_fields() {
        let delta = SessionDelta {
            progress_delta: Some(0.25),
            ..SessionDelta::default()
        };
        assert_eq!(serde_json::to_value(&delta).unwrap(), json!({ "progress_delta": 0.25 }));
    }

    #[test]
    fn completion_is_recorded_once() {
        let mut session = session_at(0.8);
        assert!(session.mark_complete());
        assert_eq!(session.progress(), 1.0);
        assert!(!session.mark_complete());
        assert!(session.complete());
    }

    #[test]
    fn server_attempts_take_their_ids() {
        let mut session = session_at(0.0);
        session.record_interaction(AttemptRecord::for_item("q1").with_correct(1.0));
        let mut saved = AttemptRecord::for_id("x9");
        saved.item = Some("q1".into());
        session.merge_server_attempts(&[saved]);

        let attempts = session.past_attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].id.as_ref().map(|id| id.as_str()), Some("x9"));
        assert_eq!(attempts[0].correct, Some(1.0));
    }
}
