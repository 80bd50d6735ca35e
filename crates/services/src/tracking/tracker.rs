use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, error, info};

use api::{CreateSessionRequest, SessionApi, with_retry};
use tracking_core::model::{
    AttemptRecord, ContentSession, InitSessionArgs, MasteryCriterion, SessionContext, SessionId,
    SessionUpdate,
};

use super::deferred::FlushHandle;
use super::polling::spawn_poller;
use super::shared::Shared;
use super::snapshot::{SessionGuard, SessionSnapshot};
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::host::TrackingHost;

/// Tracks a learner's progress through one piece of content at a time.
///
/// Cheap to clone; clones share the same session. Must be used from within a
/// Tokio runtime, since updates schedule background tasks.
#[derive(Clone)]
pub struct ProgressTracker {
    shared: Arc<Shared>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        api: Arc<dyn SessionApi>,
        host: Arc<dyn TrackingHost>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(api, host, config)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    //
    // ─── SESSION LIFECYCLE ─────────────────────────────────────────────────────
    //

    /// Start or resume the session for a node or quiz.
    ///
    /// Does nothing if the live session already tracks the same context,
    /// unless `repeat` is set. Callers still waiting on saves for a replaced
    /// session get `TrackerError::SessionReplaced`.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::InvalidSessionArgs` for malformed arguments and
    /// `TrackerError::Api` if the server request fails. On error the live
    /// session is left as it was.
    pub async fn init_content_session(&self, args: InitSessionArgs) -> Result<(), TrackerError> {
        let start = args.validate()?;
        let context = start.context();

        let reusable = !start.repeat && self.shared.lock().session.is_for(&context);
        if reusable {
            debug!(?context, "content session already live");
            return Ok(());
        }

        let request = CreateSessionRequest::from_start(&start);
        let api = self.shared.api.as_ref();
        let request = &request;
        let response = with_retry(&self.shared.config.retry, move || {
            api.create_session(request)
        })
        .await?;

        let session = ContentSession::from_seed(response.into_seed(context));
        let session_id = session.session_id().cloned();
        let (replaced, snapshot) = {
            let mut state = self.shared.lock();
            state.session = session;
            state.generation += 1;
            let replaced = state.cancel_pending();
            (replaced, SessionSnapshot::from(&state.session))
        };
        replaced.resolve(&Err(TrackerError::SessionReplaced));

        info!(
            session_id = ?session_id,
            progress = snapshot.progress,
            "content session initialized"
        );
        self.shared.publish(snapshot);
        Ok(())
    }

    /// Record progress, content state or an interaction.
    ///
    /// Changes apply to the local session before this returns. The handle
    /// resolves once the save carrying them has settled; updates made close
    /// together share one save and one outcome.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::InvalidUpdateArgs` for malformed arguments and
    /// `TrackerError::NoSession` if no session has been initialized. Save
    /// failures are reported through the handle.
    pub fn update_content_session(
        &self,
        update: SessionUpdate,
    ) -> Result<FlushHandle, TrackerError> {
        let update = update.validate()?;
        self.shared.update(update)
    }

    /// Record elapsed time every poll interval until stopped.
    pub fn start_tracking_progress(&self) {
        let mut state = self.shared.lock();
        if let Some(poller) = state.poller.take() {
            poller.abort();
        }
        state.last_check = Some(Shared::now());
        state.poller = Some(spawn_poller(
            Arc::downgrade(&self.shared),
            self.shared.config.poll_interval,
        ));
    }

    /// Stop polling and save whatever is still pending.
    ///
    /// Failures of the final save are logged, not returned. Stopping without a
    /// session is not an error.
    pub async fn stop_tracking_progress(&self) {
        {
            let mut state = self.shared.lock();
            if let Some(poller) = state.poller.take() {
                poller.abort();
            }
        }

        let final_save = self.update_content_session(SessionUpdate::new().immediate().force());
        let outcome = match final_save {
            Ok(handle) => handle.await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {}
            Err(err) if err.is_no_session() => debug!("stopped tracking without a session"),
            Err(err) => error!(error = %err, "final progress save failed"),
        }

        self.shared.lock().last_check = None;
    }

    //
    // ─── READ-ONLY VIEWS ───────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.changes().borrow().clone()
    }

    /// Receiver that sees a new snapshot after every local change and every
    /// merged save response.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.changes().subscribe()
    }

    #[must_use]
    pub fn session_guard(&self) -> SessionGuard {
        SessionGuard {
            generation: self.generation(),
        }
    }

    pub(super) fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.shared.changes().borrow().session_id.clone()
    }

    #[must_use]
    pub fn context(&self) -> Option<SessionContext> {
        self.shared.changes().borrow().context.clone()
    }

    #[must_use]
    pub fn progress(&self) -> f64 {
        self.shared.changes().borrow().progress
    }

    #[must_use]
    pub fn time_spent(&self) -> f64 {
        self.shared.changes().borrow().time_spent
    }

    #[must_use]
    pub fn complete(&self) -> bool {
        self.shared.changes().borrow().complete
    }

    #[must_use]
    pub fn extra_fields(&self) -> Map<String, Value> {
        self.shared.changes().borrow().extra_fields.clone()
    }

    #[must_use]
    pub fn mastery_criterion(&self) -> Option<MasteryCriterion> {
        self.shared.changes().borrow().mastery_criterion.clone()
    }

    /// Most recent first.
    #[must_use]
    pub fn past_attempts(&self) -> Vec<AttemptRecord> {
        self.shared.changes().borrow().past_attempts.clone()
    }

    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.shared.changes().borrow().total_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticHost;
    use api::InMemorySessionApi;
    use tracking_core::model::ContentNode;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(
            Arc::new(InMemorySessionApi::new()),
            Arc::new(StaticHost::default()),
            TrackerConfig::default(),
        )
    }

    #[tokio::test]
    async fn update_before_init_has_no_session() {
        let err = tracker()
            .update_content_session(SessionUpdate::new().progress(0.5))
            .unwrap_err();
        assert!(err.is_no_session());
        assert_eq!(err.to_string(), "no session initialized");
    }

    #[tokio::test]
    async fn argument_errors_come_before_the_session_check() {
        let err = tracker()
            .update_content_session(SessionUpdate::new().progress(0.5).progress_delta(0.1))
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidUpdateArgs(_)));
    }

    #[tokio::test]
    async fn guard_goes_stale_when_the_session_changes() {
        let tracker = tracker();
        let node = |id: &str| ContentNode::new(id, "c1", "ch1", "video");

        tracker
            .init_content_session(InitSessionArgs::for_node(node("n1")))
            .await
            .unwrap();
        let guard = tracker.session_guard();
        assert!(guard.is_current(&tracker));

        tracker
            .init_content_session(InitSessionArgs::for_node(node("n1")))
            .await
            .unwrap();
        assert!(guard.is_current(&tracker));

        tracker
            .init_content_session(InitSessionArgs::for_node(node("n2")))
            .await
            .unwrap();
        assert!(!guard.is_current(&tracker));
    }
}
