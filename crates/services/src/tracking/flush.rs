use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use api::{UpdateSessionResponse, with_retry};
use tracking_core::model::{SessionDelta, SessionId};

use super::deferred::{FlushOutcome, Waiters};
use super::shared::Shared;
use super::snapshot::SessionSnapshot;
use crate::error::TrackerError;

/// One debounce window's worth of work for the flush worker.
#[derive(Debug)]
pub(super) struct FlushJob {
    pub(super) session_id: SessionId,
    pub(super) generation: u64,
    /// `None` when nothing needed saving; waiters still wait their turn.
    pub(super) delta: Option<SessionDelta>,
    pub(super) waiters: Waiters,
}

/// Runs jobs one after another, so at most one update request is in flight.
pub(super) async fn run_flush_worker(
    shared: Weak<Shared>,
    mut jobs: mpsc::UnboundedReceiver<FlushJob>,
) {
    while let Some(job) = jobs.recv().await {
        let Some(shared) = shared.upgrade() else {
            job.waiters.resolve(&Err(TrackerError::Closed));
            break;
        };
        let FlushJob {
            session_id,
            generation,
            delta,
            waiters,
        } = job;

        let outcome = match delta {
            Some(delta) => shared.save(&session_id, generation, &delta).await,
            None => Ok(()),
        };
        waiters.resolve(&outcome);
    }
}

impl Shared {
    async fn save(
        &self,
        session_id: &SessionId,
        generation: u64,
        delta: &SessionDelta,
    ) -> FlushOutcome {
        let api = self.api.as_ref();
        let result = with_retry(&self.config.retry, move || {
            api.update_session(session_id, delta)
        })
        .await;

        match result {
            Ok(response) => {
                self.apply_response(generation, &response);
                Ok(())
            }
            Err(err) => {
                warn!(%session_id, error = %err, "saving session changes failed");
                Err(err.into())
            }
        }
    }

    /// Merge a save response into the live session, unless that session has
    /// been replaced in the meantime.
    fn apply_response(&self, generation: u64, response: &UpdateSessionResponse) {
        let (completed, snapshot) = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("ignoring save response for a replaced session");
                return;
            }
            state.session.merge_server_attempts(&response.attempts);
            let completed = response.complete && state.session.mark_complete();
            (completed, SessionSnapshot::from(&state.session))
        };

        if completed {
            info!(session_id = ?snapshot.session_id, "content session completed");
            if self.host.is_user_logged_in() {
                self.host.increment_total_progress(1.0);
            }
        }
        self.publish(snapshot);
    }
}
