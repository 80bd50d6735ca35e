use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use api::SessionApi;
use tracking_core::model::{ContentSession, ValidatedUpdate};
use tracking_core::time::elapsed_seconds;

use super::deferred::{DeferredStack, FlushHandle, Waiters};
use super::flush::{FlushJob, run_flush_worker};
use super::snapshot::SessionSnapshot;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::host::TrackingHost;

/// Mutable tracker state. Never locked across an `.await`.
#[derive(Debug, Default)]
pub(super) struct TrackerState {
    pub(super) session: ContentSession,
    /// Bumped whenever a new session replaces the live one.
    pub(super) generation: u64,
    pub(super) last_check: Option<Instant>,
    pub(super) deferred: DeferredStack,
    debounce: Option<JoinHandle<()>>,
    /// Identifies the debounce timer allowed to fire.
    debounce_ticket: u64,
    immediate_pending: bool,
    force_pending: bool,
    pub(super) poller: Option<JoinHandle<()>>,
    flush_jobs: Option<mpsc::UnboundedSender<FlushJob>>,
}

impl TrackerState {
    /// Forget any scheduled save and hand back the callers waiting on it.
    pub(super) fn cancel_pending(&mut self) -> Waiters {
        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
        self.debounce_ticket += 1;
        self.immediate_pending = false;
        self.force_pending = false;
        self.deferred.drain()
    }
}

pub(super) struct Shared {
    pub(super) api: Arc<dyn SessionApi>,
    pub(super) host: Arc<dyn TrackingHost>,
    pub(super) config: TrackerConfig,
    state: Mutex<TrackerState>,
    changes: watch::Sender<SessionSnapshot>,
}

impl Shared {
    pub(super) fn new(
        api: Arc<dyn SessionApi>,
        host: Arc<dyn TrackingHost>,
        config: TrackerConfig,
    ) -> Self {
        let (changes, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            host,
            config,
            state: Mutex::new(TrackerState::default()),
            changes,
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn changes(&self) -> &watch::Sender<SessionSnapshot> {
        &self.changes
    }

    pub(super) fn publish(&self, snapshot: SessionSnapshot) {
        self.changes.send_replace(snapshot);
    }

    /// Current time on the Tokio clock, so a paused runtime controls it.
    pub(super) fn now() -> Instant {
        tokio::time::Instant::now().into_std()
    }

    //
    // ─── UPDATES ───────────────────────────────────────────────────────────────
    //

    /// Apply an update locally and schedule the save that will carry it.
    pub(super) fn update(
        self: &Arc<Self>,
        update: ValidatedUpdate,
    ) -> Result<FlushHandle, TrackerError> {
        let now = Self::now();
        let (handle, snapshot) = {
            let mut state = self.lock();
            if state.session.session_id().is_none() {
                return Err(TrackerError::NoSession);
            }

            let elapsed = elapsed_seconds(state.last_check, now, self.config.poll_interval);
            if self.host.is_page_visible() {
                state.session.add_time_spent(elapsed);
            }
            state.last_check = Some(now);

            let requested_immediate = update.immediate;
            state.force_pending |= update.force;
            let change = state.session.apply_update(update);
            state.immediate_pending |= requested_immediate || change.requires_immediate_flush();

            let handle = state.deferred.push();
            self.schedule_flush(&mut state);
            (handle, SessionSnapshot::from(&state.session))
        };
        self.publish(snapshot);
        Ok(handle)
    }

    /// Restart the debounce timer. An immediate request stays in effect until
    /// the timer fires.
    fn schedule_flush(self: &Arc<Self>, state: &mut TrackerState) {
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
        state.debounce_ticket += 1;
        let ticket = state.debounce_ticket;
        let delay = if state.immediate_pending {
            Duration::ZERO
        } else {
            self.config.debounce_delay
        };

        let shared = Arc::downgrade(self);
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.fire_flush(ticket);
            }
        }));
    }

    /// Debounce timer expiry: decide whether to save and queue the outcome
    /// for everyone waiting.
    fn fire_flush(self: &Arc<Self>, ticket: u64) {
        let mut state = self.lock();
        if state.debounce_ticket != ticket {
            return;
        }
        state.debounce = None;
        state.immediate_pending = false;
        let force = std::mem::take(&mut state.force_pending);
        let waiters = state.deferred.drain();

        let Some(session_id) = state.session.session_id().cloned() else {
            drop(state);
            waiters.resolve(&Err(TrackerError::NoSession));
            return;
        };

        let delta = if state.session.needs_flush(force, &self.config.thresholds) {
            state.session.take_delta()
        } else {
            None
        };
        match &delta {
            Some(delta) => debug!(
                %session_id,
                waiters = waiters.len(),
                interactions = delta.interactions.len(),
                "saving session changes"
            ),
            None => debug!(%session_id, waiters = waiters.len(), "nothing to save"),
        }

        let job = FlushJob {
            session_id,
            generation: state.generation,
            delta,
            waiters,
        };
        self.enqueue(&mut state, job);
    }

    /// Hand a job to the flush worker, starting it on first use. Jobs are
    /// queued under the state lock so they run in decision order.
    fn enqueue(self: &Arc<Self>, state: &mut TrackerState, job: FlushJob) {
        let jobs = state.flush_jobs.get_or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_flush_worker(Arc::downgrade(self), rx));
            tx
        });
        if let Err(mpsc::error::SendError(job)) = jobs.send(job) {
            state.flush_jobs = None;
            job.waiters.resolve(&Err(TrackerError::Closed));
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(poller) = state.poller.take() {
            poller.abort();
        }
        if let Some(timer) = state.debounce.take() {
            timer.abort();
        }
    }
}
