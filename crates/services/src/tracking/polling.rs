use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use tracking_core::model::ValidatedUpdate;

use super::shared::Shared;

/// Record elapsed time every `period` until aborted or the tracker is gone.
/// The first tick comes one full period after starting.
pub(super) fn spawn_poller(shared: Weak<Shared>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            // Nobody waits on a time-only update.
            if let Err(err) = shared.update(ValidatedUpdate::default()) {
                debug!(error = %err, "skipping time check");
            }
        }
    })
}
