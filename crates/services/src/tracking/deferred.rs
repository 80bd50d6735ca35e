use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TrackerError;

pub(crate) type FlushOutcome = Result<(), TrackerError>;

/// Resolves once the save carrying an update has settled.
///
/// Every update coalesced into the same save sees the same outcome. Dropping
/// the handle does not cancel anything.
#[derive(Debug)]
#[must_use = "dropping the handle ignores whether the update was saved"]
pub struct FlushHandle {
    outcome: oneshot::Receiver<FlushOutcome>,
}

impl Future for FlushHandle {
    type Output = FlushOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TrackerError::Closed)))
    }
}

/// Callers waiting on the next save.
#[derive(Debug, Default)]
pub(crate) struct DeferredStack {
    waiters: Vec<oneshot::Sender<FlushOutcome>>,
}

impl DeferredStack {
    pub(crate) fn push(&mut self) -> FlushHandle {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        FlushHandle { outcome: rx }
    }

    pub(crate) fn drain(&mut self) -> Waiters {
        Waiters(std::mem::take(&mut self.waiters))
    }
}

/// Drained waiters, all answered with one outcome.
#[derive(Debug, Default)]
pub(crate) struct Waiters(Vec<oneshot::Sender<FlushOutcome>>);

impl Waiters {
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn resolve(self, outcome: &FlushOutcome) {
        for waiter in self.0 {
            // The caller may have dropped its handle.
            let _ = waiter.send(outcome.clone());
        }
    }
}
