//! What the tracker needs from the application hosting it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Host-application signals and side effects.
pub trait TrackingHost: Send + Sync {
    /// Whether the content is currently on screen. Time while hidden is not
    /// counted.
    fn is_page_visible(&self) -> bool;

    fn is_user_logged_in(&self) -> bool;

    /// Bump the learner's aggregate progress (once per completed session).
    fn increment_total_progress(&self, amount: f64);
}

/// `TrackingHost` backed by plain flags, for headless use and tests.
#[derive(Debug)]
pub struct StaticHost {
    visible: AtomicBool,
    logged_in: AtomicBool,
    total_progress: Mutex<f64>,
    increments: AtomicUsize,
}

impl Default for StaticHost {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl StaticHost {
    #[must_use]
    pub fn new(visible: bool, logged_in: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
            logged_in: AtomicBool::new(logged_in),
            total_progress: Mutex::new(0.0),
            increments: AtomicUsize::new(0),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    #[must_use]
    pub fn total_progress(&self) -> f64 {
        *self
            .total_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of times `increment_total_progress` was called.
    #[must_use]
    pub fn increments(&self) -> usize {
        self.increments.load(Ordering::SeqCst)
    }
}

impl TrackingHost for StaticHost {
    fn is_page_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    fn is_user_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn increment_total_progress(&self, amount: f64) {
        let mut total = self
            .total_progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *total += amount;
        self.increments.fetch_add(1, Ordering::SeqCst);
    }
}
