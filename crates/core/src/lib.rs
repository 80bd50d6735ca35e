//! Domain layer for content-session progress tracking.
//!
//! Everything in here is synchronous and free of I/O: the numeric helpers,
//! the session context and argument validation, attempt merge rules, and the
//! `ContentSession` container that accumulates progress between saves.

#![forbid(unsafe_code)]

pub mod model;
pub mod numeric;
pub mod time;

pub use model::{ContentSession, SessionDelta};
