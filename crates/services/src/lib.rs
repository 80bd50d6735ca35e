#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod host;
pub mod tracking;

pub use config::TrackerConfig;
pub use error::TrackerError;
pub use host::{StaticHost, TrackingHost};
pub use tracking::{FlushHandle, ProgressTracker, SessionGuard, SessionSnapshot};

pub use tracking_core::model::{
    AttemptRecord, ContentNode, InitSessionArgs, SessionContext, SessionUpdate,
};
