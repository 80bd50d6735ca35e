//! Server boundary for content sessions: wire types, the `SessionApi` trait
//! with its HTTP and in-memory implementations, and the retry wrapper every
//! request goes through.

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod memory;
pub mod retry;
pub mod wire;

pub use client::{ApiConfig, HttpSessionApi, SessionApi};
pub use error::{ApiError, ConfigError};
pub use memory::{InMemorySessionApi, ServerSession};
pub use retry::{RetryPolicy, with_retry};
pub use wire::{CreateSessionRequest, CreateSessionResponse, UpdateSessionResponse};
