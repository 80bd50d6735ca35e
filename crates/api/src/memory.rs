//! In-memory `SessionApi` for tests and prototyping.
//!
//! Behaves like the real endpoint closely enough to drive a tracker: it
//! resumes open sessions by context, accumulates progress and time, assigns
//! attempt ids and reports completion once progress reaches 1. Every request
//! is recorded, and failures can be scripted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use uuid::Uuid;

use tracking_core::model::{
    AttemptId, AttemptRecord, MasteryCriterion, SessionContext, SessionDelta, SessionId,
};

use crate::client::SessionApi;
use crate::error::ApiError;
use crate::wire::{CreateSessionRequest, CreateSessionResponse, UpdateSessionResponse};

/// Server-side state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSession {
    pub context: SessionContext,
    pub progress: f64,
    pub time_spent: f64,
    pub complete: bool,
    pub extra_fields: Map<String, Value>,
    pub mastery_criterion: Option<MasteryCriterion>,
    /// Most recent first.
    pub attempts: Vec<AttemptRecord>,
    pub total_attempts: u64,
}

impl ServerSession {
    #[must_use]
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            progress: 0.0,
            time_spent: 0.0,
            complete: false,
            extra_fields: Map::new(),
            mastery_criterion: None,
            attempts: Vec::new(),
            total_attempts: 0,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self.complete = progress >= 1.0;
        self
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.total_attempts = attempts.len() as u64;
        self.attempts = attempts;
        self
    }

    fn response(&self, session_id: &SessionId) -> CreateSessionResponse {
        CreateSessionResponse {
            session_id: session_id.clone(),
            context: Some(self.context.clone()),
            complete: self.complete,
            progress: self.progress,
            time_spent: self.time_spent,
            extra_fields: Some(self.extra_fields.clone()),
            mastery_criterion: self.mastery_criterion.clone(),
            pastattempts: self.attempts.clone(),
            totalattempts: self.total_attempts,
        }
    }

    fn apply(&mut self, delta: &SessionDelta) -> UpdateSessionResponse {
        if let Some(progress) = delta.progress_delta {
            self.progress = (self.progress + progress).min(1.0);
        }
        if let Some(seconds) = delta.time_spent_delta {
            self.time_spent += seconds;
        }
        if let Some(extra) = &delta.extra_fields {
            self.extra_fields = extra.clone();
        }

        let mut saved: Vec<AttemptRecord> = Vec::with_capacity(delta.interactions.len());
        for interaction in &delta.interactions {
            // Id-less repeats of an item within one request update the
            // attempt the request already created.
            let created_here = interaction.id.is_none().then(|| {
                saved.iter().position(|a| a.item.is_some() && a.item == interaction.item)
            });
            match created_here.flatten() {
                Some(index) => {
                    let id = saved[index].id.clone();
                    if let Some(existing) = self.attempts.iter_mut().find(|a| a.id == id) {
                        existing.overwrite_with(interaction);
                        saved[index] = existing.clone();
                    }
                }
                None => saved.push(self.save_interaction(interaction)),
            }
        }
        if self.progress >= 1.0 {
            self.complete = true;
        }

        UpdateSessionResponse {
            complete: self.complete,
            attempts: saved,
        }
    }

    fn save_interaction(&mut self, interaction: &AttemptRecord) -> AttemptRecord {
        if let Some(id) = &interaction.id {
            if let Some(existing) = self.attempts.iter_mut().find(|a| a.id.as_ref() == Some(id)) {
                existing.merge_from(interaction);
                return existing.clone();
            }
        }

        let mut attempt = interaction.clone();
        if attempt.id.is_none() {
            attempt.id = Some(AttemptId::new(Uuid::new_v4().simple().to_string()));
        }
        self.attempts.insert(0, attempt.clone());
        self.total_attempts += 1;
        attempt
    }
}

#[derive(Default)]
struct MemoryServer {
    sessions: HashMap<SessionId, ServerSession>,
    create_requests: Vec<CreateSessionRequest>,
    update_requests: Vec<(SessionId, SessionDelta)>,
    scripted_failures: VecDeque<ApiError>,
    persistent_failure: Option<ApiError>,
    latency: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

impl MemoryServer {
    fn next_failure(&mut self) -> Option<ApiError> {
        self.scripted_failures
            .pop_front()
            .or_else(|| self.persistent_failure.clone())
    }
}

/// Shared, cloneable fake of the progress-tracking endpoint.
#[derive(Clone, Default)]
pub struct InMemorySessionApi {
    server: Arc<Mutex<MemoryServer>>,
}

impl InMemorySessionApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an open session that `create_session` will resume.
    pub fn insert_session(&self, session: ServerSession) -> SessionId {
        let id = SessionId::new(Uuid::new_v4().simple().to_string());
        self.lock().sessions.insert(id.clone(), session);
        id
    }

    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<ServerSession> {
        self.lock().sessions.get(id).cloned()
    }

    /// Fail the next requests (of either kind) with these errors, in order.
    pub fn fail_next(&self, errors: impl IntoIterator<Item = ApiError>) {
        self.lock().scripted_failures.extend(errors);
    }

    /// Fail every request with `error` until cleared with `None`.
    pub fn fail_always(&self, error: Option<ApiError>) {
        self.lock().persistent_failure = error;
    }

    /// Hold every request for `latency` before answering.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateSessionRequest> {
        self.lock().create_requests.clone()
    }

    #[must_use]
    pub fn update_requests(&self) -> Vec<(SessionId, SessionDelta)> {
        self.lock().update_requests.clone()
    }

    /// Highest number of requests that were being served at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    async fn begin(&self) -> Option<ApiError> {
        let latency = {
            let mut server = self.lock();
            server.in_flight += 1;
            server.max_in_flight = server.max_in_flight.max(server.in_flight);
            server.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut server = self.lock();
        server.in_flight -= 1;
        server.next_failure()
    }
}

#[async_trait]
impl SessionApi for InMemorySessionApi {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError> {
        self.lock().create_requests.push(request.clone());
        if let Some(err) = self.begin().await {
            return Err(err);
        }

        let context = request
            .context()
            .ok_or_else(|| ApiError::status(StatusCode::BAD_REQUEST))?;
        let mut server = self.lock();

        if !request.repeat {
            let open = server
                .sessions
                .iter()
                .find(|(_, session)| session.context == context)
                .map(|(id, session)| session.response(id));
            if let Some(response) = open {
                return Ok(response);
            }
        }

        let mut session = ServerSession::new(context);
        session.mastery_criterion = request.mastery_model.clone();
        let id = SessionId::new(Uuid::new_v4().simple().to_string());
        let response = session.response(&id);
        server.sessions.insert(id, session);
        Ok(response)
    }

    async fn update_session(
        &self,
        session_id: &SessionId,
        delta: &SessionDelta,
    ) -> Result<UpdateSessionResponse, ApiError> {
        self.lock()
            .update_requests
            .push((session_id.clone(), delta.clone()));
        if let Some(err) = self.begin().await {
            return Err(err);
        }

        let mut server = self.lock();
        let session = server
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::status(StatusCode::NOT_FOUND))?;
        Ok(session.apply(delta))
    }
}
