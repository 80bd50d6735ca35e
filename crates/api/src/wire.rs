//! JSON bodies exchanged with the progress-tracking endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tracking_core::model::{
    AttemptRecord, LessonId, MasteryCriterion, NodeId, QuizId, SessionContext, SessionId,
    SessionSeed, SessionStart, SessionTarget,
};

/// Body of the session-creation POST.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<LessonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<QuizId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_model: Option<MasteryCriterion>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repeat: bool,
}

impl CreateSessionRequest {
    #[must_use]
    pub fn from_start(start: &SessionStart) -> Self {
        match &start.target {
            SessionTarget::Node { node, lesson_id } => Self {
                node_id: Some(node.id.clone()),
                content_id: Some(node.content_id.clone()),
                channel_id: Some(node.channel_id.clone()),
                kind: Some(node.kind.clone()),
                lesson_id: lesson_id.clone(),
                mastery_model: node.mastery_model.clone(),
                repeat: start.repeat,
                ..Self::default()
            },
            SessionTarget::Quiz { quiz_id } => Self {
                quiz_id: Some(quiz_id.clone()),
                repeat: start.repeat,
                ..Self::default()
            },
        }
    }

    /// The context this request asks for.
    #[must_use]
    pub fn context(&self) -> Option<SessionContext> {
        if let Some(quiz_id) = &self.quiz_id {
            return Some(SessionContext::Quiz {
                quiz_id: quiz_id.clone(),
            });
        }
        self.node_id.as_ref().map(|node_id| SessionContext::Node {
            node_id: node_id.clone(),
            lesson_id: self.lesson_id.clone(),
        })
    }
}

/// Response to the session-creation POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    #[serde(default)]
    pub context: Option<SessionContext>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub time_spent: f64,
    #[serde(default)]
    pub extra_fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub mastery_criterion: Option<MasteryCriterion>,
    #[serde(default)]
    pub pastattempts: Vec<AttemptRecord>,
    #[serde(default)]
    pub totalattempts: u64,
}

impl CreateSessionResponse {
    /// Convert into session state, falling back to the requested context when
    /// the server does not echo one.
    #[must_use]
    pub fn into_seed(self, requested: SessionContext) -> SessionSeed {
        SessionSeed {
            session_id: self.session_id,
            context: Some(self.context.unwrap_or(requested)),
            complete: self.complete,
            progress: self.progress,
            time_spent: self.time_spent,
            extra_fields: self.extra_fields.unwrap_or_default(),
            mastery_criterion: self.mastery_criterion,
            past_attempts: self.pastattempts,
            total_attempts: self.totalattempts,
        }
    }
}

/// Response to the session-update PUT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSessionResponse {
    #[serde(default)]
    pub complete: bool,
    /// Attempts from the request, now carrying server ids.
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}
