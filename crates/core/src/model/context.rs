use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ids::{LessonId, NodeId, QuizId};

/// Node kind that requires a mastery model.
pub const EXERCISE_KIND: &str = "exercise";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Contract violations in the arguments passed to session initialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionArgsError {
    #[error("must provide either a node or a quiz_id")]
    MissingTarget,

    #[error("quiz_id cannot be combined with a node or lesson_id")]
    ConflictingTarget,

    #[error("node is missing required property `{0}`")]
    MissingNodeField(&'static str),

    #[error("exercise node is missing `assessmentmetadata`")]
    MissingAssessmentMetadata,

    #[error("exercise node is missing `assessmentmetadata.mastery_model`")]
    MissingMasteryModel,

    #[error("`assessmentmetadata.mastery_model` must be an object")]
    MasteryModelNotObject,

    #[error("`assessmentmetadata.mastery_model` is missing `type`")]
    MissingMasteryModelType,
}

//
// ─── SESSION CONTEXT ───────────────────────────────────────────────────────────
//

/// What a content session is tracking.
///
/// Fixed for the lifetime of a session. Quiz is listed first so that a server
/// payload carrying `quiz_id` alongside a `node_id` is read as a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionContext {
    Quiz {
        quiz_id: QuizId,
    },
    Node {
        node_id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lesson_id: Option<LessonId>,
    },
}

impl SessionContext {
    #[must_use]
    pub fn node(node_id: impl Into<NodeId>, lesson_id: Option<LessonId>) -> Self {
        Self::Node {
            node_id: node_id.into(),
            lesson_id,
        }
    }

    #[must_use]
    pub fn quiz(quiz_id: impl Into<QuizId>) -> Self {
        Self::Quiz {
            quiz_id: quiz_id.into(),
        }
    }
}

//
// ─── MASTERY CRITERION ─────────────────────────────────────────────────────────
//

/// Mastery model in effect for an exercise or quiz, e.g.
/// `{"type": "m_of_n", "m": 3, "n": 5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryCriterion {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl MasteryCriterion {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Read a mastery model out of loosely typed node metadata.
    ///
    /// # Errors
    ///
    /// Returns `SessionArgsError::MasteryModelNotObject` if the value is not a
    /// JSON object, or `SessionArgsError::MissingMasteryModelType` if it has
    /// no string `type`.
    pub fn from_value(value: &Value) -> Result<Self, SessionArgsError> {
        let Value::Object(map) = value else {
            return Err(SessionArgsError::MasteryModelNotObject);
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SessionArgsError::MissingMasteryModelType)?;
        let params = map
            .iter()
            .filter(|(key, _)| key.as_str() != "type")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Self {
            kind: kind.to_owned(),
            params,
        })
    }
}

//
// ─── CONTENT NODE ──────────────────────────────────────────────────────────────
//

/// Content node as handed over by the rendering view.
///
/// Fields are optional because node data arrives loosely typed from the
/// content API; `InitSessionArgs::validate` names whichever one is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: Option<String>,
    pub content_id: Option<String>,
    pub channel_id: Option<String>,
    pub kind: Option<String>,
    pub assessmentmetadata: Option<AssessmentMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentMetadata {
    pub mastery_model: Option<Value>,
}

impl ContentNode {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        content_id: impl Into<String>,
        channel_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            content_id: Some(content_id.into()),
            channel_id: Some(channel_id.into()),
            kind: Some(kind.into()),
            assessmentmetadata: None,
        }
    }

    #[must_use]
    pub fn with_mastery_model(mut self, mastery_model: Value) -> Self {
        self.assessmentmetadata = Some(AssessmentMetadata {
            mastery_model: Some(mastery_model),
        });
        self
    }
}

/// A node whose required properties have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedNode {
    pub id: NodeId,
    pub content_id: String,
    pub channel_id: String,
    pub kind: String,
    pub mastery_model: Option<MasteryCriterion>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SessionArgsError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(SessionArgsError::MissingNodeField(field))
}

impl ContentNode {
    fn validate(self) -> Result<ValidatedNode, SessionArgsError> {
        let id = required(self.id, "id")?;
        let content_id = required(self.content_id, "content_id")?;
        let channel_id = required(self.channel_id, "channel_id")?;
        let kind = required(self.kind, "kind")?;

        let mastery_model = if kind == EXERCISE_KIND {
            let metadata = self
                .assessmentmetadata
                .ok_or(SessionArgsError::MissingAssessmentMetadata)?;
            let model = metadata
                .mastery_model
                .ok_or(SessionArgsError::MissingMasteryModel)?;
            Some(MasteryCriterion::from_value(&model)?)
        } else {
            None
        };

        Ok(ValidatedNode {
            id: NodeId::new(id),
            content_id,
            channel_id,
            kind,
            mastery_model,
        })
    }
}

//
// ─── INIT ARGUMENTS ────────────────────────────────────────────────────────────
//

/// Caller-supplied arguments for starting (or resuming) a content session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitSessionArgs {
    pub node: Option<ContentNode>,
    pub lesson_id: Option<LessonId>,
    pub quiz_id: Option<QuizId>,
    pub repeat: bool,
}

/// What a validated init call targets.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTarget {
    Node {
        node: ValidatedNode,
        lesson_id: Option<LessonId>,
    },
    Quiz {
        quiz_id: QuizId,
    },
}

/// Validated init arguments, ready to be sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub target: SessionTarget,
    pub repeat: bool,
}

impl InitSessionArgs {
    #[must_use]
    pub fn for_node(node: ContentNode) -> Self {
        Self {
            node: Some(node),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_quiz(quiz_id: impl Into<QuizId>) -> Self {
        Self {
            quiz_id: Some(quiz_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_lesson(mut self, lesson_id: impl Into<LessonId>) -> Self {
        self.lesson_id = Some(lesson_id.into());
        self
    }

    /// Always start a fresh session, even if one for the same context is live.
    #[must_use]
    pub fn repeat(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Check the caller contract and produce a `SessionStart`.
    ///
    /// # Errors
    ///
    /// Returns `SessionArgsError` when neither a node nor a quiz is given, when
    /// a quiz is combined with a node or lesson, or when the node lacks a
    /// required property (including the mastery model of an exercise).
    pub fn validate(self) -> Result<SessionStart, SessionArgsError> {
        let target = match (self.node, self.quiz_id) {
            (None, None) => return Err(SessionArgsError::MissingTarget),
            (Some(_), Some(_)) => return Err(SessionArgsError::ConflictingTarget),
            (None, Some(quiz_id)) => {
                if self.lesson_id.is_some() {
                    return Err(SessionArgsError::ConflictingTarget);
                }
                SessionTarget::Quiz { quiz_id }
            }
            (Some(node), None) => SessionTarget::Node {
                node: node.validate()?,
                lesson_id: self.lesson_id,
            },
        };

        Ok(SessionStart {
            target,
            repeat: self.repeat,
        })
    }
}

impl SessionStart {
    /// The context a session started from these arguments will track.
    #[must_use]
    pub fn context(&self) -> SessionContext {
        match &self.target {
            SessionTarget::Node { node, lesson_id } => SessionContext::Node {
                node_id: node.id.clone(),
                lesson_id: lesson_id.clone(),
            },
            SessionTarget::Quiz { quiz_id } => SessionContext::Quiz {
                quiz_id: quiz_id.clone(),
            },
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video() -> ContentNode {
        ContentNode::new("node-1", "content-1", "channel-1", "video")
    }

    #[test]
    fn neither_node_nor_quiz_is_rejected() {
        let err = InitSessionArgs::default().validate().unwrap_err();
        assert_eq!(err, SessionArgsError::MissingTarget);

        let err = InitSessionArgs {
            lesson_id: Some(LessonId::new("l1")),
            ..InitSessionArgs::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SessionArgsError::MissingTarget);
    }

    #[test]
    fn quiz_with_node_or_lesson_is_rejected() {
        let mut args = InitSessionArgs::for_node(video());
        args.quiz_id = Some(QuizId::new("q1"));
        assert_eq!(args.validate().unwrap_err(), SessionArgsError::ConflictingTarget);

        let args = InitSessionArgs::for_quiz("q1").with_lesson("l1");
        assert_eq!(args.validate().unwrap_err(), SessionArgsError::ConflictingTarget);
    }

    #[test]
    fn missing_node_fields_are_named() {
        let mut missing_id = video();
        missing_id.id = None;
        let mut missing_content = video();
        missing_content.content_id = None;
        let mut empty_channel = video();
        empty_channel.channel_id = Some(String::new());
        let mut missing_kind = video();
        missing_kind.kind = None;

        for (field, node) in [
            ("id", missing_id),
            ("content_id", missing_content),
            ("channel_id", empty_channel),
            ("kind", missing_kind),
        ] {
            let err = InitSessionArgs::for_node(node).validate().unwrap_err();
            assert_eq!(err, SessionArgsError::MissingNodeField(field));
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn exercise_requires_a_mastery_model_object_with_type() {
        let exercise = ContentNode::new("n", "c", "ch", EXERCISE_KIND);
        let err = InitSessionArgs::for_node(exercise.clone()).validate().unwrap_err();
        assert_eq!(err, SessionArgsError::MissingAssessmentMetadata);

        let mut no_model = exercise.clone();
        no_model.assessmentmetadata = Some(AssessmentMetadata::default());
        let err = InitSessionArgs::for_node(no_model).validate().unwrap_err();
        assert_eq!(err, SessionArgsError::MissingMasteryModel);

        let not_object = exercise.clone().with_mastery_model(json!("m_of_n"));
        let err = InitSessionArgs::for_node(not_object).validate().unwrap_err();
        assert_eq!(err, SessionArgsError::MasteryModelNotObject);

        let no_type = exercise.clone().with_mastery_model(json!({ "m": 3 }));
        let err = InitSessionArgs::for_node(no_type).validate().unwrap_err();
        assert_eq!(err, SessionArgsError::MissingMasteryModelType);

        let ok = exercise.with_mastery_model(json!({ "type": "m_of_n", "m": 3, "n": 5 }));
        let start = InitSessionArgs::for_node(ok).validate().unwrap();
        let SessionTarget::Node { node, .. } = start.target else {
            panic!("expected node target");
        };
        let model = node.mastery_model.unwrap();
        assert_eq!(model.kind, "m_of_n");
        assert_eq!(model.params.get("n"), Some(&json!(5)));
    }

    #[test]
    fn context_reflects_node_and_lesson() {
        let start = InitSessionArgs::for_node(video())
            .with_lesson("lesson-9")
            .validate()
            .unwrap();
        assert_eq!(
            start.context(),
            SessionContext::node("node-1", Some(LessonId::new("lesson-9")))
        );
        assert!(!start.repeat);
    }

    #[test]
    fn context_deserializes_quiz_before_node() {
        let quiz: SessionContext =
            serde_json::from_value(json!({ "quiz_id": "q1", "node_id": "n1" })).unwrap();
        assert_eq!(quiz, SessionContext::quiz("q1"));

        let node: SessionContext =
            serde_json::from_value(json!({ "node_id": "n1", "lesson_id": "l1" })).unwrap();
        assert_eq!(node, SessionContext::node("n1", Some(LessonId::new("l1"))));
    }
}
