mod attempt;
mod context;
mod ids;
mod session;
mod update;

pub use attempt::{AttemptChange, AttemptHistory, AttemptRecord};
pub use context::{
    AssessmentMetadata, ContentNode, EXERCISE_KIND, InitSessionArgs, MasteryCriterion,
    SessionArgsError, SessionContext, SessionStart, SessionTarget, ValidatedNode,
};
pub use ids::{AttemptId, LessonId, NodeId, QuizId, SessionId};
pub use session::{
    CONTENT_STATE_KEY, ContentSession, FlushThresholds, LocalChange, SessionDelta, SessionSeed,
};
pub use update::{ProgressChange, SessionUpdate, UpdateArgsError, ValidatedUpdate};
