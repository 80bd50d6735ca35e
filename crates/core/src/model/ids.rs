use serde::{Deserialize, Serialize};
use std::fmt;

// Server-issued identifiers are opaque strings (hex UUIDs in practice).
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the underlying string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a live content session on the server.
    SessionId
);
string_id!(
    /// Identifier of a content node (video, exercise, document...).
    NodeId
);
string_id!(
    /// Identifier of the lesson a node is being viewed through.
    LessonId
);
string_id!(
    /// Identifier of a quiz (exam).
    QuizId
);
string_id!(
    /// Identifier the server assigns to an attempt once it is persisted.
    AttemptId
);
