use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an aggregate instance.
///
/// Every event-sourced record on the attempt side (a user's quiz
/// relationship, a single attempt result) is keyed by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives a stable aggregate ID from a natural key.
    ///
    /// The same namespace and parts always yield the same ID, which lets a
    /// store reject a second creation for the same natural key.
    pub fn derive(namespace: Uuid, parts: &[Uuid]) -> Self {
        let mut bytes = Vec::with_capacity(parts.len() * 16);
        for part in parts {
            bytes.extend_from_slice(part.as_bytes());
        }
        Self(Uuid::new_v5(&namespace, &bytes))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Declares a UUID-backed identifier for an entity that is not itself an
/// aggregate on this side of the saga.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// A student account.
    UserId
);
entity_id!(
    /// A course that owns quizzes and questions.
    CourseId
);
entity_id!(
    /// A quiz in the question bank.
    QuizId
);
entity_id!(
    /// A question in the question bank.
    QuestionId
);
entity_id!(
    /// One selectable choice of a choice-based question.
    ChoiceId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_new_creates_unique_ids() {
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn aggregate_id_derive_is_stable() {
        let ns = Uuid::new_v4();
        let user = Uuid::new_v4();
        let quiz = Uuid::new_v4();

        assert_eq!(
            AggregateId::derive(ns, &[user, quiz]),
            AggregateId::derive(ns, &[user, quiz])
        );
        assert_ne!(
            AggregateId::derive(ns, &[user, quiz]),
            AggregateId::derive(ns, &[quiz, user])
        );
    }

    #[test]
    fn entity_ids_serialize_as_bare_uuids() {
        let uuid = Uuid::new_v4();
        let id = QuestionId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));

        let back: QuestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.as_uuid(), uuid);
    }

    #[test]
    fn entity_id_display_matches_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(ChoiceId::from(uuid).to_string(), uuid.to_string());
    }
}
