//! Typed failures for every workflow operation.
//!
//! Only [`Error::RemoteUnavailable`] is eligible for a caller-initiated retry.
//! Everything else is a definite answer and must be surfaced as-is.

use thiserror::Error;

use crate::types::{RequestId, SkillDirection, SkillId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("cannot {action} {entity} in state {state}")]
    InvalidTransition {
        entity: &'static str,
        action: &'static str,
        state: String,
    },

    #[error("only the {allowed} may {action} this {entity}")]
    UnauthorizedActor {
        entity: &'static str,
        action: &'static str,
        allowed: &'static str,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("skill {skill_id} is already in your {direction} list")]
    DuplicateSkill {
        skill_id: SkillId,
        direction: SkillDirection,
    },

    #[error("a session already exists for swap request {0}")]
    DuplicateSession(RequestId),

    #[error("no specific skill match found for this user")]
    IncompleteMatch,

    #[error("add {skill_name} to your {direction} skills before requesting this swap")]
    UnregisteredSkill {
        direction: SkillDirection,
        skill_name: String,
    },

    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),
}

/// Discriminant of [`Error`] for callers that branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    UnauthorizedActor,
    NotFound,
    DuplicateSkill,
    DuplicateSession,
    IncompleteMatch,
    UnregisteredSkill,
    RemoteUnavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::UnauthorizedActor { .. } => ErrorKind::UnauthorizedActor,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateSkill { .. } => ErrorKind::DuplicateSkill,
            Self::DuplicateSession(_) => ErrorKind::DuplicateSession,
            Self::IncompleteMatch => ErrorKind::IncompleteMatch,
            Self::UnregisteredSkill { .. } => ErrorKind::UnregisteredSkill,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::RemoteUnavailable
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_unavailable_is_retryable() {
        assert!(Error::RemoteUnavailable("timeout".to_string()).is_retryable());
        assert!(!Error::Validation("bad".to_string()).is_retryable());
        assert!(!Error::IncompleteMatch.is_retryable());
        assert!(!Error::DuplicateSession(RequestId(1)).is_retryable());
    }

    #[test]
    fn unregistered_skill_message_guides_the_user() {
        let err = Error::UnregisteredSkill {
            direction: SkillDirection::Learn,
            skill_name: "Guitar".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Guitar"));
        assert!(msg.contains("learn"));
    }

    #[test]
    fn invalid_transition_names_state_and_action() {
        let err = Error::InvalidTransition {
            entity: "swap request",
            action: "accept",
            state: "REJECTED".to_string(),
        };
        assert_eq!(err.to_string(), "cannot accept swap request in state REJECTED");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }
}
