//! Error taxonomy for review operations.
//!
//! Every failure a caller can observe is one of a closed set of kinds. Callers
//! match on the variant (or on [`ErrorCode`]), never on message text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The kind of entity a `NotFound` / `AlreadyExists` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Team,
    User,
    /// The user named as a pull request's author.
    Author,
    /// The user named as the outgoing reviewer in a reassignment.
    Reviewer,
    PullRequest,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team => write!(f, "team"),
            Self::User => write!(f, "user"),
            Self::Author => write!(f, "author"),
            Self::Reviewer => write!(f, "reviewer"),
            Self::PullRequest => write!(f, "pull request"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// An identifier that must be unique is already taken.
    #[error("{entity} already exists")]
    AlreadyExists { entity: Entity },

    #[error("{entity} not found")]
    NotFound { entity: Entity },

    /// Mutation attempted on a merged pull request.
    #[error("cannot reassign on merged pull request")]
    AlreadyMerged,

    #[error("reviewer is not assigned to this pull request")]
    NotAssigned,

    #[error("no active replacement candidate in team")]
    NoCandidate,

    /// Storage or infrastructure failure. The message is for logs only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    pub fn already_exists(entity: Entity) -> Self {
        Self::AlreadyExists { entity }
    }

    pub fn not_found(entity: Entity) -> Self {
        Self::NotFound { entity }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyExists {
                entity: Entity::Team,
            } => ErrorCode::TeamExists,
            Self::AlreadyExists { .. } => ErrorCode::PrExists,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyMerged => ErrorCode::PrMerged,
            Self::NotAssigned => ErrorCode::NotAssigned,
            Self::NoCandidate => ErrorCode::NoCandidate,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Stable, externally visible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TeamExists,
    PrExists,
    PrMerged,
    NotAssigned,
    NoCandidate,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamExists => "TEAM_EXISTS",
            Self::PrExists => "PR_EXISTS",
            Self::PrMerged => "PR_MERGED",
            Self::NotAssigned => "NOT_ASSIGNED",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_messages_name_the_entity() {
        assert_eq!(
            ReviewError::not_found(Entity::Author).to_string(),
            "author not found"
        );
        assert_eq!(
            ReviewError::not_found(Entity::PullRequest).to_string(),
            "pull request not found"
        );
        assert_eq!(
            ReviewError::not_found(Entity::Reviewer).to_string(),
            "reviewer not found"
        );
    }

    #[test]
    fn test_already_exists_code_depends_on_entity() {
        assert_eq!(
            ReviewError::already_exists(Entity::Team).code(),
            ErrorCode::TeamExists
        );
        assert_eq!(
            ReviewError::already_exists(Entity::PullRequest).code(),
            ErrorCode::PrExists
        );
    }

    #[test]
    fn test_conflict_kinds_have_distinct_codes() {
        let codes = [
            ReviewError::AlreadyMerged.code(),
            ReviewError::NotAssigned.code(),
            ReviewError::NoCandidate.code(),
            ReviewError::internal("disk on fire").code(),
        ];
        assert_eq!(
            codes,
            [
                ErrorCode::PrMerged,
                ErrorCode::NotAssigned,
                ErrorCode::NoCandidate,
                ErrorCode::Internal
            ]
        );
    }

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(ErrorCode::PrMerged.as_str(), "PR_MERGED");
        assert_eq!(ErrorCode::NoCandidate.to_string(), "NO_CANDIDATE");
    }
}
