//! Persistence gateway for teams, users and pull requests.
//!
//! All access goes through a unit of work: [`Store::transaction`] hands a
//! closure a `&mut dyn Transaction`, commits if the closure returns `Ok`, and
//! rolls back otherwise. Rollback also happens if the closure panics or if the
//! awaiting future is dropped before the commit point, so no partial mutation
//! is ever visible.
//!
//! Lookups return `Option`; turning absence into an entity-specific
//! `NotFound` is the caller's job.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewer_core::{PullRequest, PullRequestId, PullRequestShort, ReviewError, Team, User, UserId};
use thiserror::Error;

/// Storage-level failure. Always surfaces to callers as `ReviewError::Internal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("corrupt {what} in storage")]
    Corruption { what: String },

    /// The enclosing operation was dropped before commit.
    #[error("transaction cancelled before commit")]
    Cancelled,
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }
}

impl From<RepositoryError> for ReviewError {
    fn from(e: RepositoryError) -> Self {
        ReviewError::internal(e.to_string())
    }
}

/// Operations available inside a unit of work.
///
/// Implementations are synchronous: a transaction never awaits, so it cannot
/// be interleaved with another one on the same store.
pub trait Transaction {
    // Teams

    fn team_exists(&self, name: &str) -> Result<bool, RepositoryError>;

    /// Register the team (if new) and upsert every member into it.
    fn upsert_team(&mut self, team: &Team) -> Result<Team, RepositoryError>;

    /// The team with all of its members (active or not), ordered by id.
    fn get_team(&self, name: &str) -> Result<Option<Team>, RepositoryError>;

    // Users

    fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    fn set_active(&mut self, id: &UserId, is_active: bool) -> Result<Option<User>, RepositoryError>;

    /// Active members of `team_name` in ascending id order.
    fn list_active_members(&self, team_name: &str) -> Result<Vec<User>, RepositoryError>;

    // Pull requests

    fn get_pull_request(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError>;

    /// Insert a new pull request with its reviewers. The caller has already
    /// checked that the id is free.
    fn create_pull_request(&mut self, pr: &PullRequest) -> Result<PullRequest, RepositoryError>;

    fn merge_pull_request(
        &mut self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<Option<PullRequest>, RepositoryError>;

    fn reassign_reviewer(
        &mut self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<Option<PullRequest>, RepositoryError>;

    /// Pull requests `reviewer` is assigned to, newest first.
    fn list_by_reviewer(&self, reviewer: &UserId) -> Result<Vec<PullRequestShort>, RepositoryError>;
}

/// A transactional store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Run `work` as one atomic unit of work.
    async fn transaction<T, F>(&self, work: F) -> Result<T, ReviewError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> Result<T, ReviewError> + Send + 'static;
}
