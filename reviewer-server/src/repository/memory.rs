//! In-memory implementation of `Store`.
//!
//! All state is held in memory and lost on restart. A unit of work runs
//! against a private copy of the committed state while holding the store lock;
//! the copy replaces the committed state only when the work succeeds. Units of
//! work are therefore serializable, and a failed or panicking one leaves no
//! trace.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewer_core::{
    lifecycle, PullRequest, PullRequestId, PullRequestShort, ReviewError, Team, User, UserId,
};
use tokio::sync::Mutex;

use super::{RepositoryError, Store, Transaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeSet<String>,
    users: BTreeMap<UserId, User>,
    pull_requests: BTreeMap<PullRequestId, PullRequest>,
}

/// In-memory store.
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn transaction<T, F>(&self, work: F) -> Result<T, ReviewError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> Result<T, ReviewError> + Send + 'static,
    {
        let mut committed = self.state.lock().await;
        let mut tx = MemoryTransaction {
            working: committed.clone(),
        };
        let value = work(&mut tx)?;
        *committed = tx.working;
        Ok(value)
    }
}

struct MemoryTransaction {
    working: MemoryState,
}

impl MemoryTransaction {
    fn members_of(&self, team_name: &str) -> Vec<User> {
        // BTreeMap iteration is already ascending by id.
        self.working
            .users
            .values()
            .filter(|u| u.team_name == team_name)
            .cloned()
            .collect()
    }
}

impl Transaction for MemoryTransaction {
    fn team_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        Ok(self.working.teams.contains(name))
    }

    fn upsert_team(&mut self, team: &Team) -> Result<Team, RepositoryError> {
        self.working.teams.insert(team.name.clone());
        for member in &team.members {
            let mut member = member.clone();
            member.team_name = team.name.clone();
            self.working.users.insert(member.id.clone(), member);
        }
        let members = team
            .members
            .iter()
            .filter_map(|m| self.working.users.get(&m.id).cloned())
            .collect();
        Ok(Team::new(team.name.clone(), members))
    }

    fn get_team(&self, name: &str) -> Result<Option<Team>, RepositoryError> {
        if !self.working.teams.contains(name) {
            return Ok(None);
        }
        Ok(Some(Team::new(name, self.members_of(name))))
    }

    fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.working.users.get(id).cloned())
    }

    fn set_active(
        &mut self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.working.users.get_mut(id).map(|user| {
            user.is_active = is_active;
            user.clone()
        }))
    }

    fn list_active_members(&self, team_name: &str) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .members_of(team_name)
            .into_iter()
            .filter(|u| u.is_active)
            .collect())
    }

    fn get_pull_request(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError> {
        Ok(self.working.pull_requests.get(id).cloned())
    }

    fn create_pull_request(&mut self, pr: &PullRequest) -> Result<PullRequest, RepositoryError> {
        if self.working.pull_requests.contains_key(&pr.id) {
            return Err(RepositoryError::storage(
                "create_pull_request",
                format!("duplicate pull request id {}", pr.id),
            ));
        }
        if !self.working.users.contains_key(&pr.author_id) {
            return Err(RepositoryError::storage(
                "create_pull_request",
                format!("unknown author {}", pr.author_id),
            ));
        }
        self.working.pull_requests.insert(pr.id.clone(), pr.clone());
        Ok(pr.clone())
    }

    fn merge_pull_request(
        &mut self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let Some(pr) = self.working.pull_requests.remove(id) else {
            return Ok(None);
        };
        let merged = lifecycle::apply_merge(pr, merged_at);
        self.working.pull_requests.insert(id.clone(), merged.clone());
        Ok(Some(merged))
    }

    fn reassign_reviewer(
        &mut self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        Ok(self.working.pull_requests.get_mut(id).map(|pr| {
            pr.assigned_reviewers.remove(old_reviewer);
            pr.assigned_reviewers.insert(new_reviewer.clone());
            pr.clone()
        }))
    }

    fn list_by_reviewer(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequestShort>, RepositoryError> {
        let mut assigned: Vec<&PullRequest> = self
            .working
            .pull_requests
            .values()
            .filter(|pr| pr.is_assigned(reviewer))
            .collect();
        assigned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(assigned.into_iter().map(PullRequest::short).collect())
    }
}
