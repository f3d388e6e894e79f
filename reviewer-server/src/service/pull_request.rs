//! Pull request lifecycle: create, merge and reassign.
//!
//! Every operation reads what it decides on and writes the result inside one
//! unit of work, so preconditions (existence, status, reviewer membership) are
//! always checked against the state the write applies to. Nothing here
//! retries: a retried create or reassign could double-apply.

use std::sync::Arc;

use chrono::Utc;
use reviewer_core::lifecycle::{self, MergeTransition};
use reviewer_core::{
    select_reviewers, Entity, PullRequest, PullRequestId, ReviewError, UserId,
    DEFAULT_REVIEWER_COUNT,
};
use tracing::{error, info, warn};

use crate::metrics::{MetricsSink, ReassignOutcome};
use crate::repository::Store;

pub struct PullRequestService<S> {
    store: Arc<S>,
    metrics: Arc<dyn MetricsSink>,
}

impl<S> Clone for PullRequestService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: Store> PullRequestService<S> {
    pub fn new(store: Arc<S>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    /// Open a pull request and assign up to two active teammates of the author.
    pub async fn create(
        &self,
        id: PullRequestId,
        name: String,
        author_id: UserId,
    ) -> Result<PullRequest, ReviewError> {
        let result = self
            .store
            .transaction(move |tx| {
                if tx.get_pull_request(&id)?.is_some() {
                    return Err(ReviewError::already_exists(Entity::PullRequest));
                }

                let author = tx
                    .get_user(&author_id)?
                    .ok_or_else(|| ReviewError::not_found(Entity::Author))?;

                let pool = tx.list_active_members(&author.team_name)?;
                let reviewers = select_reviewers(&pool, &author.id, DEFAULT_REVIEWER_COUNT);

                let pr = PullRequest::open(id, name, author.id, reviewers, Utc::now());
                Ok(tx.create_pull_request(&pr)?)
            })
            .await;

        match &result {
            Ok(pr) => {
                self.metrics.pull_request_created();
                info!(
                    pull_request_id = %pr.id,
                    author_id = %pr.author_id,
                    reviewers = pr.assigned_reviewers.len(),
                    "Pull request created"
                );
            }
            Err(e) => log_rejection("create", e),
        }
        result
    }

    /// Mark a pull request merged. Merging a merged pull request returns it
    /// unchanged.
    pub async fn merge(&self, id: PullRequestId) -> Result<PullRequest, ReviewError> {
        let now = Utc::now();
        let result = self
            .store
            .transaction(move |tx| {
                let pr = tx
                    .get_pull_request(&id)?
                    .ok_or_else(|| ReviewError::not_found(Entity::PullRequest))?;

                match lifecycle::merge_transition(&pr, now) {
                    MergeTransition::Unchanged => Ok((pr, false)),
                    MergeTransition::Merge { merged_at } => {
                        let merged = tx
                            .merge_pull_request(&id, merged_at)?
                            .ok_or_else(|| ReviewError::not_found(Entity::PullRequest))?;
                        Ok((merged, true))
                    }
                }
            })
            .await;

        match result {
            Ok((pr, transitioned)) => {
                if transitioned {
                    self.metrics.pull_request_merged();
                    info!(pull_request_id = %pr.id, "Pull request merged");
                }
                Ok(pr)
            }
            Err(e) => {
                log_rejection("merge", &e);
                Err(e)
            }
        }
    }

    /// Replace `old_reviewer` with an active teammate of theirs who is neither
    /// the author nor already assigned. Returns the updated pull request and
    /// the replacement's id.
    pub async fn reassign(
        &self,
        id: PullRequestId,
        old_reviewer: UserId,
    ) -> Result<(PullRequest, UserId), ReviewError> {
        let result = self
            .store
            .transaction(move |tx| {
                let pr = tx
                    .get_pull_request(&id)?
                    .ok_or_else(|| ReviewError::not_found(Entity::PullRequest))?;

                lifecycle::check_reassignable(&pr, &old_reviewer)?;

                let outgoing = tx
                    .get_user(&old_reviewer)?
                    .ok_or_else(|| ReviewError::not_found(Entity::Reviewer))?;

                let pool = tx.list_active_members(&outgoing.team_name)?;
                let swap = lifecycle::plan_reassignment(&pr, &outgoing.id, &pool)?;

                let updated = tx
                    .reassign_reviewer(&id, &swap.outgoing, &swap.replacement)?
                    .ok_or_else(|| ReviewError::not_found(Entity::PullRequest))?;
                Ok((updated, swap.replacement))
            })
            .await;

        self.metrics.reassignment(ReassignOutcome::from_result(&result));

        match &result {
            Ok((pr, replaced_by)) => info!(
                pull_request_id = %pr.id,
                replaced_by = %replaced_by,
                "Reviewer reassigned"
            ),
            Err(e) => log_rejection("reassign", e),
        }
        result
    }
}

fn log_rejection(operation: &'static str, e: &ReviewError) {
    if e.is_internal() {
        error!(operation, error = %e, "Pull request operation failed");
    } else {
        warn!(operation, code = %e.code(), "Pull request operation rejected: {}", e);
    }
}
