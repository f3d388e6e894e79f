//! Pull request state transitions.
//!
//! `Open -> Merged` is the only transition; `Merged` is terminal. These
//! functions decide what a transition does without touching storage, so the
//! same rules apply regardless of backend:
//!
//! - merging a merged pull request is a no-op, not an error
//! - reassignment is rejected on merged pull requests
//! - the outgoing reviewer must currently be assigned
//! - a replacement is never the author or anyone already assigned

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::assignment::select_replacement;
use crate::error::ReviewError;
use crate::model::{PullRequest, PullRequestStatus, User, UserId};

/// What a merge request should do to a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTransition {
    /// Already merged; return the stored state untouched.
    Unchanged,
    /// Move to `Merged`, stamping `merged_at`.
    Merge { merged_at: DateTime<Utc> },
}

pub fn merge_transition(pr: &PullRequest, now: DateTime<Utc>) -> MergeTransition {
    match pr.status {
        PullRequestStatus::Merged => MergeTransition::Unchanged,
        PullRequestStatus::Open => MergeTransition::Merge { merged_at: now },
    }
}

/// Apply a merge to an in-memory pull request.
pub fn apply_merge(mut pr: PullRequest, merged_at: DateTime<Utc>) -> PullRequest {
    if !pr.is_merged() {
        pr.status = PullRequestStatus::Merged;
        pr.merged_at = Some(merged_at);
    }
    pr
}

/// Preconditions on the pull request itself for replacing `old_reviewer`.
///
/// Checked before the outgoing reviewer is looked up, so a merged pull request
/// reports `AlreadyMerged` regardless of who was named.
pub fn check_reassignable(pr: &PullRequest, old_reviewer: &UserId) -> Result<(), ReviewError> {
    if pr.is_merged() {
        return Err(ReviewError::AlreadyMerged);
    }
    if !pr.is_assigned(old_reviewer) {
        return Err(ReviewError::NotAssigned);
    }
    Ok(())
}

/// Identifiers that may not be chosen as a replacement: the author and every
/// currently assigned reviewer, including the outgoing one.
pub fn replacement_exclusions(pr: &PullRequest) -> BTreeSet<UserId> {
    let mut excluded = pr.assigned_reviewers.clone();
    excluded.insert(pr.author_id.clone());
    excluded
}

/// A decided reviewer swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub outgoing: UserId,
    pub replacement: UserId,
}

/// Decide a replacement for `old_reviewer` from `pool` (the active members of
/// the outgoing reviewer's team).
pub fn plan_reassignment(
    pr: &PullRequest,
    old_reviewer: &UserId,
    pool: &[User],
) -> Result<Reassignment, ReviewError> {
    check_reassignable(pr, old_reviewer)?;
    let replacement = select_replacement(pool, &replacement_exclusions(pr))?;
    Ok(Reassignment {
        outgoing: old_reviewer.clone(),
        replacement,
    })
}

/// Apply a swap to an in-memory pull request.
pub fn apply_reassignment(mut pr: PullRequest, swap: &Reassignment) -> PullRequest {
    pr.assigned_reviewers.remove(&swap.outgoing);
    pr.assigned_reviewers.insert(swap.replacement.clone());
    pr
}
