//! Reviewer selection.
//!
//! Pure functions over a candidate pool. The pool is expected to be the active
//! members of a team in ascending id order; selection preserves that order so
//! results are deterministic. Inactive users in the pool are skipped.

use std::collections::BTreeSet;

use crate::error::ReviewError;
use crate::model::{User, UserId};

/// Number of reviewers assigned when a pull request is opened.
pub const DEFAULT_REVIEWER_COUNT: usize = 2;

/// Pick up to `limit` reviewers from `pool`, skipping `exclude`.
///
/// Returning fewer than `limit` (including none) is not an error.
pub fn select_reviewers(pool: &[User], exclude: &UserId, limit: usize) -> Vec<UserId> {
    pool.iter()
        .filter(|u| u.is_active && u.id != *exclude)
        .map(|u| u.id.clone())
        .take(limit)
        .collect()
}

/// Pick the first member of `pool` not in `exclude`.
pub fn select_replacement(
    pool: &[User],
    exclude: &BTreeSet<UserId>,
) -> Result<UserId, ReviewError> {
    pool.iter()
        .find(|u| u.is_active && !exclude.contains(&u.id))
        .map(|u| u.id.clone())
        .ok_or(ReviewError::NoCandidate)
}
