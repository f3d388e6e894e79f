use std::sync::Arc;

use reviewer_core::{Entity, PullRequestShort, ReviewError, User, UserId};
use tracing::info;

use crate::repository::Store;

/// Member availability and review listings.
pub struct UserService<S> {
    store: Arc<S>,
}

impl<S> Clone for UserService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> UserService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Toggle whether the user can be picked as a reviewer. Existing
    /// assignments are left alone.
    pub async fn set_active(&self, id: UserId, is_active: bool) -> Result<User, ReviewError> {
        let user = self
            .store
            .transaction(move |tx| {
                tx.set_active(&id, is_active)?
                    .ok_or_else(|| ReviewError::not_found(Entity::User))
            })
            .await?;

        info!(user_id = %user.id, is_active = user.is_active, "User activity changed");
        Ok(user)
    }

    /// Pull requests the user is assigned to review, newest first.
    pub async fn reviews(&self, id: UserId) -> Result<Vec<PullRequestShort>, ReviewError> {
        self.store
            .transaction(move |tx| {
                if tx.get_user(&id)?.is_none() {
                    return Err(ReviewError::not_found(Entity::User));
                }
                Ok(tx.list_by_reviewer(&id)?)
            })
            .await
    }
}
