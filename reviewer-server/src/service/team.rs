use std::sync::Arc;

use reviewer_core::{Entity, ReviewError, Team};
use tracing::info;

use crate::repository::Store;

/// Team registration and lookup.
pub struct TeamService<S> {
    store: Arc<S>,
}

impl<S> Clone for TeamService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> TeamService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new team and upsert its members into it. Members that
    /// already belong to another team move here.
    pub async fn add_team(&self, team: Team) -> Result<Team, ReviewError> {
        let created = self
            .store
            .transaction(move |tx| {
                if tx.team_exists(&team.name)? {
                    return Err(ReviewError::already_exists(Entity::Team));
                }
                Ok(tx.upsert_team(&team)?)
            })
            .await?;

        info!(
            team_name = %created.name,
            members = created.members.len(),
            "Team added"
        );
        Ok(created)
    }

    pub async fn get_team(&self, name: String) -> Result<Team, ReviewError> {
        self.store
            .transaction(move |tx| {
                tx.get_team(&name)?
                    .ok_or_else(|| ReviewError::not_found(Entity::Team))
            })
            .await
    }
}
