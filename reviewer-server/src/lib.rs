pub mod api;
pub mod config;
pub mod metrics;
pub mod repository;
pub mod service;

use std::sync::Arc;

use metrics::ReviewCounters;
use repository::Store;
use service::{PullRequestService, TeamService, UserService};

pub use api::router;

/// Shared state behind every request handler.
pub struct AppState<S> {
    pub teams: TeamService<S>,
    pub users: UserService<S>,
    pub pull_requests: PullRequestService<S>,
    pub metrics: Arc<ReviewCounters>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, metrics: Arc<ReviewCounters>) -> Self {
        Self {
            teams: TeamService::new(store.clone()),
            users: UserService::new(store.clone()),
            pull_requests: PullRequestService::new(store, metrics.clone()),
            metrics,
        }
    }
}
