//! Request and response bodies.
//!
//! Request string fields default to empty so that a missing field and an
//! empty one are rejected by the same validation.

use chrono::{DateTime, Utc};
use reviewer_core::{PullRequest, PullRequestShort, PullRequestStatus, Team, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamMemberBody {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_active: bool,
}

impl From<&User> for TeamMemberBody {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            username: user.username.clone(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTeamRequest {
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub members: Vec<TeamMemberBody>,
}

#[derive(Debug, Serialize)]
pub struct TeamBody {
    pub team_name: String,
    pub members: Vec<TeamMemberBody>,
}

impl From<&Team> for TeamBody {
    fn from(team: &Team) -> Self {
        Self {
            team_name: team.name.clone(),
            members: team.members.iter().map(TeamMemberBody::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddTeamResponse {
    pub team: TeamBody,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    pub team_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl From<&User> for UserBody {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.to_string(),
            username: user.username.clone(),
            team_name: user.team_name.clone(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetActiveResponse {
    pub user: UserBody,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestShortBody {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

impl From<&PullRequestShort> for PullRequestShortBody {
    fn from(pr: &PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id.to_string(),
            pull_request_name: pr.name.clone(),
            author_id: pr.author_id.to_string(),
            status: pr.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShortBody>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    #[serde(default)]
    pub pull_request_id: String,
    #[serde(default)]
    pub pull_request_name: String,
    #[serde(default)]
    pub author_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MergePullRequestRequest {
    #[serde(default)]
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    #[serde(default)]
    pub pull_request_id: String,
    #[serde(default)]
    pub old_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct PullRequestBody {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    /// Ascending by id.
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<&PullRequest> for PullRequestBody {
    fn from(pr: &PullRequest) -> Self {
        Self {
            pull_request_id: pr.id.to_string(),
            pull_request_name: pr.name.clone(),
            author_id: pr.author_id.to_string(),
            status: pr.status,
            assigned_reviewers: pr.reviewers().map(ToString::to_string).collect(),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestBody,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub pr: PullRequestBody,
    pub replaced_by: String,
}
