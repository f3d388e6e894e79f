use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use reviewer_core::{PullRequestId, Team, User, UserId};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::error::ApiError;
use super::types::{
    AddTeamRequest, AddTeamResponse, CreatePullRequestRequest, MergePullRequestRequest,
    PullRequestBody, PullRequestResponse, PullRequestShortBody, ReassignRequest,
    ReassignResponse, ReviewsResponse, SetActiveRequest, SetActiveResponse, TeamBody, TeamQuery,
    UserBody, UserQuery,
};
use crate::metrics::MetricsSnapshot;
use crate::repository::Store;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

fn parse_body<T: DeserializeOwned>(bytes: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        debug!("Rejected request body: {}", e);
        ApiError::bad_request("invalid request body")
    })
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query.map(|Query(value)| value).map_err(|e| {
        debug!("Rejected query string: {}", e);
        ApiError::bad_request("invalid query string")
    })
}

fn require(fields: &[&str], message: &str) -> ApiResult<()> {
    if fields.iter().any(|f| f.is_empty()) {
        return Err(ApiError::bad_request(message));
    }
    Ok(())
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "pr-reviewer"
    }))
}

pub async fn metrics<S: Store>(State(state): State<Arc<AppState<S>>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn add_team<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AddTeamResponse>)> {
    let req: AddTeamRequest = parse_body(&body)?;
    require(&[req.team_name.as_str()], "team_name is required")?;

    let mut members = Vec::with_capacity(req.members.len());
    for m in req.members {
        require(
            &[m.user_id.as_str(), m.username.as_str()],
            "member user_id and username are required",
        )?;
        members.push(User::new(m.user_id, m.username, req.team_name.clone(), m.is_active));
    }

    let team = state
        .teams
        .add_team(Team::new(req.team_name, members))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddTeamResponse {
            team: TeamBody::from(&team),
        }),
    ))
}

pub async fn get_team<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> ApiResult<Json<TeamBody>> {
    let query = parse_query(query)?;
    require(&[query.team_name.as_str()], "team_name is required")?;
    let team = state.teams.get_team(query.team_name).await?;
    Ok(Json(TeamBody::from(&team)))
}

pub async fn set_is_active<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> ApiResult<Json<SetActiveResponse>> {
    let req: SetActiveRequest = parse_body(&body)?;
    require(&[req.user_id.as_str()], "user_id is required")?;

    let user = state
        .users
        .set_active(UserId::from(req.user_id), req.is_active)
        .await?;
    Ok(Json(SetActiveResponse {
        user: UserBody::from(&user),
    }))
}

pub async fn get_review<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<ReviewsResponse>> {
    let query = parse_query(query)?;
    require(&[query.user_id.as_str()], "user_id is required")?;

    let reviews = state
        .users
        .reviews(UserId::from(query.user_id.clone()))
        .await?;
    Ok(Json(ReviewsResponse {
        user_id: query.user_id,
        pull_requests: reviews.iter().map(PullRequestShortBody::from).collect(),
    }))
}

pub async fn create_pull_request<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PullRequestResponse>)> {
    let req: CreatePullRequestRequest = parse_body(&body)?;
    require(
        &[
            req.pull_request_id.as_str(),
            req.pull_request_name.as_str(),
            req.author_id.as_str(),
        ],
        "pull_request_id, pull_request_name and author_id are required",
    )?;

    let pr = state
        .pull_requests
        .create(
            PullRequestId::from(req.pull_request_id),
            req.pull_request_name,
            UserId::from(req.author_id),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PullRequestResponse {
            pr: PullRequestBody::from(&pr),
        }),
    ))
}

pub async fn merge_pull_request<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> ApiResult<Json<PullRequestResponse>> {
    let req: MergePullRequestRequest = parse_body(&body)?;
    require(&[req.pull_request_id.as_str()], "pull_request_id is required")?;

    let pr = state
        .pull_requests
        .merge(PullRequestId::from(req.pull_request_id))
        .await?;
    Ok(Json(PullRequestResponse {
        pr: PullRequestBody::from(&pr),
    }))
}

pub async fn reassign_reviewer<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> ApiResult<Json<ReassignResponse>> {
    let req: ReassignRequest = parse_body(&body)?;
    require(
        &[req.pull_request_id.as_str(), req.old_user_id.as_str()],
        "pull_request_id and old_user_id are required",
    )?;

    let (pr, replaced_by) = state
        .pull_requests
        .reassign(
            PullRequestId::from(req.pull_request_id),
            UserId::from(req.old_user_id),
        )
        .await?;
    Ok(Json(ReassignResponse {
        pr: PullRequestBody::from(&pr),
        replaced_by: replaced_by.to_string(),
    }))
}
