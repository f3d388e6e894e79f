//! Domain types for teams, users and pull requests.
//!
//! Pull requests carry their reviewer set as a `BTreeSet`, so duplicates are
//! impossible and listing order is always ascending by identifier.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newtype for user identifiers to prevent mixing with other strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Newtype for pull request identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PullRequestId(pub String);

impl PullRequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PullRequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PullRequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A team member. Every user belongs to exactly one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl User {
    pub fn new(
        id: impl Into<UserId>,
        username: impl Into<String>,
        team_name: impl Into<String>,
        is_active: bool,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            team_name: team_name.into(),
            is_active,
        }
    }
}

/// A named team and its members, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
    pub members: Vec<User>,
}

impl Team {
    /// Build a team, forcing every member's affiliation to this team and
    /// sorting members by id. A repeated id keeps its last entry.
    pub fn new(name: impl Into<String>, members: Vec<User>) -> Self {
        let name = name.into();
        let members: BTreeMap<UserId, User> = members
            .into_iter()
            .map(|mut m| {
                m.team_name = name.clone();
                (m.id.clone(), m)
            })
            .collect();
        Self {
            name,
            members: members.into_values().collect(),
        }
    }
}

/// Lifecycle status of a pull request. `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }

    /// Parse the stored representation. Returns `None` for unknown values.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(Self::Open),
            "MERGED" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
    pub assigned_reviewers: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    /// Present iff `status == Merged`.
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// A freshly opened pull request. The author is dropped from `reviewers`
    /// if present.
    pub fn open(
        id: impl Into<PullRequestId>,
        name: impl Into<String>,
        author_id: impl Into<UserId>,
        reviewers: impl IntoIterator<Item = UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let author_id = author_id.into();
        let assigned_reviewers = reviewers
            .into_iter()
            .filter(|r| *r != author_id)
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            author_id,
            status: PullRequestStatus::Open,
            assigned_reviewers,
            created_at,
            merged_at: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn is_assigned(&self, reviewer: &UserId) -> bool {
        self.assigned_reviewers.contains(reviewer)
    }

    /// Reviewers in listing order (ascending id).
    pub fn reviewers(&self) -> impl Iterator<Item = &UserId> {
        self.assigned_reviewers.iter()
    }

    pub fn short(&self) -> PullRequestShort {
        PullRequestShort {
            id: self.id.clone(),
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// Listing view of a pull request, used for "what am I reviewing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestShort {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_drops_author_and_sorts_reviewers() {
        let pr = PullRequest::open(
            "pr1",
            "Test",
            "u1",
            vec![UserId::from("u3"), UserId::from("u1"), UserId::from("u2")],
            Utc::now(),
        );

        let reviewers: Vec<&str> = pr.reviewers().map(UserId::as_str).collect();
        assert_eq!(reviewers, vec!["u2", "u3"]);
        assert_eq!(pr.status, PullRequestStatus::Open);
        assert!(pr.merged_at.is_none());
    }

    #[test]
    fn test_team_new_overrides_affiliation_and_sorts() {
        let team = Team::new(
            "backend",
            vec![
                User::new("u2", "Bob", "elsewhere", true),
                User::new("u1", "Alice", "", false),
            ],
        );

        assert_eq!(team.members[0].id, UserId::from("u1"));
        assert!(team.members.iter().all(|m| m.team_name == "backend"));
    }

    #[test]
    fn test_team_new_keeps_last_entry_for_repeated_id() {
        let team = Team::new(
            "backend",
            vec![
                User::new("u1", "Alice", "", true),
                User::new("u2", "Bob", "", true),
                User::new("u1", "Alicia", "", false),
            ],
        );

        assert_eq!(
            team.members,
            vec![
                User::new("u1", "Alicia", "backend", false),
                User::new("u2", "Bob", "backend", true),
            ]
        );
    }

    #[test]
    fn test_status_parse_round_trips_known_values() {
        assert_eq!(PullRequestStatus::parse("OPEN"), Some(PullRequestStatus::Open));
        assert_eq!(
            PullRequestStatus::parse("MERGED"),
            Some(PullRequestStatus::Merged)
        );
        assert_eq!(PullRequestStatus::parse("merged"), None);
    }
}
