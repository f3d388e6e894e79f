//! SQLite implementation of `Store`.
//!
//! This provides persistent storage that survives service restarts.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.
//!
//! # Transactions
//!
//! Every unit of work is a `BEGIN IMMEDIATE` transaction run on a blocking
//! thread. The connection sits behind a `Mutex`, so units of work are
//! serialized within the process; `IMMEDIATE` takes the write lock up front so
//! another process cannot slip a write between our reads and our write.


use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reviewer_core::{
    PullRequest, PullRequestId, PullRequestShort, PullRequestStatus, ReviewError, Team, User,
    UserId,
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{RepositoryError, Store, Transaction};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 2;

/// SQLite-backed store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteStore {
    /// Exposed as `pub(crate)` so tests can inspect raw rows.
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring its schema up to date.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` so committed reviewer changes survive power loss
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    /// - `foreign_keys = ON` so reviewers and authors always reference users
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();

        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";
        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // SQLite can silently stay in DELETE mode on filesystems without
        // shared memory support. In-memory databases report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'.",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        // 0 if the table is empty (fresh database)
        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS teams (
                    name TEXT PRIMARY KEY
                );

                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    team_name TEXT NOT NULL REFERENCES teams(name),
                    is_active INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pull_requests (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    author_id TEXT NOT NULL REFERENCES users(id),
                    status TEXT NOT NULL CHECK (status IN ('OPEN', 'MERGED')),
                    created_at TEXT NOT NULL,
                    merged_at TEXT,
                    CHECK ((status = 'MERGED') = (merged_at IS NOT NULL))
                );

                CREATE TABLE IF NOT EXISTS pull_request_reviewers (
                    pull_request_id TEXT NOT NULL REFERENCES pull_requests(id),
                    reviewer_id TEXT NOT NULL REFERENCES users(id),
                    PRIMARY KEY (pull_request_id, reviewer_id)
                );
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        // Lookup paths used on every create/reassign and by the review listing.
        if from_version < 2 {
            conn.execute_batch(
                r#"
                CREATE INDEX IF NOT EXISTS idx_users_team_active
                    ON users(team_name, is_active, id);
                CREATE INDEX IF NOT EXISTS idx_reviewers_by_user
                    ON pull_request_reviewers(reviewer_id);
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v2", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn transaction<T, F>(&self, work: F) -> Result<T, ReviewError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transaction) -> Result<T, ReviewError> + Send + 'static,
    {
        let conn = self.conn.clone();
        // Cancelled if the caller drops this future before the join below.
        let cancelled = CancellationToken::new();
        let guard = cancelled.clone().drop_guard();

        let result = tokio::task::spawn_blocking(move || -> Result<T, ReviewError> {
            // A poisoned lock means an earlier unit of work panicked; its
            // rusqlite transaction rolled back while unwinding, so the
            // connection itself is consistent.
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);

            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| RepositoryError::storage("begin", e.to_string()))?;
            let mut scoped = SqliteTransaction { tx };

            let value = work(&mut scoped)?;

            if cancelled.is_cancelled() {
                warn!("Unit of work abandoned by caller, rolling back");
                return Err(RepositoryError::Cancelled.into());
            }

            scoped
                .tx
                .commit()
                .map_err(|e| RepositoryError::storage("commit", e.to_string()))?;
            Ok(value)
        })
        .await
        .map_err(|e| RepositoryError::storage("transaction", e.to_string()))?;

        guard.disarm();
        result
    }
}

/// A live `BEGIN IMMEDIATE` transaction. Dropping it without commit rolls back.
struct SqliteTransaction<'c> {
    tx: rusqlite::Transaction<'c>,
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        team_name: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn parse_status(value: &str) -> Result<PullRequestStatus, RepositoryError> {
    PullRequestStatus::parse(value)
        .ok_or_else(|| RepositoryError::corruption(format!("pull request status '{}'", value)))
}

impl SqliteTransaction<'_> {
    fn load_members(
        &self,
        team_name: &str,
        active_only: bool,
    ) -> Result<Vec<User>, RepositoryError> {
        let sql = if active_only {
            "SELECT id, username, team_name, is_active FROM users
             WHERE team_name = ?1 AND is_active = 1 ORDER BY id"
        } else {
            "SELECT id, username, team_name, is_active FROM users
             WHERE team_name = ?1 ORDER BY id"
        };

        let mut stmt = self
            .tx
            .prepare(sql)
            .map_err(|e| RepositoryError::storage("load_members", e.to_string()))?;
        let rows = stmt
            .query_map(params![team_name], read_user)
            .map_err(|e| RepositoryError::storage("load_members", e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| RepositoryError::storage("load_members", e.to_string()))
    }

    fn load_reviewers(&self, id: &PullRequestId) -> Result<Vec<UserId>, RepositoryError> {
        let mut stmt = self
            .tx
            .prepare(
                "SELECT reviewer_id FROM pull_request_reviewers
                 WHERE pull_request_id = ?1 ORDER BY reviewer_id",
            )
            .map_err(|e| RepositoryError::storage("load_reviewers", e.to_string()))?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
            .map_err(|e| RepositoryError::storage("load_reviewers", e.to_string()))?;

        rows.map(|r| r.map(UserId))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| RepositoryError::storage("load_reviewers", e.to_string()))
    }

    fn pull_request_exists(&self, id: &PullRequestId) -> Result<bool, RepositoryError> {
        self.tx
            .query_row(
                "SELECT 1 FROM pull_requests WHERE id = ?1",
                params![id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| RepositoryError::storage("pull_request_exists", e.to_string()))
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn team_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        self.tx
            .query_row("SELECT 1 FROM teams WHERE name = ?1", params![name], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| RepositoryError::storage("team_exists", e.to_string()))
    }

    fn upsert_team(&mut self, team: &Team) -> Result<Team, RepositoryError> {
        self.tx
            .execute(
                "INSERT INTO teams (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![team.name],
            )
            .map_err(|e| RepositoryError::storage("upsert_team", e.to_string()))?;

        let mut members = Vec::with_capacity(team.members.len());
        for member in &team.members {
            let stored = self
                .tx
                .query_row(
                    "INSERT INTO users (id, username, team_name, is_active)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                         username = excluded.username,
                         team_name = excluded.team_name,
                         is_active = excluded.is_active
                     RETURNING id, username, team_name, is_active",
                    params![member.id.as_str(), member.username, team.name, member.is_active],
                    read_user,
                )
                .map_err(|e| RepositoryError::storage("upsert_team member", e.to_string()))?;
            members.push(stored);
        }

        Ok(Team::new(team.name.clone(), members))
    }

    fn get_team(&self, name: &str) -> Result<Option<Team>, RepositoryError> {
        if !self.team_exists(name)? {
            return Ok(None);
        }
        let members = self.load_members(name, false)?;
        Ok(Some(Team::new(name, members)))
    }

    fn get_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.tx
            .query_row(
                "SELECT id, username, team_name, is_active FROM users WHERE id = ?1",
                params![id.as_str()],
                read_user,
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get_user", e.to_string()))
    }

    fn set_active(
        &mut self,
        id: &UserId,
        is_active: bool,
    ) -> Result<Option<User>, RepositoryError> {
        self.tx
            .query_row(
                "UPDATE users SET is_active = ?2 WHERE id = ?1
                 RETURNING id, username, team_name, is_active",
                params![id.as_str(), is_active],
                read_user,
            )
            .optional()
            .map_err(|e| RepositoryError::storage("set_active", e.to_string()))
    }

    fn list_active_members(&self, team_name: &str) -> Result<Vec<User>, RepositoryError> {
        self.load_members(team_name, true)
    }

    fn get_pull_request(&self, id: &PullRequestId) -> Result<Option<PullRequest>, RepositoryError> {
        let row: Option<(String, String, String, DateTime<Utc>, Option<DateTime<Utc>>)> = self
            .tx
            .query_row(
                "SELECT name, author_id, status, created_at, merged_at
                 FROM pull_requests WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get_pull_request", e.to_string()))?;

        let Some((name, author_id, status, created_at, merged_at)) = row else {
            return Ok(None);
        };

        Ok(Some(PullRequest {
            id: id.clone(),
            name,
            author_id: UserId(author_id),
            status: parse_status(&status)?,
            assigned_reviewers: self.load_reviewers(id)?.into_iter().collect(),
            created_at,
            merged_at,
        }))
    }

    fn create_pull_request(&mut self, pr: &PullRequest) -> Result<PullRequest, RepositoryError> {
        self.tx
            .execute(
                "INSERT INTO pull_requests (id, name, author_id, status, created_at, merged_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pr.id.as_str(),
                    pr.name,
                    pr.author_id.as_str(),
                    pr.status.as_str(),
                    pr.created_at,
                    pr.merged_at
                ],
            )
            .map_err(|e| RepositoryError::storage("create_pull_request", e.to_string()))?;

        for reviewer in pr.reviewers() {
            self.tx
                .execute(
                    "INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id)
                     VALUES (?1, ?2)",
                    params![pr.id.as_str(), reviewer.as_str()],
                )
                .map_err(|e| {
                    RepositoryError::storage("create_pull_request reviewer", e.to_string())
                })?;
        }

        self.get_pull_request(&pr.id)?
            .ok_or_else(|| {
                RepositoryError::storage("create_pull_request", "row vanished after insert")
            })
    }

    fn merge_pull_request(
        &mut self,
        id: &PullRequestId,
        merged_at: DateTime<Utc>,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        // Only an open row transitions, so a repeat merge keeps the first timestamp.
        self.tx
            .execute(
                "UPDATE pull_requests SET status = 'MERGED', merged_at = ?2
                 WHERE id = ?1 AND status = 'OPEN'",
                params![id.as_str(), merged_at],
            )
            .map_err(|e| RepositoryError::storage("merge_pull_request", e.to_string()))?;

        self.get_pull_request(id)
    }

    fn reassign_reviewer(
        &mut self,
        id: &PullRequestId,
        old_reviewer: &UserId,
        new_reviewer: &UserId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        if !self.pull_request_exists(id)? {
            return Ok(None);
        }

        self.tx
            .execute(
                "DELETE FROM pull_request_reviewers
                 WHERE pull_request_id = ?1 AND reviewer_id = ?2",
                params![id.as_str(), old_reviewer.as_str()],
            )
            .map_err(|e| RepositoryError::storage("reassign_reviewer remove", e.to_string()))?;

        self.tx
            .execute(
                "INSERT INTO pull_request_reviewers (pull_request_id, reviewer_id)
                 VALUES (?1, ?2)
                 ON CONFLICT DO NOTHING",
                params![id.as_str(), new_reviewer.as_str()],
            )
            .map_err(|e| RepositoryError::storage("reassign_reviewer add", e.to_string()))?;

        self.get_pull_request(id)
    }

    fn list_by_reviewer(
        &self,
        reviewer: &UserId,
    ) -> Result<Vec<PullRequestShort>, RepositoryError> {
        let mut stmt = self
            .tx
            .prepare(
                "SELECT pr.id, pr.name, pr.author_id, pr.status
                 FROM pull_requests pr
                 JOIN pull_request_reviewers r ON r.pull_request_id = pr.id
                 WHERE r.reviewer_id = ?1
                 ORDER BY pr.created_at DESC, pr.id ASC",
            )
            .map_err(|e| RepositoryError::storage("list_by_reviewer", e.to_string()))?;

        let rows = stmt
            .query_map(params![reviewer.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| RepositoryError::storage("list_by_reviewer", e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let (id, name, author_id, status) =
                row.map_err(|e| RepositoryError::storage("list_by_reviewer", e.to_string()))?;
            results.push(PullRequestShort {
                id: PullRequestId(id),
                name,
                author_id: UserId(author_id),
                status: parse_status(&status)?,
            });
        }
        Ok(results)
    }
}
