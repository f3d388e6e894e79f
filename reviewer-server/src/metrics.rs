//! Observability sink for pull request lifecycle events.
//!
//! Services receive an `Arc<dyn MetricsSink>` at construction; there is no
//! process-wide registry. `ReviewCounters` is the in-process implementation
//! whose snapshot is served at `/metrics`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reviewer_core::{ErrorCode, PullRequest, ReviewError, UserId};
use serde::Serialize;

/// Result label for one reassignment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignOutcome {
    Success,
    NotFound,
    PrMerged,
    NotAssigned,
    NoCandidate,
    InternalError,
}

impl ReassignOutcome {
    pub const ALL: [ReassignOutcome; 6] = [
        ReassignOutcome::Success,
        ReassignOutcome::NotFound,
        ReassignOutcome::PrMerged,
        ReassignOutcome::NotAssigned,
        ReassignOutcome::NoCandidate,
        ReassignOutcome::InternalError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReassignOutcome::Success => "success",
            ReassignOutcome::NotFound => "not_found",
            ReassignOutcome::PrMerged => "pr_merged",
            ReassignOutcome::NotAssigned => "not_assigned",
            ReassignOutcome::NoCandidate => "no_candidate",
            ReassignOutcome::InternalError => "internal_error",
        }
    }

    pub fn from_error(error: &ReviewError) -> Self {
        match error.code() {
            ErrorCode::NotFound => ReassignOutcome::NotFound,
            ErrorCode::PrMerged => ReassignOutcome::PrMerged,
            ErrorCode::NotAssigned => ReassignOutcome::NotAssigned,
            ErrorCode::NoCandidate => ReassignOutcome::NoCandidate,
            ErrorCode::TeamExists | ErrorCode::PrExists | ErrorCode::Internal => {
                ReassignOutcome::InternalError
            }
        }
    }

    pub fn from_result(result: &Result<(PullRequest, UserId), ReviewError>) -> Self {
        match result {
            Ok(_) => ReassignOutcome::Success,
            Err(e) => Self::from_error(e),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Receiver of lifecycle events.
pub trait MetricsSink: Send + Sync {
    fn pull_request_created(&self);

    /// Only called on the call that actually transitions to merged.
    fn pull_request_merged(&self);

    /// Called once per reassignment attempt, whatever the result.
    fn reassignment(&self, outcome: ReassignOutcome);

    fn http_request(&self, _method: &str, _route: &str, _status: u16, _elapsed: Duration) {}
}

/// Upper bounds, in seconds, of the request latency buckets.
pub const LATENCY_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Count and latency distribution for one (method, route, status).
#[derive(Debug, Default)]
struct RequestStats {
    count: u64,
    total_seconds: f64,
    /// Non-cumulative; slot `i` counts requests in `(bound[i-1], bound[i]]`.
    buckets: [u64; LATENCY_BUCKETS.len()],
}

impl RequestStats {
    fn observe(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        self.count += 1;
        self.total_seconds += seconds;
        if let Some(slot) = LATENCY_BUCKETS.iter().position(|bound| seconds <= *bound) {
            self.buckets[slot] += 1;
        }
    }

    fn cumulative_buckets(&self) -> Vec<LatencyBucket> {
        let mut running = 0;
        LATENCY_BUCKETS
            .iter()
            .zip(self.buckets.iter())
            .map(|(bound, hits)| {
                running += hits;
                LatencyBucket {
                    le: *bound,
                    count: running,
                }
            })
            .collect()
    }
}

/// In-process counters.
#[derive(Debug, Default)]
pub struct ReviewCounters {
    created: AtomicU64,
    merged: AtomicU64,
    reassignments: [AtomicU64; 6],
    http: Mutex<BTreeMap<(String, String, u16), RequestStats>>,
}

impl ReviewCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let reassignments = ReassignOutcome::ALL
            .iter()
            .map(|o| (*o, self.reassignments[o.index()].load(Ordering::Relaxed)))
            .collect();

        let http = self.http.lock().unwrap_or_else(PoisonError::into_inner);
        let http_requests = http
            .iter()
            .map(|((method, route, status), stats)| HttpRequestCount {
                method: method.clone(),
                route: route.clone(),
                status: *status,
                count: stats.count,
                duration_seconds_sum: stats.total_seconds,
                duration_seconds_buckets: stats.cumulative_buckets(),
            })
            .collect();

        MetricsSnapshot {
            pull_requests_created: self.created.load(Ordering::Relaxed),
            pull_requests_merged: self.merged.load(Ordering::Relaxed),
            reassignments,
            http_requests,
        }
    }
}

impl MetricsSink for ReviewCounters {
    fn pull_request_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn pull_request_merged(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    fn reassignment(&self, outcome: ReassignOutcome) {
        self.reassignments[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn http_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let mut http = self.http.lock().unwrap_or_else(PoisonError::into_inner);
        http.entry((method.to_string(), route.to_string(), status))
            .or_default()
            .observe(elapsed);
    }
}

/// Point-in-time view of all counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub pull_requests_created: u64,
    pub pull_requests_merged: u64,
    pub reassignments: BTreeMap<ReassignOutcome, u64>,
    pub http_requests: Vec<HttpRequestCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpRequestCount {
    pub method: String,
    pub route: String,
    pub status: u16,
    pub count: u64,
    pub duration_seconds_sum: f64,
    /// Cumulative: each bucket counts requests at or below `le` seconds.
    pub duration_seconds_buckets: Vec<LatencyBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyBucket {
    pub le: f64,
    pub count: u64,
}
