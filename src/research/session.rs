//! Per-process bookkeeping around runs: query numbering, the archive of
//! finished runs and the cancellation tokens of runs still in flight.

use crate::research::model::{Query, QueryId, RunState, WorkflowRun};
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

/// Hands out query ids, starting at 1.
#[derive(Debug, Default)]
pub struct Session {
    counter: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_query(&self, text: impl Into<String>) -> Query {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Query::new(QueryId(id), text)
    }

    /// Number of queries issued so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Listing entry for an archived run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub query_id: u64,
    pub query: String,
    pub state: RunState,
    pub task_count: usize,
    pub citation_count: usize,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowRun> for RunSummary {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            run_id: run.run_id,
            query_id: run.query.id().0,
            query: run.query.text().to_string(),
            state: run.state,
            task_count: run.tasks.len(),
            citation_count: run.report.as_ref().map(|r| r.citations().len()).unwrap_or(0),
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

/// Bounded store of finished runs; the least recently stored run is evicted.
pub struct RunArchive {
    runs: Mutex<LruCache<Uuid, WorkflowRun>>,
}

impl RunArchive {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            runs: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn insert(&self, run: WorkflowRun) {
        self.runs.lock().put(run.run_id, run);
    }

    /// Lookups do not refresh recency.
    pub fn get(&self, run_id: &Uuid) -> Option<WorkflowRun> {
        self.runs.lock().peek(run_id).cloned()
    }

    /// Most recently stored first.
    pub fn list(&self) -> Vec<RunSummary> {
        self.runs.lock().iter().map(|(_, run)| RunSummary::from(run)).collect()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cancellation tokens of runs that have not finished yet.
#[derive(Default)]
pub struct ActiveRuns {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run_id: Uuid, token: CancellationToken) {
        self.tokens.lock().insert(run_id, token);
    }

    /// Cancel a run in flight. Returns `false` if it is unknown or already finished.
    pub fn cancel(&self, run_id: &Uuid) -> bool {
        match self.tokens.lock().get(run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, run_id: &Uuid) {
        self.tokens.lock().remove(run_id);
    }

    pub fn contains(&self, run_id: &Uuid) -> bool {
        self.tokens.lock().contains_key(run_id)
    }

    /// Ids of the runs in flight, in no particular order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.tokens.lock().keys().copied().collect()
    }

    /// Signal every run in flight to stop. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_ids_increment_from_one() {
        let session = Session::new();
        assert_eq!(session.next_query("a").id(), QueryId(1));
        assert_eq!(session.next_query("b").id(), QueryId(2));
        assert_eq!(session.issued(), 2);
    }

    #[test]
    fn test_archive_evicts_oldest_and_lists_newest_first() {
        let session = Session::new();
        let archive = RunArchive::new(2);
        let runs: Vec<_> = ["first", "second", "third"]
            .into_iter()
            .map(|q| WorkflowRun::new(session.next_query(q)))
            .collect();
        let first_id = runs[0].run_id;
        for run in runs {
            archive.insert(run);
        }

        assert_eq!(archive.len(), 2);
        assert!(archive.get(&first_id).is_none());
        let queries: Vec<_> = archive.list().into_iter().map(|s| s.query).collect();
        assert_eq!(queries, vec!["third", "second"]);
    }

    #[test]
    fn test_zero_capacity_archive_keeps_one() {
        let archive = RunArchive::new(0);
        archive.insert(WorkflowRun::new(Session::new().next_query("q")));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_active_runs_cancel() {
        let active = ActiveRuns::new();
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        active.register(id, token.clone());

        assert!(active.cancel(&id));
        assert!(token.is_cancelled());
        active.remove(&id);
        assert!(!active.cancel(&id));
        assert!(!active.contains(&id));
    }

    #[test]
    fn test_active_runs_cancel_all() {
        let active = ActiveRuns::new();
        let tokens: Vec<_> = (0..3)
            .map(|_| {
                let token = CancellationToken::new();
                active.register(Uuid::new_v4(), token.clone());
                token
            })
            .collect();

        assert_eq!(active.ids().len(), 3);
        assert_eq!(active.cancel_all(), 3);
        assert!(tokens.iter().all(|t| t.is_cancelled()));
    }
}
