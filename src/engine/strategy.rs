//! Concurrency strategy
//!
//! Sequential and parallel case execution behind one entry point.

#![allow(dead_code)]

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::models::{ExecutionStatus, TestCase, TestResult};
use crate::store::ResultStore;

use super::cancel::CancelToken;
use super::runner::CaseRunner;

/// How a batch of cases is scheduled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

impl ExecutionMode {
    pub fn for_parallel(parallel: bool) -> Self {
        if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

/// What a batch produced
#[derive(Debug, Default)]
pub struct StrategyOutcome {
    pub results: Vec<TestResult>,
    /// Infrastructure problems, e.g. persistence failures
    pub errors: Vec<String>,
}

/// Runs a batch of cases sequentially or fanned out
///
/// In parallel mode workers only execute and send; the receiving side is
/// the single writer that persists and accumulates results.
pub struct CaseStrategy {
    runner: CaseRunner,
    store: Arc<dyn ResultStore>,
    max_concurrent: usize,
}

impl CaseStrategy {
    pub fn new(runner: CaseRunner, store: Arc<dyn ResultStore>, max_concurrent: usize) -> Self {
        Self {
            runner,
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Execute `cases` under the chosen mode
    ///
    /// `deadline` caps every case's timeout with the time left on the
    /// whole batch. `observe` sees each result right after it is
    /// persisted, in completion order.
    pub async fn run(
        &self,
        execution_id: &str,
        cases: &[TestCase],
        mode: ExecutionMode,
        deadline: Option<Instant>,
        cancel: &CancelToken,
        observe: impl FnMut(&TestResult),
    ) -> StrategyOutcome {
        match mode {
            ExecutionMode::Sequential => {
                self.run_sequential(execution_id, cases, deadline, cancel, observe)
                    .await
            }
            ExecutionMode::Parallel => {
                self.run_parallel(execution_id, cases, deadline, cancel, observe)
                    .await
            }
        }
    }

    async fn run_sequential(
        &self,
        execution_id: &str,
        cases: &[TestCase],
        deadline: Option<Instant>,
        cancel: &CancelToken,
        mut observe: impl FnMut(&TestResult),
    ) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::default();

        for case in cases {
            if cancel.is_triggered() {
                debug!("cancellation observed before case {}", case.id);
                break;
            }

            let result = self
                .runner
                .run(execution_id, case, remaining(deadline))
                .await;
            self.persist(&mut outcome.errors, &result).await;
            observe(&result);
            outcome.results.push(result);
        }

        outcome
    }

    async fn run_parallel(
        &self,
        execution_id: &str,
        cases: &[TestCase],
        deadline: Option<Instant>,
        cancel: &CancelToken,
        mut observe: impl FnMut(&TestResult),
    ) -> StrategyOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::unbounded_channel::<TestResult>();

        let mut handles = Vec::new();
        for case in cases.iter().cloned() {
            let semaphore = semaphore.clone();
            let runner = self.runner.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            let execution_id = execution_id.to_string();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.unwrap();
                if cancel.is_triggered() {
                    debug!("cancellation observed, skipping case {}", case.id);
                    return;
                }
                let result = runner.run(&execution_id, &case, remaining(deadline)).await;
                // receiver gone means the batch was dropped; nothing to do
                let _ = tx.send(result);
            });
            handles.push(handle);
        }
        drop(tx);

        // fan-in: this loop is the only writer to the outcome
        let mut outcome = StrategyOutcome::default();
        while let Some(result) = rx.recv().await {
            self.persist(&mut outcome.errors, &result).await;
            observe(&result);
            outcome.results.push(result);
        }

        for handle in join_all(handles).await {
            if let Err(e) = handle {
                warn!("case task panicked: {}", e);
                outcome.errors.push(format!("case task panicked: {e}"));
            }
        }

        outcome
    }

    /// Best-effort persistence; failures are recorded, never fatal
    async fn persist(&self, errors: &mut Vec<String>, result: &TestResult) {
        if let Err(e) = self.store.store_result(result).await {
            warn!(
                "failed to persist result for case {}: {}",
                result.case_id, e
            );
            errors.push(format!(
                "failed to persist result for case {}: {e}",
                result.case_id
            ));
        }
    }
}

/// Time left before `deadline`, zero once it has passed
fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|d| d.saturating_duration_since(Instant::now()))
}

/// Terminal status for a finished batch
///
/// Any failure wins; a full result set completes; anything short of the
/// case count is partial.
pub fn derive_status(results: &[TestResult], case_count: usize) -> ExecutionStatus {
    if results.iter().any(|r| !r.is_success()) {
        ExecutionStatus::Failed
    } else if results.len() == case_count {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseStatus, ExecutionRecord};
    use crate::store::MemoryResultStore;
    use anyhow::bail;

    struct FailingResultStore;

    #[async_trait::async_trait]
    impl ResultStore for FailingResultStore {
        async fn store_execution(&self, _record: &ExecutionRecord) -> anyhow::Result<()> {
            bail!("store offline")
        }

        async fn store_result(&self, _result: &TestResult) -> anyhow::Result<()> {
            bail!("store offline")
        }

        async fn update_execution_status(
            &self,
            _execution_id: &str,
            _status: ExecutionStatus,
            _error: Option<&str>,
        ) -> anyhow::Result<()> {
            bail!("store offline")
        }
    }

    fn cases(ids: &[&str]) -> Vec<TestCase> {
        ids.iter()
            .map(|id| TestCase::new(*id, *id, "true"))
            .collect()
    }

    fn strategy(store: Arc<dyn ResultStore>, max_concurrent: usize) -> CaseStrategy {
        CaseStrategy::new(CaseRunner::new(10), store, max_concurrent)
    }

    #[tokio::test]
    async fn test_sequential_runs_in_declaration_order() {
        let store = Arc::new(MemoryResultStore::new());
        let strategy = strategy(store.clone(), 1);
        let batch = cases(&["tc-1", "tc-2", "tc-3"]);

        let mut seen = Vec::new();
        let outcome = strategy
            .run(
                "ex-1",
                &batch,
                ExecutionMode::Sequential,
                None,
                &CancelToken::new(),
                |r| seen.push(r.case_id.clone()),
            )
            .await;

        assert_eq!(seen, vec!["tc-1", "tc-2", "tc-3"]);
        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.result_count("ex-1"), 3);
        assert_eq!(
            derive_status(&outcome.results, batch.len()),
            ExecutionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_parallel_completes_all_cases() {
        let store = Arc::new(MemoryResultStore::new());
        let strategy = strategy(store.clone(), 2);
        let batch = cases(&["tc-1", "tc-2", "tc-3", "tc-4"]);

        let outcome = strategy
            .run(
                "ex-1",
                &batch,
                ExecutionMode::Parallel,
                None,
                &CancelToken::new(),
                |_| {},
            )
            .await;

        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.results.iter().all(|r| r.is_success()));
        assert_eq!(store.result_count("ex-1"), 4);
    }

    #[tokio::test]
    async fn test_sequential_stops_after_cancellation() {
        let store = Arc::new(MemoryResultStore::new());
        let strategy = strategy(store.clone(), 1);
        let batch = cases(&["tc-1", "tc-2", "tc-3"]);

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let outcome = strategy
            .run(
                "ex-1",
                &batch,
                ExecutionMode::Sequential,
                None,
                &cancel,
                |_| trigger.trigger(),
            )
            .await;

        // the flag flips after the first result, so exactly one case ran
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].case_id, "tc-1");
        assert_eq!(store.result_count("ex-1"), 1);
    }

    #[tokio::test]
    async fn test_parallel_skips_everything_when_already_cancelled() {
        let store = Arc::new(MemoryResultStore::new());
        let strategy = strategy(store.clone(), 3);
        let batch = cases(&["tc-1", "tc-2", "tc-3"]);

        let cancel = CancelToken::new();
        cancel.trigger();

        let outcome = strategy
            .run("ex-1", &batch, ExecutionMode::Parallel, None, &cancel, |_| {})
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(store.result_count("ex-1"), 0);
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_cases_without_running_them() {
        let store = Arc::new(MemoryResultStore::new());
        let strategy = strategy(store.clone(), 1);
        let batch = cases(&["tc-1", "tc-2"]);

        let outcome = strategy
            .run(
                "ex-1",
                &batch,
                ExecutionMode::Sequential,
                Some(Instant::now()),
                &CancelToken::new(),
                |_| {},
            )
            .await;

        assert_eq!(outcome.results.len(), 2);
        for result in &outcome.results {
            assert_eq!(result.status, CaseStatus::Failed);
            assert!(result.error.as_deref().unwrap().contains("timed out"));
        }
    }

    #[tokio::test]
    async fn test_persistence_failures_do_not_change_results() {
        let strategy = strategy(Arc::new(FailingResultStore), 1);
        let batch = cases(&["tc-1", "tc-2"]);

        let outcome = strategy
            .run(
                "ex-1",
                &batch,
                ExecutionMode::Sequential,
                None,
                &CancelToken::new(),
                |_| {},
            )
            .await;

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.is_success()));
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("store offline"));
    }

    #[test]
    fn test_derive_status() {
        let passed = TestResult::passed("ex", "tc-1", "a", chrono::Utc::now(), 1);
        let failed = TestResult::failed("ex", "tc-2", "b", chrono::Utc::now(), 1, "boom");

        assert_eq!(derive_status(&[], 0), ExecutionStatus::Completed);
        assert_eq!(
            derive_status(&[passed.clone()], 1),
            ExecutionStatus::Completed
        );
        assert_eq!(derive_status(&[passed.clone()], 2), ExecutionStatus::Partial);
        assert_eq!(
            derive_status(&[passed.clone(), failed.clone()], 2),
            ExecutionStatus::Failed
        );
        // a failure outranks missing results
        assert_eq!(derive_status(&[failed], 3), ExecutionStatus::Failed);
    }
}
