//! Execution engine
//!
//! Coordinates suite and vault runs: admission through the worker pool,
//! registry tracking, result persistence, and lifecycle operations.

mod cancel;
mod context;
mod pool;
mod registry;
mod runner;
mod strategy;
mod vault;

pub use cancel::CancelToken;
pub use context::{ExecutionContext, VaultExecutionContext};
pub use pool::{WorkerPool, WorkerSlot};
pub use registry::{ExecutionEntry, ExecutionRegistry};
pub use runner::CaseRunner;
pub use strategy::{derive_status, CaseStrategy, ExecutionMode, StrategyOutcome};
pub use vault::VaultRunner;

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{
    ExecutionKind, ExecutionRecord, ExecutionStatus, LaunchReceipt, RunConfig, TestSuite,
    VaultRunConfig,
};
use crate::notify::NotificationSender;
use crate::store::{ResultStore, SuiteStore, VaultStore};

/// Flat per-case estimate used for launch receipts
pub const ESTIMATED_SECS_PER_CASE: u64 = 5;

/// Engine-level errors
///
/// Everything after admission resolves into statuses and results; these
/// only surface for setup problems.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("suite not found: {0}")]
    SuiteNotFound(String),

    #[error("vault not found: {0}")]
    VaultNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Engine tuning knobs
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Worker pool capacity for concurrent executions
    pub max_concurrent_executions: usize,
    /// Case deadline when a case does not set its own
    pub default_case_timeout_secs: u64,
    /// How long finished executions stay visible
    pub retention_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            default_case_timeout_secs: 60,
            retention_secs: 3600,
        }
    }
}

/// Test execution engine
///
/// All collaborators are injected; cloning shares them.
#[derive(Clone)]
pub struct TestEngine {
    config: EngineConfig,
    registry: Arc<ExecutionRegistry>,
    pool: Arc<WorkerPool>,
    suites: Arc<dyn SuiteStore>,
    vaults: Arc<dyn VaultStore>,
    results: Arc<dyn ResultStore>,
    notifier: Arc<dyn NotificationSender>,
}

impl TestEngine {
    pub fn new(
        config: EngineConfig,
        suites: Arc<dyn SuiteStore>,
        vaults: Arc<dyn VaultStore>,
        results: Arc<dyn ResultStore>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let pool = Arc::new(WorkerPool::new(config.max_concurrent_executions));
        Self {
            config,
            registry: Arc::new(ExecutionRegistry::new()),
            pool,
            suites,
            vaults,
            results,
            notifier,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Submit a suite for execution
    ///
    /// Returns as soon as the execution is admitted; the run itself
    /// proceeds on a detached task and is tracked through the registry.
    pub async fn execute_suite(
        &self,
        suite_id: &str,
        config: RunConfig,
    ) -> Result<LaunchReceipt, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let suite = self
            .suites
            .get_suite(suite_id)
            .await?
            .ok_or_else(|| EngineError::SuiteNotFound(suite_id.to_string()))?;

        let execution_id = uuid::Uuid::new_v4().to_string();
        let ctx = context::ExecutionContext::new(&execution_id, &suite, config.notification.clone());
        self.registry.register_suite(ctx);

        let record = ExecutionRecord::queued(
            &execution_id,
            ExecutionKind::Suite,
            &suite.id,
            &suite.name,
            suite.case_count(),
        );
        if let Err(e) = self.results.store_execution(&record).await {
            warn!("failed to record execution {}: {}", execution_id, e);
            self.registry.with_suite(&execution_id, |ctx| {
                ctx.errors.push(format!("failed to record execution: {e}"));
            });
        }

        info!(
            "suite {} submitted as execution {} ({} cases)",
            suite.id,
            execution_id,
            suite.case_count()
        );

        let test_count = suite.case_count();
        let tracking = format!("executions/{execution_id}");

        let engine = self.clone();
        let run_id = execution_id.clone();
        tokio::spawn(async move {
            engine.run_suite_task(run_id, suite, config).await;
        });

        Ok(LaunchReceipt {
            execution_id,
            status: "started".to_string(),
            estimated_duration_secs: ESTIMATED_SECS_PER_CASE * test_count as u64,
            test_count,
            tracking,
        })
    }

    /// Body of a detached suite run
    async fn run_suite_task(&self, execution_id: String, suite: TestSuite, config: RunConfig) {
        // admission gate: the run queues here until a slot frees up
        let _slot = self.pool.acquire().await;

        let Some(entry) = self.registry.snapshot(&execution_id) else {
            warn!("execution {} vanished before it could start", execution_id);
            return;
        };
        let cancel = entry.cancel_token();

        if cancel.is_triggered() {
            info!("execution {} cancelled while queued", execution_id);
            self.finalize_suite(&execution_id).await;
            return;
        }

        self.registry.set_status(&execution_id, ExecutionStatus::Running);
        if let Err(e) = self
            .results
            .update_execution_status(&execution_id, ExecutionStatus::Running, None)
            .await
        {
            warn!("failed to mark execution {} running: {}", execution_id, e);
        }

        let strategy = CaseStrategy::new(
            CaseRunner::new(self.config.default_case_timeout_secs),
            self.results.clone(),
            config.max_concurrent,
        );
        let deadline = config
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        let registry = self.registry.clone();
        let observe_id = execution_id.clone();
        let outcome = strategy
            .run(
                &execution_id,
                &suite.cases,
                ExecutionMode::for_parallel(config.parallel),
                deadline,
                &cancel,
                |result| {
                    let result = result.clone();
                    registry.with_suite(&observe_id, |ctx| ctx.results.push(result));
                },
            )
            .await;

        if !outcome.errors.is_empty() {
            self.registry.with_suite(&execution_id, |ctx| {
                ctx.errors.extend(outcome.errors.iter().cloned());
            });
        }

        let status = if cancel.is_triggered() && outcome.results.len() < suite.cases.len() {
            ExecutionStatus::Cancelled
        } else {
            derive_status(&outcome.results, suite.cases.len())
        };
        // guarded: an earlier cancellation keeps its word
        self.registry.set_status(&execution_id, status);

        self.finalize_suite(&execution_id).await;
    }

    /// Persist the final status and deliver at most one notification
    async fn finalize_suite(&self, execution_id: &str) {
        let Some(entry) = self.registry.snapshot(execution_id) else {
            return;
        };
        let Some(ctx) = entry.as_suite() else {
            return;
        };

        let status = ctx.status;
        let error = match status {
            ExecutionStatus::Failed => Some(format!(
                "{} of {} cases failed",
                ctx.failed_count(),
                ctx.case_count()
            )),
            ExecutionStatus::Cancelled => Some("execution cancelled".to_string()),
            ExecutionStatus::Partial => Some(format!(
                "{} of {} cases did not report a result",
                ctx.case_count() - ctx.results.len(),
                ctx.case_count()
            )),
            _ => None,
        };

        if let Err(e) = self
            .results
            .update_execution_status(execution_id, status, error.as_deref())
            .await
        {
            warn!("failed to persist final status for {}: {}", execution_id, e);
            self.registry.with_suite(execution_id, |ctx| {
                ctx.errors.push(format!("failed to persist final status: {e}"));
            });
        }

        info!(
            "execution {} finished: {} ({} passed, {} failed)",
            execution_id,
            status,
            ctx.passed_count(),
            ctx.failed_count()
        );

        if let Some(prefs) = ctx.notification.clone() {
            if prefs.should_notify(status) {
                let summary = ctx.summary();
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier.send(&prefs, &summary).await {
                        warn!(
                            "notification for execution {} failed: {}",
                            summary.execution_id, e
                        );
                    }
                });
            }
        }
    }

    /// Run a vault to completion
    ///
    /// Vault runs are synchronous: the call returns the final context.
    /// Progress is still visible through the registry while it runs.
    pub async fn execute_vault(
        &self,
        vault_id: &str,
        config: VaultRunConfig,
    ) -> Result<VaultExecutionContext, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let vault = self
            .vaults
            .get_vault(vault_id)
            .await?
            .ok_or_else(|| EngineError::VaultNotFound(vault_id.to_string()))?;

        let execution_id = uuid::Uuid::new_v4().to_string();
        let ctx = context::VaultExecutionContext::new(&execution_id, &vault);
        self.registry.register_vault(ctx.clone());

        let record = ExecutionRecord::queued(
            &execution_id,
            ExecutionKind::Vault,
            &vault.id,
            &vault.name,
            vault.case_count(),
        );
        if let Err(e) = self.results.store_execution(&record).await {
            warn!("failed to record execution {}: {}", execution_id, e);
        }

        info!(
            "vault {} submitted as execution {} ({} phases)",
            vault.id,
            execution_id,
            vault.phases.len()
        );

        // vault runs occupy an execution slot like suite runs do
        let _slot = self.pool.acquire().await;

        self.registry.set_status(&execution_id, ExecutionStatus::Running);
        if let Err(e) = self
            .results
            .update_execution_status(&execution_id, ExecutionStatus::Running, None)
            .await
        {
            warn!("failed to mark execution {} running: {}", execution_id, e);
        }

        let runner = VaultRunner::new(
            CaseRunner::new(self.config.default_case_timeout_secs),
            self.results.clone(),
            self.registry.clone(),
        );
        let final_ctx = runner.execute(ctx, &vault).await;

        let error = match final_ctx.status {
            ExecutionStatus::Failed => Some(format!(
                "{} of {} phases failed",
                final_ctx.failed_phases.len(),
                final_ctx.phases.len()
            )),
            ExecutionStatus::Cancelled => Some("execution cancelled".to_string()),
            ExecutionStatus::Partial => Some("pipeline did not run to completion".to_string()),
            _ => None,
        };
        if let Err(e) = self
            .results
            .update_execution_status(&execution_id, final_ctx.status, error.as_deref())
            .await
        {
            warn!("failed to persist final status for {}: {}", execution_id, e);
        }

        if let Some(prefs) = config.notification {
            if prefs.should_notify(final_ctx.status) {
                let summary = final_ctx.summary();
                let notifier = self.notifier.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier.send(&prefs, &summary).await {
                        warn!(
                            "notification for execution {} failed: {}",
                            summary.execution_id, e
                        );
                    }
                });
            }
        }

        Ok(final_ctx)
    }

    /// Snapshot of one execution's live state
    pub fn execution_status(&self, execution_id: &str) -> Result<ExecutionEntry, EngineError> {
        self.registry
            .snapshot(execution_id)
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))
    }

    /// Request cancellation
    ///
    /// Succeeds for any known execution, including ones that already
    /// finished; those are left as they are.
    pub fn cancel_execution(&self, execution_id: &str) -> Result<(), EngineError> {
        if self.registry.cancel(execution_id) {
            info!("cancellation requested for execution {}", execution_id);
            Ok(())
        } else {
            Err(EngineError::ExecutionNotFound(execution_id.to_string()))
        }
    }

    /// Evict finished executions past the retention window
    pub fn cleanup(&self) -> usize {
        self.registry.evict_finished(self.config.retention_secs)
    }
}

/// Periodic registry sweep
pub async fn run_cleanup_loop(engine: TestEngine, period: Duration) {
    info!("cleanup loop started (every {:?})", period);

    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        let evicted = engine.cleanup();
        if evicted > 0 {
            info!("evicted {} finished executions", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExecutionSummary, NotificationPrefs, PhaseConfig, TestCase, TestSuite, Vault,
    };
    use crate::store::{MemoryResultStore, MemorySuiteStore, MemoryVaultStore};
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<ExecutionSummary>>,
    }

    impl RecordingNotifier {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        fn last(&self) -> Option<ExecutionSummary> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    #[async_trait::async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send(
            &self,
            _prefs: &NotificationPrefs,
            summary: &ExecutionSummary,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    struct FailingResultStore;

    #[async_trait::async_trait]
    impl ResultStore for FailingResultStore {
        async fn store_execution(&self, _record: &ExecutionRecord) -> anyhow::Result<()> {
            bail!("store offline")
        }

        async fn store_result(&self, _result: &crate::models::TestResult) -> anyhow::Result<()> {
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

    struct Fixture {
        engine: TestEngine,
        suites: Arc<MemorySuiteStore>,
        vaults: Arc<MemoryVaultStore>,
        results: Arc<MemoryResultStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture_with(config: EngineConfig) -> Fixture {
        let suites = Arc::new(MemorySuiteStore::new());
        let vaults = Arc::new(MemoryVaultStore::new());
        let results = Arc::new(MemoryResultStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = TestEngine::new(
            config,
            suites.clone(),
            vaults.clone(),
            results.clone(),
            notifier.clone(),
        );
        Fixture {
            engine,
            suites,
            vaults,
            results,
            notifier,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(EngineConfig::default())
    }

    fn two_case_suite() -> TestSuite {
        TestSuite::new("s-1", "smoke")
            .with_case(TestCase::new("tc-1", "health", "true"))
            .with_case(TestCase::new("tc-2", "version", "true"))
    }

    async fn wait_terminal(engine: &TestEngine, execution_id: &str) -> ExecutionEntry {
        for _ in 0..300 {
            let entry = engine.execution_status(execution_id).unwrap();
            if entry.status().is_terminal() {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {execution_id} never reached a terminal state");
    }

    #[tokio::test]
    async fn test_submission_returns_receipt_and_completes() {
        let fx = fixture();
        fx.suites.insert(two_case_suite());

        let receipt = fx
            .engine
            .execute_suite("s-1", RunConfig::default())
            .await
            .unwrap();

        assert_eq!(receipt.status, "started");
        assert_eq!(receipt.test_count, 2);
        assert_eq!(receipt.estimated_duration_secs, 10);
        assert_eq!(
            receipt.tracking,
            format!("executions/{}", receipt.execution_id)
        );

        let entry = wait_terminal(&fx.engine, &receipt.execution_id).await;
        assert_eq!(entry.status(), ExecutionStatus::Completed);
        assert_eq!(entry.as_suite().unwrap().results.len(), 2);

        let row = fx.results.execution(&receipt.execution_id).unwrap();
        assert_eq!(row.status, ExecutionStatus::Completed);
        assert!(row.error.is_none());
        assert_eq!(fx.results.result_count(&receipt.execution_id), 2);
    }

    #[tokio::test]
    async fn test_unknown_suite_is_a_setup_error() {
        let fx = fixture();
        let err = fx
            .engine
            .execute_suite("ghost", RunConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SuiteNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_up_front() {
        let fx = fixture();
        fx.suites.insert(two_case_suite());

        let err = fx
            .engine
            .execute_suite("s-1", RunConfig::parallel(0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
        // nothing was admitted
        assert!(fx.engine.registry().is_empty());
    }

    #[tokio::test]
    async fn test_case_failure_yields_failed_execution() {
        let fx = fixture();
        fx.suites.insert(
            TestSuite::new("s-2", "mixed")
                .with_case(TestCase::new("tc-1", "ok", "true"))
                .with_case(TestCase::new("tc-2", "broken", "false")),
        );

        let receipt = fx
            .engine
            .execute_suite("s-2", RunConfig::default())
            .await
            .unwrap();
        let entry = wait_terminal(&fx.engine, &receipt.execution_id).await;

        assert_eq!(entry.status(), ExecutionStatus::Failed);
        let ctx = entry.as_suite().unwrap();
        assert_eq!(ctx.passed_count(), 1);
        assert_eq!(ctx.failed_count(), 1);

        let row = fx.results.execution(&receipt.execution_id).unwrap();
        assert_eq!(row.error.as_deref(), Some("1 of 2 cases failed"));
    }

    #[tokio::test]
    async fn test_empty_suite_completes_immediately() {
        let fx = fixture();
        fx.suites.insert(TestSuite::new("s-3", "empty"));

        let receipt = fx
            .engine
            .execute_suite("s-3", RunConfig::default())
            .await
            .unwrap();
        assert_eq!(receipt.test_count, 0);
        assert_eq!(receipt.estimated_duration_secs, 0);

        let entry = wait_terminal(&fx.engine, &receipt.execution_id).await;
        assert_eq!(entry.status(), ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_parallel_run_completes_all_cases() {
        let fx = fixture();
        fx.suites.insert(
            TestSuite::new("s-4", "wide")
                .with_case(TestCase::new("tc-1", "a", "true"))
                .with_case(TestCase::new("tc-2", "b", "true"))
                .with_case(TestCase::new("tc-3", "c", "true"))
                .with_case(TestCase::new("tc-4", "d", "true")),
        );

        let receipt = fx
            .engine
            .execute_suite("s-4", RunConfig::parallel(2))
            .await
            .unwrap();
        let entry = wait_terminal(&fx.engine, &receipt.execution_id).await;

        assert_eq!(entry.status(), ExecutionStatus::Completed);
        assert_eq!(entry.as_suite().unwrap().results.len(), 4);
        assert_eq!(fx.results.result_count(&receipt.execution_id), 4);
    }

    #[tokio::test]
    async fn test_cancel_stops_a_slow_run() {
        let fx = fixture();
        fx.suites.insert(
            TestSuite::new("s-5", "slow")
                .with_case(TestCase::new("tc-1", "a", "sleep 0.3"))
                .with_case(TestCase::new("tc-2", "b", "sleep 0.3"))
                .with_case(TestCase::new("tc-3", "c", "sleep 0.3")),
        );

        let receipt = fx
            .engine
            .execute_suite("s-5", RunConfig::default())
            .await
            .unwrap();
        fx.engine.cancel_execution(&receipt.execution_id).unwrap();

        let entry = wait_terminal(&fx.engine, &receipt.execution_id).await;
        assert_eq!(entry.status(), ExecutionStatus::Cancelled);
        assert!(entry.as_suite().unwrap().results.len() < 3);

        // cancelling a finished execution stays fine
        fx.engine.cancel_execution(&receipt.execution_id).unwrap();
        let entry = fx.engine.execution_status(&receipt.execution_id).unwrap();
        assert_eq!(entry.status(), ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_unknown_execution() {
        let fx = fixture();
        let err = fx.engine.cancel_execution("ghost").unwrap_err();
        assert!(matches!(err, EngineError::ExecutionNotFound(_)));
    }

    #[tokio::test]
    async fn test_status_unknown_execution() {
        let fx = fixture();
        let err = fx.engine.execution_status("ghost").unwrap_err();
        assert!(matches!(err, EngineError::ExecutionNotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_evicts_and_status_forgets() {
        let fx = fixture_with(EngineConfig {
            retention_secs: 0,
            ..EngineConfig::default()
        });
        fx.suites.insert(two_case_suite());

        let receipt = fx
            .engine
            .execute_suite("s-1", RunConfig::default())
            .await
            .unwrap();
        wait_terminal(&fx.engine, &receipt.execution_id).await;

        assert_eq!(fx.engine.cleanup(), 1);
        let err = fx
            .engine
            .execution_status(&receipt.execution_id)
            .unwrap_err();
        assert!(matches!(err, EngineError::ExecutionNotFound(_)));
    }

    #[tokio::test]
    async fn test_notification_fires_once_on_completion() {
        let fx = fixture();
        fx.suites.insert(two_case_suite());

        let config = RunConfig::default()
            .with_notification(NotificationPrefs::on_completion("http://hook.test/done"));
        let receipt = fx.engine.execute_suite("s-1", config).await.unwrap();
        wait_terminal(&fx.engine, &receipt.execution_id).await;

        // delivery happens on a detached task
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.notifier.count(), 1);
        let summary = fx.notifier.last().unwrap();
        assert_eq!(summary.execution_id, receipt.execution_id);
        assert_eq!(summary.status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_failure_only_prefs_stay_quiet_on_success() {
        let fx = fixture();
        fx.suites.insert(two_case_suite());

        let config = RunConfig::default()
            .with_notification(NotificationPrefs::on_failure("http://hook.test/fail"));
        let receipt = fx.engine.execute_suite("s-1", config).await.unwrap();
        wait_terminal(&fx.engine, &receipt.execution_id).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_failure_only_prefs_fire_on_failure() {
        let fx = fixture();
        fx.suites
            .insert(TestSuite::new("s-6", "red").with_case(TestCase::new("tc-1", "a", "false")));

        let config = RunConfig::default()
            .with_notification(NotificationPrefs::on_failure("http://hook.test/fail"));
        let receipt = fx.engine.execute_suite("s-6", config).await.unwrap();
        wait_terminal(&fx.engine, &receipt.execution_id).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.notifier.count(), 1);
        assert_eq!(
            fx.notifier.last().unwrap().status,
            ExecutionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_store_outage_never_changes_the_outcome() {
        let suites = Arc::new(MemorySuiteStore::new());
        suites.insert(two_case_suite());
        let engine = TestEngine::new(
            EngineConfig::default(),
            suites,
            Arc::new(MemoryVaultStore::new()),
            Arc::new(FailingResultStore),
            Arc::new(RecordingNotifier::default()),
        );

        let receipt = engine
            .execute_suite("s-1", RunConfig::default())
            .await
            .unwrap();
        let entry = wait_terminal(&engine, &receipt.execution_id).await;

        assert_eq!(entry.status(), ExecutionStatus::Completed);
        let ctx = entry.as_suite().unwrap();
        assert_eq!(ctx.results.len(), 2);
        // submission, per-case, and final writes all failed and were recorded
        assert!(ctx.errors.len() >= 3);
        assert!(ctx.errors.iter().all(|e| e.contains("store offline")));
    }

    #[tokio::test]
    async fn test_pool_queues_beyond_capacity() {
        let fx = fixture_with(EngineConfig {
            max_concurrent_executions: 1,
            ..EngineConfig::default()
        });
        fx.suites
            .insert(TestSuite::new("s-a", "slow").with_case(TestCase::new("tc-1", "a", "sleep 0.3")));
        fx.suites
            .insert(TestSuite::new("s-b", "fast").with_case(TestCase::new("tc-1", "a", "true")));

        let first = fx
            .engine
            .execute_suite("s-a", RunConfig::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = fx
            .engine
            .execute_suite("s-b", RunConfig::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the slot is taken, so the second run is still waiting
        assert_eq!(
            fx.engine.execution_status(&second.execution_id).unwrap().status(),
            ExecutionStatus::Queued
        );

        assert_eq!(
            wait_terminal(&fx.engine, &first.execution_id).await.status(),
            ExecutionStatus::Completed
        );
        assert_eq!(
            wait_terminal(&fx.engine, &second.execution_id).await.status(),
            ExecutionStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_vault_end_to_end() {
        let fx = fixture();
        fx.vaults.insert(
            Vault::new("v-1", "gate")
                .with_phase(
                    "smoke",
                    PhaseConfig::new(vec![TestCase::new("tc-1", "ping", "true")]),
                )
                .with_phase(
                    "load",
                    PhaseConfig::new(vec![TestCase::new("tc-2", "ramp", "true")]).parallel(2),
                ),
        );

        let config = VaultRunConfig::default()
            .with_notification(NotificationPrefs::on_completion("http://hook.test/vault"));
        let ctx = fx.engine.execute_vault("v-1", config).await.unwrap();

        assert_eq!(ctx.status, ExecutionStatus::Completed);
        assert_eq!(ctx.completed_phases, vec!["smoke", "load"]);

        let row = fx.results.execution(&ctx.execution_id).unwrap();
        assert_eq!(row.kind, ExecutionKind::Vault);
        assert_eq!(row.status, ExecutionStatus::Completed);

        // the registry tracks vault runs under the same id space
        let entry = fx.engine.execution_status(&ctx.execution_id).unwrap();
        assert!(entry.as_vault().is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fx.notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_vault_is_a_setup_error() {
        let fx = fixture();
        let err = fx
            .engine
            .execute_vault("ghost", VaultRunConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::VaultNotFound(_)));
    }
}
