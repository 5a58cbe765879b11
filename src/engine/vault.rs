//! Vault phase engine
//!
//! Runs a vault's phases strictly in order, short-circuiting on failure
//! when the success criteria forbid critical failures.

#![allow(dead_code)]

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::models::{ExecutionStatus, PhaseConfig, PhaseResult, Vault};
use crate::store::ResultStore;

use super::context::VaultExecutionContext;
use super::registry::ExecutionRegistry;
use super::runner::CaseRunner;
use super::strategy::{derive_status, CaseStrategy, ExecutionMode};

/// Sequential phase state machine over one vault
pub struct VaultRunner {
    runner: CaseRunner,
    store: Arc<dyn ResultStore>,
    registry: Arc<ExecutionRegistry>,
}

impl VaultRunner {
    pub fn new(
        runner: CaseRunner,
        store: Arc<dyn ResultStore>,
        registry: Arc<ExecutionRegistry>,
    ) -> Self {
        Self {
            runner,
            store,
            registry,
        }
    }

    /// Drive every declared phase, in declaration order
    ///
    /// `ctx` must already be registered; its cancellation token is shared
    /// with the registry entry. The registry stays authoritative for the
    /// final status, so a cancellation that raced this run is preserved.
    pub async fn execute(&self, mut ctx: VaultExecutionContext, vault: &Vault) -> VaultExecutionContext {
        let cancel = ctx.cancel.clone();

        for phase_name in vault.phases.clone() {
            if cancel.is_triggered() {
                info!("vault {} cancelled before phase {}", vault.id, phase_name);
                break;
            }

            ctx.current_phase = Some(phase_name.clone());
            self.mirror(&ctx);

            let phase_result = match vault.phase_configs.get(&phase_name) {
                Some(config) => {
                    self.run_phase(&ctx.execution_id, &phase_name, config, &cancel)
                        .await
                }
                None => missing_config_result(&phase_name),
            };

            match phase_result.status {
                ExecutionStatus::Completed => ctx.completed_phases.push(phase_name.clone()),
                ExecutionStatus::Failed => ctx.failed_phases.push(phase_name.clone()),
                _ => {}
            }
            let phase_failed = phase_result.status == ExecutionStatus::Failed;
            let was_executed = vault.phase_configs.contains_key(&phase_name);

            info!("vault {} phase {}", vault.id, phase_result);
            ctx.phase_results.insert(phase_name.clone(), phase_result);
            ctx.current_phase = None;
            self.mirror(&ctx);

            // a missing configuration never aborts the pipeline by itself
            if phase_failed && was_executed && !vault.success_criteria.allow_critical_failures {
                info!(
                    "vault {} stopping after failed phase {} (critical failures not allowed)",
                    vault.id, phase_name
                );
                break;
            }
        }

        let status = self.terminal_status(&ctx, vault, &cancel);
        self.registry.set_status(&ctx.execution_id, status);

        // the registry may hold an earlier cancellation; read the final word back
        match self.registry.snapshot(&ctx.execution_id) {
            Some(entry) => {
                ctx.status = entry.status();
                ctx.completed_at = entry.completed_at();
            }
            None => {
                warn!("vault execution {} missing from registry", ctx.execution_id);
                ctx.status = status;
                ctx.completed_at = Some(Utc::now());
            }
        }
        ctx
    }

    async fn run_phase(
        &self,
        execution_id: &str,
        phase_name: &str,
        config: &PhaseConfig,
        cancel: &super::cancel::CancelToken,
    ) -> PhaseResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = Instant::now() + Duration::from_secs(config.timeout_secs);

        info!(
            "running phase {} ({} cases, {})",
            phase_name,
            config.cases.len(),
            if config.parallel { "parallel" } else { "sequential" }
        );

        let strategy = CaseStrategy::new(
            self.runner.clone(),
            self.store.clone(),
            config.max_concurrent,
        );
        let outcome = strategy
            .run(
                execution_id,
                &config.cases,
                ExecutionMode::for_parallel(config.parallel),
                Some(deadline),
                cancel,
                |_| {},
            )
            .await;

        let status = derive_status(&outcome.results, config.cases.len());
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "passed".to_string(),
            serde_json::json!(outcome.results.iter().filter(|r| r.is_success()).count()),
        );
        metrics.insert(
            "failed".to_string(),
            serde_json::json!(outcome.results.iter().filter(|r| !r.is_success()).count()),
        );
        if !outcome.errors.is_empty() {
            metrics.insert("persist_errors".to_string(), serde_json::json!(outcome.errors));
        }

        PhaseResult {
            phase: phase_name.to_string(),
            status,
            started_at,
            completed_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
            results: outcome.results,
            metrics,
        }
    }

    /// Mirror phase bookkeeping into the registry entry; status changes go
    /// through the guarded setter instead
    fn mirror(&self, ctx: &VaultExecutionContext) {
        self.registry.with_vault(&ctx.execution_id, |entry| {
            entry.current_phase = ctx.current_phase.clone();
            entry.completed_phases = ctx.completed_phases.clone();
            entry.failed_phases = ctx.failed_phases.clone();
            entry.phase_results = ctx.phase_results.clone();
        });
    }

    fn terminal_status(
        &self,
        ctx: &VaultExecutionContext,
        vault: &Vault,
        cancel: &super::cancel::CancelToken,
    ) -> ExecutionStatus {
        let resolved = ctx.phase_results.len();
        if cancel.is_triggered() && resolved < vault.phases.len() {
            ExecutionStatus::Cancelled
        } else if !ctx.failed_phases.is_empty() {
            ExecutionStatus::Failed
        } else if ctx.completed_phases.len() == vault.phases.len() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Partial
        }
    }
}

fn missing_config_result(phase_name: &str) -> PhaseResult {
    let now = Utc::now();
    warn!("phase {} has no configuration", phase_name);
    PhaseResult {
        phase: phase_name.to_string(),
        status: ExecutionStatus::Failed,
        started_at: now,
        completed_at: now,
        duration_ms: 0,
        error: Some(format!("no configuration for phase {phase_name}")),
        results: Vec::new(),
        metrics: BTreeMap::new(),
    }
}
