//! Live execution state
//!
//! Registry-held contexts for in-flight suite and vault runs.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{
    ExecutionKind, ExecutionStatus, ExecutionSummary, NotificationPrefs, PhaseResult, TestCase,
    TestResult, TestSuite, Vault,
};

use super::cancel::CancelToken;

/// Mutable state of one suite execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub suite_id: String,
    pub suite_name: String,
    /// Snapshot of the suite's cases at submission time
    pub cases: Vec<TestCase>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    /// Infrastructure problems that did not fail the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPrefs>,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl ExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        suite: &TestSuite,
        notification: Option<NotificationPrefs>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            suite_id: suite.id.clone(),
            suite_name: suite.name.clone(),
            cases: suite.cases.clone(),
            status: ExecutionStatus::Queued,
            started_at: Utc::now(),
            completed_at: None,
            results: Vec::new(),
            errors: Vec::new(),
            notification,
            cancel: CancelToken::new(),
        }
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            execution_id: self.execution_id.clone(),
            kind: ExecutionKind::Suite,
            target_id: self.suite_id.clone(),
            target_name: self.suite_name.clone(),
            status: self.status,
            total: self.case_count(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            duration_ms: self.duration_ms(),
        }
    }
}

/// Mutable state of one vault execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultExecutionContext {
    pub execution_id: String,
    pub vault_id: String,
    pub vault_name: String,
    /// Declared phase order, fixed at submission
    pub phases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub completed_phases: Vec<String>,
    #[serde(default)]
    pub failed_phases: Vec<String>,
    #[serde(default)]
    pub phase_results: BTreeMap<String, PhaseResult>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl VaultExecutionContext {
    pub fn new(execution_id: impl Into<String>, vault: &Vault) -> Self {
        Self {
            execution_id: execution_id.into(),
            vault_id: vault.id.clone(),
            vault_name: vault.name.clone(),
            phases: vault.phases.clone(),
            current_phase: None,
            completed_phases: Vec::new(),
            failed_phases: Vec::new(),
            phase_results: BTreeMap::new(),
            status: ExecutionStatus::Queued,
            started_at: Utc::now(),
            completed_at: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn all_results(&self) -> impl Iterator<Item = &TestResult> {
        self.phase_results.values().flat_map(|p| p.results.iter())
    }

    pub fn total_results(&self) -> usize {
        self.phase_results.values().map(|p| p.results.len()).sum()
    }

    pub fn passed_count(&self) -> usize {
        self.all_results().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.all_results().filter(|r| !r.is_success()).count()
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            execution_id: self.execution_id.clone(),
            kind: ExecutionKind::Vault,
            target_id: self.vault_id.clone(),
            target_name: self.vault_name.clone(),
            status: self.status,
            total: self.total_results(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            duration_ms: self.duration_ms(),
        }
    }
}
