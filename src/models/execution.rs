//! Execution models
//!
//! Statuses, per-case results, run configuration, and persistence records.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of an execution
///
/// Transitions are monotonic: queued -> running -> one terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Partial,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Partial
                | ExecutionStatus::Cancelled
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "…",
            ExecutionStatus::Running => "▶",
            ExecutionStatus::Completed => "✓",
            ExecutionStatus::Failed => "✗",
            ExecutionStatus::Partial => "◐",
            ExecutionStatus::Cancelled => "⊘",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Queued => write!(f, "QUEUED"),
            ExecutionStatus::Running => write!(f, "RUNNING"),
            ExecutionStatus::Completed => write!(f, "COMPLETED"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
            ExecutionStatus::Partial => write!(f, "PARTIAL"),
            ExecutionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Outcome of one test case
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
}

impl CaseStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "✓",
            CaseStatus::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseStatus::Passed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Passed => write!(f, "PASSED"),
            CaseStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One named check recorded on a result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionOutcome {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
        }
    }

    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Result of a single test case execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub execution_id: String,
    pub case_id: String,
    pub case_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: CaseStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub assertions: Vec<AssertionOutcome>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, serde_json::Value>,
}

impl TestResult {
    pub fn passed(
        execution_id: impl Into<String>,
        case_id: impl Into<String>,
        case_name: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            case_id: case_id.into(),
            case_name: case_name.into(),
            description: None,
            status: CaseStatus::Passed,
            started_at,
            completed_at: Utc::now(),
            duration_ms,
            error: None,
            assertions: Vec::new(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn failed(
        execution_id: impl Into<String>,
        case_id: impl Into<String>,
        case_name: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            case_id: case_id.into(),
            case_name: case_name.into(),
            description: None,
            status: CaseStatus::Failed,
            started_at,
            completed_at: Utc::now(),
            duration_ms,
            error: Some(error.into()),
            assertions: Vec::new(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_assertion(mut self, assertion: AssertionOutcome) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_artifact(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.artifacts.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.case_name,
            self.duration_ms
        )?;
        if let Some(err) = &self.error {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}

/// Whether an execution ran a suite or a vault
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    Suite,
    Vault,
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionKind::Suite => write!(f, "suite"),
            ExecutionKind::Vault => write!(f, "vault"),
        }
    }
}

/// Persisted execution row, written at submission and updated at the end
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub kind: ExecutionKind,
    pub target_id: String,
    pub target_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub test_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn queued(
        execution_id: impl Into<String>,
        kind: ExecutionKind,
        target_id: impl Into<String>,
        target_name: impl Into<String>,
        test_count: usize,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            kind,
            target_id: target_id.into(),
            target_name: target_name.into(),
            status: ExecutionStatus::Queued,
            started_at: Utc::now(),
            completed_at: None,
            test_count,
            error: None,
        }
    }
}

/// Compact notification payload for a finished execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub kind: ExecutionKind,
    pub target_id: String,
    pub target_name: String,
    pub status: ExecutionStatus,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl ExecutionSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} | total: {} | passed: {} | failed: {} | {}ms",
            self.status.symbol(),
            self.kind,
            self.target_name,
            self.total,
            self.passed,
            self.failed,
            self.duration_ms
        )
    }
}

/// When and where to deliver completion notifications
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub webhook_url: String,
    /// Notify on every terminal state
    #[serde(default)]
    pub on_completion: bool,
    /// Notify only when the execution failed
    #[serde(default)]
    pub on_failure: bool,
}

impl NotificationPrefs {
    pub fn on_completion(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            on_completion: true,
            on_failure: false,
        }
    }

    pub fn on_failure(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            on_completion: false,
            on_failure: true,
        }
    }

    /// Whether a terminal status warrants delivery
    pub fn should_notify(&self, status: ExecutionStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        if self.on_completion {
            return true;
        }
        self.on_failure && status == ExecutionStatus::Failed
    }
}

/// Caller-supplied knobs for one suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run cases concurrently instead of in declaration order
    #[serde(default)]
    pub parallel: bool,
    /// Concurrent case bound when parallel
    #[serde(default = "RunConfig::default_max_concurrent")]
    pub max_concurrent: usize,
    /// Whole-run deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPrefs>,
}

impl RunConfig {
    fn default_max_concurrent() -> usize {
        5
    }

    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(max_concurrent: usize) -> Self {
        Self {
            parallel: true,
            max_concurrent,
            timeout_secs: None,
            notification: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_notification(mut self, prefs: NotificationPrefs) -> Self {
        self.notification = Some(prefs);
        self
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> Result<(), String> {
        if self.parallel && self.max_concurrent == 0 {
            return Err("max_concurrent must be at least 1 for parallel runs".to_string());
        }
        if self.timeout_secs == Some(0) {
            return Err("timeout_secs must be positive when set".to_string());
        }
        if let Some(prefs) = &self.notification {
            if prefs.webhook_url.is_empty() {
                return Err("notification webhook_url must not be empty".to_string());
            }
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrent: Self::default_max_concurrent(),
            timeout_secs: None,
            notification: None,
        }
    }
}

/// Immediate response to a suite submission
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchReceipt {
    pub execution_id: String,
    pub status: String,
    pub estimated_duration_secs: u64,
    pub test_count: usize,
    pub tracking: String,
}

impl fmt::Display for LaunchReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) - {} tests, ~{}s",
            self.execution_id, self.status, self.test_count, self.estimated_duration_secs
        )
    }
}
