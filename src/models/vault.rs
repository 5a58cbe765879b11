//! Vault models
//!
//! Multi-phase pipelines, phase configuration, and phase results.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::execution::{ExecutionStatus, NotificationPrefs, TestResult};
use super::suite::TestCase;

/// Execution settings for one vault phase
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Phase deadline; cases past it fail with a timeout result
    #[serde(default = "PhaseConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "PhaseConfig::default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

impl PhaseConfig {
    fn default_timeout_secs() -> u64 {
        300
    }

    fn default_max_concurrent() -> usize {
        5
    }

    pub fn new(cases: Vec<TestCase>) -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            parallel: false,
            max_concurrent: Self::default_max_concurrent(),
            cases,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn parallel(mut self, max_concurrent: usize) -> Self {
        self.parallel = true;
        self.max_concurrent = max_concurrent;
        self
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Policy deciding whether a failed phase stops the pipeline
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SuccessCriteria {
    /// When false, the first failed executed phase short-circuits the vault
    #[serde(default)]
    pub allow_critical_failures: bool,
}

/// Ordered multi-phase test pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Phase execution order; every entry should have a `phase_configs` row
    #[serde(default)]
    pub phases: Vec<String>,
    #[serde(default)]
    pub phase_configs: BTreeMap<String, PhaseConfig>,
    #[serde(default)]
    pub success_criteria: SuccessCriteria,
}

impl Vault {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            phases: Vec::new(),
            phase_configs: BTreeMap::new(),
            success_criteria: SuccessCriteria::default(),
        }
    }

    pub fn with_phase(mut self, name: impl Into<String>, config: PhaseConfig) -> Self {
        let name = name.into();
        self.phases.push(name.clone());
        self.phase_configs.insert(name, config);
        self
    }

    pub fn allow_critical_failures(mut self, allow: bool) -> Self {
        self.success_criteria.allow_critical_failures = allow;
        self
    }

    /// Total configured cases across all declared phases
    pub fn case_count(&self) -> usize {
        self.phases
            .iter()
            .filter_map(|p| self.phase_configs.get(p))
            .map(|c| c.cases.len())
            .sum()
    }
}

impl fmt::Display for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} phases)", self.name, self.phases.len())
    }
}

/// Outcome of one vault phase
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Phase-level problem, e.g. missing configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl PhaseResult {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

impl fmt::Display for PhaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {} passed, {} failed | {}ms",
            self.status.symbol(),
            self.phase,
            self.passed_count(),
            self.failed_count(),
            self.duration_ms
        )
    }
}

/// Caller-supplied knobs for one vault run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VaultRunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPrefs>,
}

impl VaultRunConfig {
    pub fn with_notification(mut self, prefs: NotificationPrefs) -> Self {
        self.notification = Some(prefs);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(prefs) = &self.notification {
            if prefs.webhook_url.is_empty() {
                return Err("notification webhook_url must not be empty".to_string());
            }
        }
        Ok(())
    }
}
