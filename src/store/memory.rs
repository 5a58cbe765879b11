//! In-memory stores
//!
//! Used for embedding and as fixtures in engine tests.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{ExecutionRecord, ExecutionStatus, TestResult, TestSuite, Vault};

use super::{ResultStore, SuiteStore, VaultStore};

/// Suite definitions held in a map
#[derive(Default)]
pub struct MemorySuiteStore {
    suites: RwLock<HashMap<String, TestSuite>>,
}

impl MemorySuiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, suite: TestSuite) {
        let mut suites = self.suites.write().expect("suite store lock poisoned");
        suites.insert(suite.id.clone(), suite);
    }
}

#[async_trait::async_trait]
impl SuiteStore for MemorySuiteStore {
    async fn get_suite(&self, suite_id: &str) -> Result<Option<TestSuite>> {
        let suites = self.suites.read().expect("suite store lock poisoned");
        Ok(suites.get(suite_id).cloned())
    }

    async fn list_suites(&self) -> Result<Vec<TestSuite>> {
        let suites = self.suites.read().expect("suite store lock poisoned");
        let mut all: Vec<TestSuite> = suites.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Vault definitions held in a map
#[derive(Default)]
pub struct MemoryVaultStore {
    vaults: RwLock<HashMap<String, Vault>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vault: Vault) {
        let mut vaults = self.vaults.write().expect("vault store lock poisoned");
        vaults.insert(vault.id.clone(), vault);
    }
}

#[async_trait::async_trait]
impl VaultStore for MemoryVaultStore {
    async fn get_vault(&self, vault_id: &str) -> Result<Option<Vault>> {
        let vaults = self.vaults.read().expect("vault store lock poisoned");
        Ok(vaults.get(vault_id).cloned())
    }

    async fn list_vaults(&self) -> Result<Vec<Vault>> {
        let vaults = self.vaults.read().expect("vault store lock poisoned");
        let mut all: Vec<Vault> = vaults.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Execution rows and results held in maps
///
/// The accessors make engine tests straightforward.
#[derive(Default)]
pub struct MemoryResultStore {
    executions: RwLock<HashMap<String, ExecutionRecord>>,
    results: RwLock<HashMap<String, Vec<TestResult>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execution(&self, execution_id: &str) -> Option<ExecutionRecord> {
        let executions = self.executions.read().expect("result store lock poisoned");
        executions.get(execution_id).cloned()
    }

    pub fn execution_count(&self) -> usize {
        let executions = self.executions.read().expect("result store lock poisoned");
        executions.len()
    }

    pub fn results_for(&self, execution_id: &str) -> Vec<TestResult> {
        let results = self.results.read().expect("result store lock poisoned");
        results.get(execution_id).cloned().unwrap_or_default()
    }

    pub fn result_count(&self, execution_id: &str) -> usize {
        self.results_for(execution_id).len()
    }
}

#[async_trait::async_trait]
impl ResultStore for MemoryResultStore {
    async fn store_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let mut executions = self.executions.write().expect("result store lock poisoned");
        executions.insert(record.execution_id.clone(), record.clone());
        Ok(())
    }

    async fn store_result(&self, result: &TestResult) -> Result<()> {
        let mut results = self.results.write().expect("result store lock poisoned");
        results
            .entry(result.execution_id.clone())
            .or_default()
            .push(result.clone());
        Ok(())
    }

    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut executions = self.executions.write().expect("result store lock poisoned");
        let record = executions
            .get_mut(execution_id)
            .ok_or_else(|| anyhow!("no execution row for {execution_id}"))?;
        record.status = status;
        record.error = error.map(String::from);
        if status.is_terminal() {
            record.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}
