//! Store interfaces and implementations
//!
//! Suite/vault definition lookup and result persistence behind traits.

#![allow(dead_code)]

mod file;
mod memory;

pub use file::{
    definition_files, parse_definition, FileSuiteStore, FileVaultStore, JsonResultStore,
    StoredExecution,
};
pub use memory::{MemoryResultStore, MemorySuiteStore, MemoryVaultStore};

use anyhow::Result;

use crate::models::{ExecutionRecord, ExecutionStatus, TestResult, TestSuite, Vault};

/// Read access to suite definitions
///
/// `Ok(None)` means the id is unknown; the engine turns that into its
/// not-found error.
#[async_trait::async_trait]
pub trait SuiteStore: Send + Sync {
    async fn get_suite(&self, suite_id: &str) -> Result<Option<TestSuite>>;

    async fn list_suites(&self) -> Result<Vec<TestSuite>>;
}

/// Read access to vault definitions
#[async_trait::async_trait]
pub trait VaultStore: Send + Sync {
    async fn get_vault(&self, vault_id: &str) -> Result<Option<Vault>>;

    async fn list_vaults(&self) -> Result<Vec<Vault>>;
}

/// Write access for execution rows and per-case results
///
/// Callers treat every method as best-effort: failures are logged and
/// recorded, never allowed to change an execution's outcome.
#[async_trait::async_trait]
pub trait ResultStore: Send + Sync {
    /// Record a newly admitted execution
    async fn store_execution(&self, record: &ExecutionRecord) -> Result<()>;

    /// Record one finished case result
    async fn store_result(&self, result: &TestResult) -> Result<()>;

    /// Update the terminal (or running) status of an execution row
    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()>;
}
