//! Execution registry
//!
//! Shared id-to-context map behind a read/write lock.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::models::{ExecutionKind, ExecutionStatus, ExecutionSummary};

use super::cancel::CancelToken;
use super::context::{ExecutionContext, VaultExecutionContext};

/// One tracked execution, suite or vault
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExecutionEntry {
    Suite(ExecutionContext),
    Vault(VaultExecutionContext),
}

impl ExecutionEntry {
    pub fn execution_id(&self) -> &str {
        match self {
            ExecutionEntry::Suite(ctx) => &ctx.execution_id,
            ExecutionEntry::Vault(ctx) => &ctx.execution_id,
        }
    }

    pub fn kind(&self) -> ExecutionKind {
        match self {
            ExecutionEntry::Suite(_) => ExecutionKind::Suite,
            ExecutionEntry::Vault(_) => ExecutionKind::Vault,
        }
    }

    pub fn target_name(&self) -> &str {
        match self {
            ExecutionEntry::Suite(ctx) => &ctx.suite_name,
            ExecutionEntry::Vault(ctx) => &ctx.vault_name,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecutionEntry::Suite(ctx) => ctx.status,
            ExecutionEntry::Vault(ctx) => ctx.status,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            ExecutionEntry::Suite(ctx) => ctx.started_at,
            ExecutionEntry::Vault(ctx) => ctx.started_at,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ExecutionEntry::Suite(ctx) => ctx.completed_at,
            ExecutionEntry::Vault(ctx) => ctx.completed_at,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        match self {
            ExecutionEntry::Suite(ctx) => ctx.cancel.clone(),
            ExecutionEntry::Vault(ctx) => ctx.cancel.clone(),
        }
    }

    pub fn summary(&self) -> ExecutionSummary {
        match self {
            ExecutionEntry::Suite(ctx) => ctx.summary(),
            ExecutionEntry::Vault(ctx) => ctx.summary(),
        }
    }

    pub fn as_suite(&self) -> Option<&ExecutionContext> {
        match self {
            ExecutionEntry::Suite(ctx) => Some(ctx),
            ExecutionEntry::Vault(_) => None,
        }
    }

    pub fn as_vault(&self) -> Option<&VaultExecutionContext> {
        match self {
            ExecutionEntry::Suite(_) => None,
            ExecutionEntry::Vault(ctx) => Some(ctx),
        }
    }

    /// Apply a status transition, refusing to leave a terminal state
    ///
    /// Entering a terminal state stamps `completed_at`.
    fn set_status(&mut self, status: ExecutionStatus) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        let completed_at = status.is_terminal().then(Utc::now);
        match self {
            ExecutionEntry::Suite(ctx) => {
                ctx.status = status;
                if completed_at.is_some() {
                    ctx.completed_at = completed_at;
                }
            }
            ExecutionEntry::Vault(ctx) => {
                ctx.status = status;
                if completed_at.is_some() {
                    ctx.completed_at = completed_at;
                }
            }
        }
        true
    }
}

/// Concurrency-safe map of all known executions
///
/// Reads hand out clones; mutation happens in short closures under the
/// write lock. The lock is never held across an await point.
#[derive(Default)]
pub struct ExecutionRegistry {
    entries: RwLock<HashMap<String, ExecutionEntry>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_suite(&self, ctx: ExecutionContext) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        entries.insert(ctx.execution_id.clone(), ExecutionEntry::Suite(ctx));
    }

    pub fn register_vault(&self, ctx: VaultExecutionContext) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        entries.insert(ctx.execution_id.clone(), ExecutionEntry::Vault(ctx));
    }

    /// Defensive copy of one entry
    pub fn snapshot(&self, execution_id: &str) -> Option<ExecutionEntry> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.get(execution_id).cloned()
    }

    pub fn contains(&self, execution_id: &str) -> bool {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.contains_key(execution_id)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().expect("registry lock poisoned");
        entries.keys().cloned().collect()
    }

    /// Mutate a suite context in place; `None` when the id is unknown
    /// or tracks a vault
    pub fn with_suite<R>(
        &self,
        execution_id: &str,
        f: impl FnOnce(&mut ExecutionContext) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        match entries.get_mut(execution_id) {
            Some(ExecutionEntry::Suite(ctx)) => Some(f(ctx)),
            _ => None,
        }
    }

    /// Mutate a vault context in place
    pub fn with_vault<R>(
        &self,
        execution_id: &str,
        f: impl FnOnce(&mut VaultExecutionContext) -> R,
    ) -> Option<R> {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        match entries.get_mut(execution_id) {
            Some(ExecutionEntry::Vault(ctx)) => Some(f(ctx)),
            _ => None,
        }
    }

    /// Guarded status transition; `false` when unknown or already terminal
    pub fn set_status(&self, execution_id: &str, status: ExecutionStatus) -> bool {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        match entries.get_mut(execution_id) {
            Some(entry) => {
                let applied = entry.set_status(status);
                if !applied {
                    debug!(
                        "ignoring status change to {} for terminal execution {}",
                        status, execution_id
                    );
                }
                applied
            }
            None => false,
        }
    }

    /// Trigger cancellation for an execution
    ///
    /// Returns `false` only when the id is unknown. Cancelling an already
    /// finished execution is accepted and has no effect on its status.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        match entries.get_mut(execution_id) {
            Some(entry) => {
                entry.cancel_token().trigger();
                entry.set_status(ExecutionStatus::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Drop terminal entries older than the retention window
    ///
    /// Non-terminal entries are never evicted, whatever their age.
    pub fn evict_finished(&self, retention_secs: u64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(retention_secs as i64);
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| {
            let expired = entry.status().is_terminal()
                && entry.completed_at().map(|t| t <= cutoff).unwrap_or(false);
            !expired
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("evicted {} finished executions", evicted);
        }
        evicted
    }
}
