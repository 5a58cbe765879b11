//! Data models for suite and vault execution
//!
//! This module contains all data structures used throughout the application.

mod execution;
mod suite;
mod vault;

pub use execution::{
    AssertionOutcome, CaseStatus, ExecutionKind, ExecutionRecord, ExecutionStatus,
    ExecutionSummary, LaunchReceipt, NotificationPrefs, RunConfig, TestResult,
};
pub use suite::{TestCase, TestKind, TestSuite};
pub use vault::{PhaseConfig, PhaseResult, SuccessCriteria, Vault, VaultRunConfig};
