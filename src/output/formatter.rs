//! Output formatters for executions and results
//!
//! Provides table, JSON, and summary renderings.

#![allow(dead_code)]

use crate::engine::{ExecutionContext, ExecutionEntry, VaultExecutionContext};
use crate::models::{CaseStatus, LaunchReceipt, TestResult};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a launch receipt
    pub fn format_receipt(&self, receipt: &LaunchReceipt) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(receipt).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(receipt).unwrap_or_default(),
            _ => format!(
                "▶ {} | {} cases | ~{}s estimated | track: {}",
                receipt.execution_id,
                receipt.test_count,
                receipt.estimated_duration_secs,
                receipt.tracking
            ),
        }
    }

    /// Format a single case result
    pub fn format_result(&self, result: &TestResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Summary => self.format_result_summary(result),
        }
    }

    fn status_cell(&self, status: CaseStatus) -> &'static str {
        if self.colorize {
            match status {
                CaseStatus::Passed => "\x1b[32m✓ PASS\x1b[0m",
                CaseStatus::Failed => "\x1b[31m✗ FAIL\x1b[0m",
            }
        } else {
            match status {
                CaseStatus::Passed => "✓ PASS",
                CaseStatus::Failed => "✗ FAIL",
            }
        }
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        format!(
            "{:24} {} [{:>6}ms]",
            result.case_name,
            self.status_cell(result.status),
            result.duration_ms
        )
    }

    fn format_result_summary(&self, result: &TestResult) -> String {
        match &result.error {
            Some(error) => format!(
                "{} {} ({}ms): {}",
                result.status.symbol(),
                result.case_name,
                result.duration_ms,
                error
            ),
            None => format!(
                "{} {} ({}ms)",
                result.status.symbol(),
                result.case_name,
                result.duration_ms
            ),
        }
    }

    /// Format a registry entry, suite or vault
    pub fn format_entry(&self, entry: &ExecutionEntry) -> String {
        match entry {
            ExecutionEntry::Suite(ctx) => self.format_execution(ctx),
            ExecutionEntry::Vault(ctx) => self.format_vault(ctx),
        }
    }

    /// Format a suite execution
    pub fn format_execution(&self, ctx: &ExecutionContext) -> String {
        match self.format {
            OutputFormat::Table => self.format_execution_table(ctx),
            OutputFormat::Json => serde_json::to_string(ctx).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(ctx).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} {}: {}/{} passed | {} | {}ms",
                ctx.status.symbol(),
                ctx.suite_name,
                ctx.passed_count(),
                ctx.case_count(),
                ctx.status,
                ctx.duration_ms()
            ),
        }
    }

    fn format_execution_table(&self, ctx: &ExecutionContext) -> String {
        let mut output = String::new();

        // Header
        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  {:40} {:>18} ║\n",
            ctx.suite_name,
            short_id(&ctx.execution_id)
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        // Results
        for result in &ctx.results {
            output.push_str(&format!("║  {}  ║\n", self.format_result_table(result)));
        }
        if ctx.results.is_empty() {
            output.push_str("║  (no results yet)                                            ║\n");
        }

        // Footer
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", ctx.passed_count())
        } else {
            ctx.passed_count().to_string()
        };
        let fail_str = if self.colorize && ctx.failed_count() > 0 {
            format!("\x1b[31m{}\x1b[0m", ctx.failed_count())
        } else {
            ctx.failed_count().to_string()
        };

        output.push_str(&format!(
            "║  Total: {:2} | Pass: {} | Fail: {} | Status: {:10}       ║\n",
            ctx.case_count(),
            pass_str,
            fail_str,
            ctx.status.to_string()
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:6}ms                      ║\n",
            pass_rate(ctx.passed_count(), ctx.results.len()),
            ctx.duration_ms()
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        // Failure details below the box
        let failed: Vec<_> = ctx.results.iter().filter(|r| !r.is_success()).collect();
        if !failed.is_empty() {
            output.push_str("\nFailures:\n");
            for result in failed {
                output.push_str(&format!(
                    "  - {}: {}\n",
                    result.case_name,
                    result.error.as_deref().unwrap_or("no error message")
                ));
            }
        }
        if !ctx.errors.is_empty() {
            output.push_str("\nWarnings:\n");
            for error in &ctx.errors {
                output.push_str(&format!("  - {error}\n"));
            }
        }

        output
    }

    /// Format a vault execution
    pub fn format_vault(&self, ctx: &VaultExecutionContext) -> String {
        match self.format {
            OutputFormat::Table => self.format_vault_table(ctx),
            OutputFormat::Json => serde_json::to_string(ctx).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(ctx).unwrap_or_default(),
            OutputFormat::Summary => format!(
                "{} {}: {}/{} phases completed | {} | {}ms",
                ctx.status.symbol(),
                ctx.vault_name,
                ctx.completed_phases.len(),
                ctx.phases.len(),
                ctx.status,
                ctx.duration_ms()
            ),
        }
    }

    fn format_vault_table(&self, ctx: &VaultExecutionContext) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  {:40} {:>18} ║\n",
            ctx.vault_name,
            short_id(&ctx.execution_id)
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for phase_name in &ctx.phases {
            match ctx.phase_results.get(phase_name) {
                Some(phase) => {
                    output.push_str(&format!(
                        "║  {:16} {} {:9} | {:2} passed, {:2} failed [{:>6}ms] ║\n",
                        phase.phase,
                        self.phase_symbol(phase.status.symbol()),
                        phase.status.to_string(),
                        phase.passed_count(),
                        phase.failed_count(),
                        phase.duration_ms
                    ));
                }
                None => {
                    output.push_str(&format!(
                        "║  {phase_name:16} (not run)                                   ║\n"
                    ));
                }
            }
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Phases: {}/{} completed | Status: {:10}                  ║\n",
            ctx.completed_phases.len(),
            ctx.phases.len(),
            ctx.status.to_string()
        ));
        output.push_str(&format!(
            "║  Cases: {} passed, {} failed | Duration: {:6}ms             ║\n",
            ctx.passed_count(),
            ctx.failed_count(),
            ctx.duration_ms()
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for phase_name in &ctx.failed_phases {
            if let Some(phase) = ctx.phase_results.get(phase_name) {
                if let Some(error) = &phase.error {
                    output.push_str(&format!("\n  ✗ {phase_name}: {error}\n"));
                }
                for result in phase.results.iter().filter(|r| !r.is_success()) {
                    output.push_str(&format!(
                        "  ✗ {} / {}: {}\n",
                        phase_name,
                        result.case_name,
                        result.error.as_deref().unwrap_or("no error message")
                    ));
                }
            }
        }

        output
    }

    fn phase_symbol(&self, symbol: &str) -> String {
        if self.colorize {
            match symbol {
                "✓" => format!("\x1b[32m{symbol}\x1b[0m"),
                "✗" => format!("\x1b[31m{symbol}\x1b[0m"),
                _ => symbol.to_string(),
            }
        } else {
            symbol.to_string()
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn short_id(id: &str) -> String {
    if id.len() > 16 {
        format!("{}…", &id[..15])
    } else {
        id.to_string()
    }
}

fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (passed as f64 / total as f64) * 100.0
}
