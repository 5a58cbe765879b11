//! Test case runner
//!
//! Executes a single case's command under a deadline and turns every
//! outcome into a result record.

#![allow(dead_code)]

use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::models::{AssertionOutcome, TestCase, TestKind, TestResult};

/// Longest stdout/stderr slice kept on a result
const MAX_CAPTURED_OUTPUT: usize = 8 * 1024;

/// Runs one test case to a result, never to an error
#[derive(Clone, Debug)]
pub struct CaseRunner {
    default_timeout: Duration,
}

impl CaseRunner {
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            default_timeout: Duration::from_secs(default_timeout_secs.max(1)),
        }
    }

    /// Execute one case
    ///
    /// `cap` bounds the case's own deadline, carrying an outer run or
    /// phase deadline down to the case. A zero cap means the outer
    /// deadline already passed and the case fails as timed out without
    /// being started.
    pub async fn run(
        &self,
        execution_id: &str,
        case: &TestCase,
        cap: Option<Duration>,
    ) -> TestResult {
        let mut deadline = case
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);
        if let Some(cap) = cap {
            deadline = deadline.min(cap);
        }

        if deadline.is_zero() {
            return self.timed_out(execution_id, case, Duration::ZERO, 0);
        }

        if case.command.trim().is_empty() {
            return TestResult::failed(
                execution_id,
                &case.id,
                &case.name,
                Utc::now(),
                0,
                "no command configured",
            )
            .with_assertion(AssertionOutcome::failed(
                "command",
                "case has no command to run",
            ));
        }

        debug!("running case {} ({})", case.id, case.kind);

        match case.kind {
            TestKind::Performance => self.run_performance_case(execution_id, case, deadline).await,
            TestKind::Unit | TestKind::Integration | TestKind::Generic => {
                self.run_command_case(execution_id, case, deadline).await
            }
        }
    }

    /// Exit-status driven execution for unit, integration, and generic cases
    async fn run_command_case(
        &self,
        execution_id: &str,
        case: &TestCase,
        deadline: Duration,
    ) -> TestResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = run_command(&case.command, deadline).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            CommandOutcome::Completed(output) => {
                let mut result = if output.success {
                    TestResult::passed(execution_id, &case.id, &case.name, started_at, duration_ms)
                        .with_assertion(AssertionOutcome::passed("exit_status"))
                } else {
                    let message = failure_message(&output);
                    TestResult::failed(
                        execution_id,
                        &case.id,
                        &case.name,
                        started_at,
                        duration_ms,
                        &message,
                    )
                    .with_assertion(AssertionOutcome::failed("exit_status", message))
                };
                result = attach_output(result, &output);
                if let Some(desc) = &case.description {
                    result = result.with_description(desc.clone());
                }
                result
            }
            CommandOutcome::TimedOut => {
                self.timed_out(execution_id, case, deadline, duration_ms)
            }
            CommandOutcome::SpawnFailed(err) => {
                warn!("case {} could not start: {}", case.id, err);
                TestResult::failed(
                    execution_id,
                    &case.id,
                    &case.name,
                    started_at,
                    duration_ms,
                    format!("failed to start command: {err}"),
                )
                .with_assertion(AssertionOutcome::failed("spawn", err))
            }
        }
    }

    /// Performance cases also check wall-clock time against the budget
    async fn run_performance_case(
        &self,
        execution_id: &str,
        case: &TestCase,
        deadline: Duration,
    ) -> TestResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = run_command(&case.command, deadline).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = match outcome {
            CommandOutcome::Completed(output) => {
                let over_budget = case.budget_ms.map(|b| duration_ms > b).unwrap_or(false);
                if output.success && !over_budget {
                    let mut r = TestResult::passed(
                        execution_id,
                        &case.id,
                        &case.name,
                        started_at,
                        duration_ms,
                    )
                    .with_assertion(AssertionOutcome::passed("exit_status"));
                    if case.budget_ms.is_some() {
                        r = r.with_assertion(AssertionOutcome::passed("within_budget"));
                    }
                    attach_output(r, &output)
                } else if !output.success {
                    let message = failure_message(&output);
                    let r = TestResult::failed(
                        execution_id,
                        &case.id,
                        &case.name,
                        started_at,
                        duration_ms,
                        &message,
                    )
                    .with_assertion(AssertionOutcome::failed("exit_status", message));
                    attach_output(r, &output)
                } else {
                    // exit 0 but slower than the budget allows
                    let budget = case.budget_ms.unwrap_or(0);
                    let message =
                        format!("took {duration_ms}ms, budget is {budget}ms");
                    let r = TestResult::failed(
                        execution_id,
                        &case.id,
                        &case.name,
                        started_at,
                        duration_ms,
                        &message,
                    )
                    .with_assertion(AssertionOutcome::passed("exit_status"))
                    .with_assertion(AssertionOutcome::failed("within_budget", message));
                    attach_output(r, &output)
                }
            }
            CommandOutcome::TimedOut => {
                self.timed_out(execution_id, case, deadline, duration_ms)
            }
            CommandOutcome::SpawnFailed(err) => TestResult::failed(
                execution_id,
                &case.id,
                &case.name,
                started_at,
                duration_ms,
                format!("failed to start command: {err}"),
            )
            .with_assertion(AssertionOutcome::failed("spawn", err)),
        };

        result = result.with_artifact("duration_ms", serde_json::json!(duration_ms));
        if let Some(budget) = case.budget_ms {
            result = result.with_artifact("budget_ms", serde_json::json!(budget));
        }
        result
    }

    fn timed_out(
        &self,
        execution_id: &str,
        case: &TestCase,
        deadline: Duration,
        duration_ms: u64,
    ) -> TestResult {
        let message = format!("timed out after {:.1}s", deadline.as_secs_f64());
        warn!("case {} {}", case.id, message);
        TestResult::failed(
            execution_id,
            &case.id,
            &case.name,
            Utc::now(),
            duration_ms,
            &message,
        )
        .with_assertion(AssertionOutcome::failed("deadline", message))
    }
}

impl Default for CaseRunner {
    fn default() -> Self {
        Self::new(60)
    }
}

/// What happened to a spawned command
enum CommandOutcome {
    Completed(CommandOutput),
    TimedOut,
    SpawnFailed(String),
}

struct CommandOutput {
    success: bool,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Run a shell command, killing it when the deadline fires
async fn run_command(command: &str, deadline: Duration) -> CommandOutcome {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .kill_on_drop(true)
        .output();

    match timeout(deadline, child).await {
        Ok(Ok(output)) => CommandOutcome::Completed(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: truncate_output(&String::from_utf8_lossy(&output.stdout)),
            stderr: truncate_output(&String::from_utf8_lossy(&output.stderr)),
        }),
        Ok(Err(e)) => CommandOutcome::SpawnFailed(e.to_string()),
        Err(_) => CommandOutcome::TimedOut,
    }
}

fn failure_message(output: &CommandOutput) -> String {
    let code = output
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit status {code}")
    } else {
        format!("exit status {code}: {stderr}")
    }
}

fn attach_output(mut result: TestResult, output: &CommandOutput) -> TestResult {
    if !output.stdout.is_empty() {
        result = result.with_artifact("stdout", serde_json::json!(output.stdout));
    }
    if !output.stderr.is_empty() {
        result = result.with_artifact("stderr", serde_json::json!(output.stderr));
    }
    result
}

fn truncate_output(s: &str) -> String {
    if s.len() <= MAX_CAPTURED_OUTPUT {
        return s.to_string();
    }
    let mut end = MAX_CAPTURED_OUTPUT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseStatus;

    #[tokio::test]
    async fn test_passing_command() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-1", "truth", "true");

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Passed);
        assert!(result.assertions.iter().any(|a| a.name == "exit_status" && a.passed));
    }

    #[tokio::test]
    async fn test_failing_command_is_a_result() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-2", "falsehood", "false");

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("exit status 1"));
    }

    #[tokio::test]
    async fn test_stdout_captured_as_artifact() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-3", "echo", "echo hello");

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Passed);
        let stdout = result.artifacts.get("stdout").unwrap().as_str().unwrap();
        assert!(stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-4", "sleeper", "sleep 5").with_timeout(1);

        let start = Instant::now();
        let result = runner.run("ex-1", &case, None).await;

        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("timed out after"));
        assert!(result.assertions.iter().any(|a| a.name == "deadline" && !a.passed));
    }

    #[tokio::test]
    async fn test_zero_cap_fails_without_running() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-5", "never", "echo should-not-run");

        let result = runner.run("ex-1", &case, Some(Duration::ZERO)).await;
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("timed out after"));
        assert!(result.artifacts.get("stdout").is_none());
    }

    #[tokio::test]
    async fn test_empty_command_fails() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-6", "blank", "  ");

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("no command"));
    }

    #[tokio::test]
    async fn test_performance_budget_enforced() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-7", "slow perf", "sleep 0.2")
            .with_kind(TestKind::Performance)
            .with_budget(50);

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Failed);
        assert!(result.error.as_deref().unwrap().contains("budget"));
        assert!(result
            .assertions
            .iter()
            .any(|a| a.name == "within_budget" && !a.passed));
        assert!(result.artifacts.contains_key("duration_ms"));
        assert_eq!(result.artifacts["budget_ms"], serde_json::json!(50));
    }

    #[tokio::test]
    async fn test_performance_within_budget_passes() {
        let runner = CaseRunner::new(10);
        let case = TestCase::new("tc-8", "fast perf", "true")
            .with_kind(TestKind::Performance)
            .with_budget(5000);

        let result = runner.run("ex-1", &case, None).await;
        assert_eq!(result.status, CaseStatus::Passed);
        assert!(result
            .assertions
            .iter()
            .any(|a| a.name == "within_budget" && a.passed));
    }

    #[test]
    fn test_truncation_marks_cut() {
        let long = "x".repeat(MAX_CAPTURED_OUTPUT + 100);
        let cut = truncate_output(&long);
        assert!(cut.ends_with("[truncated]"));
        assert!(cut.len() < long.len());

        let short = "fine";
        assert_eq!(truncate_output(short), "fine");
    }
}
