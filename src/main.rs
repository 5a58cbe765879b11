//! Crucible - Test Suite and Vault Execution Engine
//!
//! A CLI tool that runs shell-command test suites and multi-phase vault
//! pipelines with bounded concurrency, live status tracking, and a JSON
//! results archive.
//!
//! ## Features
//!
//! - Sequential or parallel suite execution behind a bounded worker pool
//! - Vault pipelines: ordered phases with per-phase deadlines and a
//!   critical-failure short-circuit policy
//! - Cooperative cancellation (Ctrl-C) and live status polling
//! - Per-result persistence with CSV export
//! - Webhook notifications on completion or failure
//!
//! ## Usage
//!
//! ```bash
//! # Run a suite
//! crucible run api-smoke
//!
//! # Run a suite in parallel with a whole-run deadline
//! crucible run api-smoke --parallel --max-concurrent 8 --timeout 300
//!
//! # Run a vault pipeline
//! crucible vault release-gate
//!
//! # List definitions
//! crucible list --detailed
//!
//! # Inspect archived results
//! crucible results
//! crucible results --execution <id> --export results.csv
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod cli;
mod config;
mod engine;
mod models;
mod notify;
mod output;
mod store;
mod utils;

use cli::Args;
use config::AppConfig;
use engine::{run_cleanup_loop, TestEngine};
use models::{ExecutionStatus, NotificationPrefs, RunConfig, TestSuite, Vault, VaultRunConfig};
use notify::WebhookNotifier;
use output::{OutputFormat, ResultFormatter};
use store::{FileSuiteStore, FileVaultStore, JsonResultStore, SuiteStore, VaultStore};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::logger::init_logger(args.verbose);

    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default()?,
    };

    match args.command {
        cli::Command::Run(run_args) => {
            run_suite(run_args, &config).await?;
        }
        cli::Command::Vault(vault_args) => {
            run_vault(vault_args, &config).await?;
        }
        cli::Command::List(list_args) => {
            list_definitions(list_args, &config).await?;
        }
        cli::Command::Results(results_args) => {
            show_results(results_args, &config)?;
        }
        cli::Command::Check(check_args) => {
            check_definitions(check_args, &config)?;
        }
    }

    Ok(())
}

fn definitions_dir(config: &AppConfig, override_dir: Option<&str>) -> PathBuf {
    override_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| config.definitions_dir.clone())
}

fn result_store(config: &AppConfig) -> JsonResultStore {
    match &config.results_dir {
        Some(dir) => JsonResultStore::new(dir),
        None => JsonResultStore::default_dir(),
    }
}

fn build_engine(config: &AppConfig, override_dir: Option<&str>) -> Result<TestEngine> {
    let dir = definitions_dir(config, override_dir);
    let engine = TestEngine::new(
        config.engine_config(),
        Arc::new(FileSuiteStore::new(dir.join("suites"))),
        Arc::new(FileVaultStore::new(dir.join("vaults"))),
        Arc::new(result_store(config)),
        Arc::new(WebhookNotifier::new()?),
    );
    Ok(engine)
}

fn notification_prefs(notify: Option<&str>, on_failure: bool) -> Option<NotificationPrefs> {
    notify.map(|url| {
        if on_failure {
            NotificationPrefs::on_failure(url)
        } else {
            NotificationPrefs::on_completion(url)
        }
    })
}

async fn run_suite(args: cli::RunArgs, config: &AppConfig) -> Result<()> {
    let engine = build_engine(config, args.dir.as_deref())?;
    tokio::spawn(run_cleanup_loop(
        engine.clone(),
        Duration::from_secs(config.cleanup_interval_secs),
    ));

    let mut run_config = if args.parallel {
        RunConfig::parallel(args.max_concurrent.unwrap_or(config.max_concurrent_cases))
    } else {
        RunConfig::sequential()
    };
    if let Some(secs) = args.timeout {
        run_config = run_config.with_timeout(secs);
    }
    if let Some(prefs) = notification_prefs(args.notify.as_deref(), args.notify_on_failure) {
        run_config = run_config.with_notification(prefs);
    }

    let formatter = ResultFormatter::new(
        OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table),
    );

    let receipt = engine.execute_suite(&args.suite, run_config).await?;
    println!("{}", formatter.format_receipt(&receipt));

    // Ctrl-C requests cancellation; the run then winds down cooperatively
    let interrupt_engine = engine.clone();
    let interrupt_id = receipt.execution_id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling execution {}", interrupt_id);
            let _ = interrupt_engine.cancel_execution(&interrupt_id);
        }
    });

    let poll = Duration::from_millis(args.poll_ms.max(10));
    let entry = loop {
        let entry = engine.execution_status(&receipt.execution_id)?;
        if entry.status().is_terminal() {
            break entry;
        }
        tokio::time::sleep(poll).await;
    };

    println!("{}", formatter.format_entry(&entry));

    if entry.status() != ExecutionStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_vault(args: cli::VaultArgs, config: &AppConfig) -> Result<()> {
    let engine = build_engine(config, args.dir.as_deref())?;
    tokio::spawn(run_cleanup_loop(
        engine.clone(),
        Duration::from_secs(config.cleanup_interval_secs),
    ));

    let mut vault_config = VaultRunConfig::default();
    if let Some(prefs) = notification_prefs(args.notify.as_deref(), args.notify_on_failure) {
        vault_config = vault_config.with_notification(prefs);
    }

    let formatter = ResultFormatter::new(
        OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table),
    );

    let ctx = engine.execute_vault(&args.vault, vault_config).await?;
    println!("{}", formatter.format_vault(&ctx));

    if ctx.status != ExecutionStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

async fn list_definitions(args: cli::ListArgs, config: &AppConfig) -> Result<()> {
    let dir = definitions_dir(config, args.dir.as_deref());
    let suites = FileSuiteStore::new(dir.join("suites")).list_suites().await?;
    let vaults = FileVaultStore::new(dir.join("vaults")).list_vaults().await?;

    println!("\nTest Suites ({})", suites.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if suites.is_empty() {
        println!("  (none found under {})", dir.join("suites").display());
    }
    for suite in &suites {
        println!(
            "  {:20} {:30} [{} cases]",
            suite.id,
            suite.name,
            suite.case_count()
        );
        if args.detailed {
            for case in &suite.cases {
                println!(
                    "      - {:24} [{:11}] {}",
                    case.name,
                    case.kind.name(),
                    case.command
                );
            }
        }
    }

    println!("\nVaults ({})", vaults.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if vaults.is_empty() {
        println!("  (none found under {})", dir.join("vaults").display());
    }
    for vault in &vaults {
        let policy = if vault.success_criteria.allow_critical_failures {
            "tolerant"
        } else {
            "strict"
        };
        println!(
            "  {:20} {:30} [{} phases, {} cases, {}]",
            vault.id,
            vault.name,
            vault.phases.len(),
            vault.case_count(),
            policy
        );
        if args.detailed {
            for phase_name in &vault.phases {
                match vault.phase_configs.get(phase_name) {
                    Some(phase) => {
                        let mode = if phase.parallel {
                            format!("parallel x{}", phase.max_concurrent)
                        } else {
                            "sequential".to_string()
                        };
                        println!(
                            "      - {:24} {} cases, {}s deadline, {}",
                            phase_name,
                            phase.cases.len(),
                            phase.timeout_secs,
                            mode
                        );
                    }
                    None => {
                        println!("      - {phase_name:24} ⚠ no configuration");
                    }
                }
            }
        }
    }

    println!();
    Ok(())
}

fn show_results(args: cli::ResultsArgs, config: &AppConfig) -> Result<()> {
    let storage = result_store(config);

    // Single execution view
    if let Some(execution_id) = &args.execution {
        let stored = storage.load(execution_id)?;

        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&stored)?);
        } else {
            println!("\n┌─────────────────────────────────────────────────────────────┐");
            println!("│ Execution: {:48} │", stored.record.execution_id);
            println!("├─────────────────────────────────────────────────────────────┤");
            println!(
                "│ Target: {:51} │",
                format!("{} ({})", stored.record.target_name, stored.record.kind)
            );
            println!("│ Status: {:51} │", stored.record.status.to_string());
            println!(
                "│ Started: {:50} │",
                stored.record.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
            );
            if let Some(error) = &stored.record.error {
                println!("│ Error: {:52} │", error);
            }
            println!("├─────────────────────────────────────────────────────────────┤");

            for result in &stored.results {
                println!(
                    "│ {} {:40} [{:>8}ms] │",
                    result.status.symbol(),
                    result.case_name,
                    result.duration_ms
                );
            }
            if stored.results.is_empty() {
                println!("│ (no case results recorded)                                  │");
            }

            println!("└─────────────────────────────────────────────────────────────┘");
        }

        if let Some(export_path) = &args.export {
            let path = PathBuf::from(export_path);
            storage.export_csv(execution_id, &path)?;
            println!("\n✓ Results exported to: {}", path.display());
        }

        return Ok(());
    }

    // Archive overview
    let entries = storage.list()?;

    if entries.is_empty() {
        println!("\n📭 No stored results found.");
        println!("   Run a suite with: crucible run <suite-id>");
        return Ok(());
    }

    if args.format == "json" {
        let records: Vec<_> = entries.iter().map(|e| &e.record).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        println!("\n┌──────────────────────────────────────────────────────────────────────────┐");
        println!("│ Archived Executions                                                      │");
        println!("├──────────────────────────────────────────────────────────────────────────┤");

        for entry in &entries {
            let passed = entry.results.iter().filter(|r| r.is_success()).count();
            println!(
                "│ {:10} {:8} {:20} {:10} {:3}/{:3} passed │",
                &entry.record.execution_id[..entry.record.execution_id.len().min(10)],
                entry.record.kind.to_string(),
                entry.record.target_name,
                entry.record.status.to_string(),
                passed,
                entry.results.len()
            );
        }

        println!("└──────────────────────────────────────────────────────────────────────────┘");
        println!("\nUse --execution <id> for details, --export <path> for CSV.\n");
    }

    if let Some(export_path) = &args.export {
        let path = PathBuf::from(export_path);
        storage.export_all_csv(&path)?;
        println!("✓ Results exported to: {}", path.display());
    }

    Ok(())
}

fn check_definitions(args: cli::CheckArgs, config: &AppConfig) -> Result<()> {
    let dir = definitions_dir(config, args.dir.as_deref());
    let mut parse_failures = 0usize;

    let suite_dir = dir.join("suites");
    println!("\nChecking suites in {}", suite_dir.display());
    let suite_files = store::definition_files(&suite_dir)?;
    if suite_files.is_empty() {
        println!("  (no definition files)");
    }
    for path in &suite_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match store::parse_definition::<TestSuite>(path) {
            Ok(suite) => {
                let mut warnings = Vec::new();
                if suite.cases.is_empty() {
                    warnings.push("no cases".to_string());
                }
                for case in &suite.cases {
                    if case.command.trim().is_empty() {
                        warnings.push(format!("case '{}' has no command", case.id));
                    }
                }
                if warnings.is_empty() {
                    println!("  ✓ {:30} ({})", name, suite.id);
                } else {
                    println!("  ⚠ {:30} ({}): {}", name, suite.id, warnings.join(", "));
                }
            }
            Err(e) => {
                parse_failures += 1;
                println!("  ✗ {name:30} {e:#}");
            }
        }
    }

    let vault_dir = dir.join("vaults");
    println!("\nChecking vaults in {}", vault_dir.display());
    let vault_files = store::definition_files(&vault_dir)?;
    if vault_files.is_empty() {
        println!("  (no definition files)");
    }
    for path in &vault_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match store::parse_definition::<Vault>(path) {
            Ok(vault) => {
                let mut warnings = Vec::new();
                if vault.phases.is_empty() {
                    warnings.push("no phases".to_string());
                }
                for phase_name in &vault.phases {
                    if !vault.phase_configs.contains_key(phase_name) {
                        warnings.push(format!("phase '{phase_name}' has no configuration"));
                    }
                }
                for (phase_name, phase) in &vault.phase_configs {
                    if phase.cases.is_empty() {
                        warnings.push(format!("phase '{phase_name}' has no cases"));
                    }
                }
                if warnings.is_empty() {
                    println!("  ✓ {:30} ({})", name, vault.id);
                } else {
                    println!("  ⚠ {:30} ({}): {}", name, vault.id, warnings.join(", "));
                }
            }
            Err(e) => {
                parse_failures += 1;
                println!("  ✗ {name:30} {e:#}");
            }
        }
    }

    println!();
    if parse_failures > 0 {
        println!("✗ {parse_failures} definition file(s) failed to parse");
        std::process::exit(1);
    }
    println!("✓ All definition files parsed");
    Ok(())
}
