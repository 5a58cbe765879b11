//! File-backed stores
//!
//! Definition files (YAML or JSON) and a JSON-per-execution results
//! archive with CSV export.

#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::models::{ExecutionRecord, ExecutionStatus, TestResult, TestSuite, Vault};

use super::{ResultStore, SuiteStore, VaultStore};

const DEFINITION_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

fn has_definition_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DEFINITION_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Every definition file in a directory, sorted by name
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| has_definition_extension(path))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Parse one definition file, dispatching on the extension
pub fn parse_definition<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if is_yaml(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))
    }
}

/// Load every parseable definition in a directory
fn scan_definitions<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !has_definition_extension(&path) {
            continue;
        }
        match parse_definition(&path) {
            Ok(item) => items.push(item),
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(items)
}

/// Suite definitions read from `<dir>/<id>.{yaml,yml,json}`
pub struct FileSuiteStore {
    dir: PathBuf,
}

impl FileSuiteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn find(&self, suite_id: &str) -> Result<Option<TestSuite>> {
        for ext in DEFINITION_EXTENSIONS {
            let path = self.dir.join(format!("{suite_id}.{ext}"));
            if path.exists() {
                return parse_definition(&path).map(Some);
            }
        }
        // filename and id may differ; fall back to a directory scan
        let all: Vec<TestSuite> = scan_definitions(&self.dir)?;
        Ok(all.into_iter().find(|s| s.id == suite_id))
    }
}

#[async_trait::async_trait]
impl SuiteStore for FileSuiteStore {
    async fn get_suite(&self, suite_id: &str) -> Result<Option<TestSuite>> {
        self.find(suite_id)
    }

    async fn list_suites(&self) -> Result<Vec<TestSuite>> {
        let mut suites: Vec<TestSuite> = scan_definitions(&self.dir)?;
        suites.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(suites)
    }
}

/// Vault definitions read from `<dir>/<id>.{yaml,yml,json}`
pub struct FileVaultStore {
    dir: PathBuf,
}

impl FileVaultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn find(&self, vault_id: &str) -> Result<Option<Vault>> {
        for ext in DEFINITION_EXTENSIONS {
            let path = self.dir.join(format!("{vault_id}.{ext}"));
            if path.exists() {
                return parse_definition(&path).map(Some);
            }
        }
        let all: Vec<Vault> = scan_definitions(&self.dir)?;
        Ok(all.into_iter().find(|v| v.id == vault_id))
    }
}

#[async_trait::async_trait]
impl VaultStore for FileVaultStore {
    async fn get_vault(&self, vault_id: &str) -> Result<Option<Vault>> {
        self.find(vault_id)
    }

    async fn list_vaults(&self) -> Result<Vec<Vault>> {
        let mut vaults: Vec<Vault> = scan_definitions(&self.dir)?;
        vaults.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(vaults)
    }
}

/// Archived execution: the row plus every result it produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredExecution {
    pub record: ExecutionRecord,
    #[serde(default)]
    pub results: Vec<TestResult>,
}

/// One pretty-printed JSON document per execution
///
/// Results are appended to the in-memory entry and the whole document is
/// rewritten, so the file on disk is always complete.
pub struct JsonResultStore {
    base_dir: PathBuf,
    pending: Mutex<HashMap<String, StoredExecution>>,
}

impl JsonResultStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Archive under the platform data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crucible")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn execution_path(&self, execution_id: &str) -> PathBuf {
        self.base_dir.join(format!("{execution_id}.json"))
    }

    fn write_entry(&self, entry: &StoredExecution) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).context("Failed to create results directory")?;
        let path = self.execution_path(&entry.record.execution_id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, entry).context("Failed to write results")?;
        Ok(path)
    }

    /// Load one archived execution
    pub fn load(&self, execution_id: &str) -> Result<StoredExecution> {
        let path = self.execution_path(execution_id);
        let file = File::open(&path)
            .with_context(|| format!("No archived execution at {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Failed to parse archived execution")
    }

    /// All archived executions, newest first
    pub fn list(&self) -> Result<Vec<StoredExecution>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.base_dir)? {
            let path = dir_entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match File::open(&path)
                    .map(BufReader::new)
                    .map_err(anyhow::Error::from)
                    .and_then(|r| serde_json::from_reader(r).map_err(anyhow::Error::from))
                {
                    Ok(entry) => entries.push(entry),
                    Err(e) => debug!("Skipping {}: {}", path.display(), e),
                }
            }
        }

        entries.sort_by(|a: &StoredExecution, b: &StoredExecution| {
            b.record.started_at.cmp(&a.record.started_at)
        });
        Ok(entries)
    }

    /// Remove one archived execution
    pub fn delete(&self, execution_id: &str) -> Result<()> {
        let path = self.execution_path(execution_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted archived execution {}", execution_id);
        }
        let mut pending = self.pending.lock().expect("result store lock poisoned");
        pending.remove(execution_id);
        Ok(())
    }

    /// Write one execution's results as CSV
    pub fn export_csv(&self, execution_id: &str, path: &Path) -> Result<()> {
        let entry = self.load(execution_id)?;
        let mut writer = csv::Writer::from_path(path).context("Failed to create CSV file")?;
        write_csv_rows(&mut writer, &entry)?;
        writer.flush()?;
        info!("Exported results to {}", path.display());
        Ok(())
    }

    /// Write every archived execution into one CSV
    pub fn export_all_csv(&self, path: &Path) -> Result<()> {
        let entries = self.list()?;
        let mut writer = csv::Writer::from_path(path).context("Failed to create CSV file")?;
        for entry in &entries {
            write_csv_rows(&mut writer, entry)?;
        }
        writer.flush()?;
        info!("Exported {} executions to {}", entries.len(), path.display());
        Ok(())
    }

    fn entry_for_update(&self, execution_id: &str) -> Result<StoredExecution> {
        let pending = self.pending.lock().expect("result store lock poisoned");
        if let Some(entry) = pending.get(execution_id) {
            return Ok(entry.clone());
        }
        drop(pending);
        // the row may predate this process
        self.load(execution_id)
            .map_err(|_| anyhow!("no execution row for {execution_id}"))
    }
}

fn write_csv_rows(writer: &mut csv::Writer<File>, entry: &StoredExecution) -> Result<()> {
    if writer.get_ref().metadata().map(|m| m.len() == 0).unwrap_or(true) {
        writer.write_record([
            "execution_id",
            "target",
            "case_id",
            "case_name",
            "status",
            "duration_ms",
            "error",
        ])?;
    }
    for result in &entry.results {
        writer.write_record([
            result.execution_id.clone(),
            entry.record.target_name.clone(),
            result.case_id.clone(),
            result.case_name.clone(),
            result.status.to_string(),
            result.duration_ms.to_string(),
            result.error.clone().unwrap_or_default(),
        ])?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ResultStore for JsonResultStore {
    async fn store_execution(&self, record: &ExecutionRecord) -> Result<()> {
        let entry = StoredExecution {
            record: record.clone(),
            results: Vec::new(),
        };
        self.write_entry(&entry)?;
        let mut pending = self.pending.lock().expect("result store lock poisoned");
        pending.insert(record.execution_id.clone(), entry);
        Ok(())
    }

    async fn store_result(&self, result: &TestResult) -> Result<()> {
        let mut entry = self.entry_for_update(&result.execution_id)?;
        entry.results.push(result.clone());
        self.write_entry(&entry)?;
        let mut pending = self.pending.lock().expect("result store lock poisoned");
        pending.insert(result.execution_id.clone(), entry);
        Ok(())
    }

    async fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut entry = self.entry_for_update(execution_id)?;
        entry.record.status = status;
        entry.record.error = error.map(String::from);
        if status.is_terminal() {
            entry.record.completed_at = Some(Utc::now());
        }
        self.write_entry(&entry)?;

        let mut pending = self.pending.lock().expect("result store lock poisoned");
        if status.is_terminal() {
            // the archive file stays; only the working entry is dropped
            pending.remove(execution_id);
        } else {
            pending.insert(execution_id.to_string(), entry);
        }
        Ok(())
    }
}
