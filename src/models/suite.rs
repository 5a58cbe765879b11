//! Test suite models
//!
//! Defines suites, test cases, and test kinds.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a test case, selecting the execution path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Unit,
    Integration,
    Performance,
    #[default]
    Generic,
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Unit => "unit",
            TestKind::Integration => "integration",
            TestKind::Performance => "performance",
            TestKind::Generic => "generic",
        }
    }

    /// Parse from string, tolerant of case
    pub fn from_str(s: &str) -> Option<TestKind> {
        match s.to_lowercase().as_str() {
            "unit" => Some(TestKind::Unit),
            "integration" => Some(TestKind::Integration),
            "performance" | "perf" => Some(TestKind::Performance),
            "generic" | "" => Some(TestKind::Generic),
            _ => None,
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single executable test case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: TestKind,
    /// Shell command executed for this case
    #[serde(default)]
    pub command: String,
    /// Per-case deadline; engine default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Wall-clock budget for performance cases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_ms: Option<u64>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            kind: TestKind::Generic,
            command: command.into(),
            timeout_secs: None,
            budget_ms: None,
        }
    }

    pub fn with_kind(mut self, kind: TestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_budget(mut self, ms: u64) -> Self {
        self.budget_ms = Some(ms);
        self
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.kind)
    }
}

/// Ordered collection of test cases executed as one unit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            cases: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} cases)", self.name, self.cases.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(TestKind::from_str("unit"), Some(TestKind::Unit));
        assert_eq!(TestKind::from_str("PERF"), Some(TestKind::Performance));
        assert_eq!(TestKind::from_str("generic"), Some(TestKind::Generic));
        assert_eq!(TestKind::from_str("bogus"), None);
    }

    #[test]
    fn test_kind_default() {
        assert_eq!(TestKind::default(), TestKind::Generic);
    }

    #[test]
    fn test_case_builder() {
        let case = TestCase::new("tc-1", "smoke", "true")
            .with_kind(TestKind::Unit)
            .with_timeout(15);

        assert_eq!(case.kind, TestKind::Unit);
        assert_eq!(case.timeout_secs, Some(15));
        assert!(case.budget_ms.is_none());
    }

    #[test]
    fn test_suite_builder() {
        let suite = TestSuite::new("s-1", "api smoke")
            .with_case(TestCase::new("tc-1", "health", "true"))
            .with_case(TestCase::new("tc-2", "version", "true"));

        assert_eq!(suite.case_count(), 2);
        assert_eq!(suite.cases[0].id, "tc-1");
    }

    #[test]
    fn test_case_deserialize_defaults() {
        let yaml = "id: tc-9\nname: bare\n";
        let case: TestCase = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(case.kind, TestKind::Generic);
        assert!(case.command.is_empty());
        assert!(case.timeout_secs.is_none());
    }
}
