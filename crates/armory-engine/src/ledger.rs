//! Outcome ledger and report rendering
//!
//! One terminal outcome per tool, latest write wins. The rendered report is
//! a stable, grep-friendly artifact: downstream tooling matches on the
//! literal `[STATUS]` tags, so the line format here must not drift.

use std::collections::BTreeMap;
use std::path::PathBuf;

use armory_core::error::Result;
use armory_core::layout::Layout;
use armory_core::utils::host_identity;
use chrono::{DateTime, Utc};
use tracing::info;

/// Terminal status of one tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutcomeStatus {
    /// Functional install completed
    Success,
    /// Something usable was published, but not a functional install
    Partial,
    /// Install failed after retries, or was blocked
    Failed,
    /// Catalog marks the tool as requiring manual installation
    Manual,
}

impl OutcomeStatus {
    /// Literal report tag; downstream greps for these
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Terminal result for one tool
#[derive(Debug, Clone)]
pub struct Outcome {
    pub tool: String,
    pub status: OutcomeStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-status totals for the report trailer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub success: usize,
    pub partial: usize,
    pub failed: usize,
    pub manual: usize,
}

/// Tool name to current outcome, insertion-independent ordering
#[derive(Debug, Default)]
pub struct OutcomeLedger {
    entries: BTreeMap<String, Outcome>,
}

impl OutcomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current outcome for a tool; overwrites any earlier one
    pub fn record(&mut self, tool: &str, status: OutcomeStatus, reason: impl Into<String>) {
        let reason = reason.into();
        info!(tool, status = status.tag(), %reason, "recording outcome");
        self.entries.insert(
            tool.to_string(),
            Outcome {
                tool: tool.to_string(),
                status,
                reason,
                timestamp: Utc::now(),
            },
        );
    }

    pub fn current(&self, tool: &str) -> Option<&Outcome> {
        self.entries.get(tool)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outcome> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for outcome in self.entries.values() {
            match outcome.status {
                OutcomeStatus::Success => counts.success += 1,
                OutcomeStatus::Partial => counts.partial += 1,
                OutcomeStatus::Failed => counts.failed += 1,
                OutcomeStatus::Manual => counts.manual += 1,
            }
        }
        counts
    }

    /// Whether the run should exit nonzero
    pub fn has_failures(&self) -> bool {
        self.entries
            .values()
            .any(|o| o.status == OutcomeStatus::Failed)
    }

    /// Tools whose outcome warrants operator attention
    pub fn attention_reasons(&self) -> Vec<&Outcome> {
        self.entries
            .values()
            .filter(|o| matches!(o.status, OutcomeStatus::Partial | OutcomeStatus::Manual))
            .collect()
    }

    /// Render the report artifact
    pub fn render_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Armory provisioning report\n");
        report.push_str(&format!(
            "Generated: {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%:z")
        ));
        report.push_str(&format!("Host: {}\n\n", host_identity()));

        for outcome in self.entries.values() {
            report.push_str(&format!(
                "[{}] {}: {}\n",
                outcome.status.tag(),
                outcome.tool,
                outcome.reason
            ));
        }

        let counts = self.counts();
        report.push_str("\nTotals:\n");
        report.push_str(&format!("  SUCCESS: {}\n", counts.success));
        report.push_str(&format!("  PARTIAL: {}\n", counts.partial));
        report.push_str(&format!("  FAILED: {}\n", counts.failed));
        report.push_str(&format!("  MANUAL: {}\n", counts.manual));
        report
    }

    /// Write the report to a timestamped file under the reports directory
    pub fn write_report(&self, layout: &Layout) -> Result<PathBuf> {
        let dir = layout.reports_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!(
            "report-{}.txt",
            Utc::now().format("%Y%m%d-%H%M%S")
        ));
        std::fs::write(&path, self.render_report())?;
        Ok(path)
    }
}

/// Most recently written report artifact, if any
pub fn latest_report(layout: &Layout) -> Result<Option<PathBuf>> {
    let dir = layout.reports_dir();
    if !dir.exists() {
        return Ok(None);
    }

    let mut reports: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().starts_with("report-"))
                .unwrap_or(false)
        })
        .collect();

    // Timestamped names sort chronologically
    reports.sort();
    Ok(reports.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_one_current_outcome_per_tool() {
        let mut ledger = OutcomeLedger::new();
        ledger.record("alpha", OutcomeStatus::Partial, "cloned only");
        ledger.record("alpha", OutcomeStatus::Success, "built via make");
        ledger.record("beta", OutcomeStatus::Failed, "exit code 2");

        assert_eq!(ledger.len(), 2);
        assert_eq!(
            ledger.current("alpha").unwrap().status,
            OutcomeStatus::Success
        );
        assert_eq!(ledger.current("alpha").unwrap().reason, "built via make");
    }

    #[test]
    fn test_counts_by_status() {
        let mut ledger = OutcomeLedger::new();
        ledger.record("a", OutcomeStatus::Success, "ok");
        ledger.record("b", OutcomeStatus::Success, "ok");
        ledger.record("c", OutcomeStatus::Partial, "documentation only");
        ledger.record("d", OutcomeStatus::Manual, "requires manual install");

        let counts = ledger.counts();
        assert_eq!(counts.success, 2);
        assert_eq!(counts.partial, 1);
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.manual, 1);
        assert!(!ledger.has_failures());
    }

    #[test]
    fn test_report_format_is_grep_friendly() {
        let mut ledger = OutcomeLedger::new();
        ledger.record("nmap", OutcomeStatus::Success, "installed via system package");
        ledger.record("alpha", OutcomeStatus::Failed, "exit code 1 after 3 attempts");

        let report = ledger.render_report();
        assert!(report.contains("[SUCCESS] nmap: installed via system package"));
        assert!(report.contains("[FAILED] alpha: exit code 1 after 3 attempts"));
        assert!(report.contains("Host: "));
        assert!(report.contains("  SUCCESS: 1"));
        assert!(report.contains("  FAILED: 1"));
    }

    #[test]
    fn test_attention_reasons_lists_partial_and_manual() {
        let mut ledger = OutcomeLedger::new();
        ledger.record("a", OutcomeStatus::Success, "ok");
        ledger.record("b", OutcomeStatus::Partial, "documentation only");
        ledger.record("c", OutcomeStatus::Manual, "license acceptance required");

        let attention = ledger.attention_reasons();
        assert_eq!(attention.len(), 2);
        assert!(attention.iter().all(|o| o.status != OutcomeStatus::Success));
    }

    #[test]
    fn test_write_and_find_latest_report() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("armory"));

        let mut ledger = OutcomeLedger::new();
        ledger.record("alpha", OutcomeStatus::Success, "ok");
        let written = ledger.write_report(&layout).unwrap();

        let found = latest_report(&layout).unwrap().unwrap();
        assert_eq!(found, written);
        assert!(std::fs::read_to_string(found)
            .unwrap()
            .contains("[SUCCESS] alpha: ok"));
    }

    #[test]
    fn test_latest_report_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("armory"));
        assert!(latest_report(&layout).unwrap().is_none());
    }
}
