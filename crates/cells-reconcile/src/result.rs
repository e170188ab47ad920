//! Reconciliation run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Group-region validation only, nothing removed
    Quick,
    /// All passes, repairing
    Full,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Quick => write!(f, "quick"),
            ReconcileMode::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    GroupRegions,
    OrphanedLinks,
    Ownership,
    Ungrouped,
    DoorResync,
}

/// A single observation made during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub pass: Pass,
    pub message: String,
}

/// Immutable summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    valid_regions: usize,
    invalid_regions: usize,
    orphaned_links: usize,
    ownership_anomalies: usize,
    ungrouped_suggestions: usize,
    door_resyncs: usize,
    findings: Vec<Finding>,
    elapsed: Duration,
    mode: ReconcileMode,
    completed_at: DateTime<Utc>,
}

impl ReconciliationResult {
    /// Group regions that exist in the marketplace.
    pub fn valid_regions(&self) -> usize {
        self.valid_regions
    }

    /// Group regions that no longer exist. Removed in full mode.
    pub fn invalid_regions(&self) -> usize {
        self.invalid_regions
    }

    pub fn orphaned_links(&self) -> usize {
        self.orphaned_links
    }

    pub fn ownership_anomalies(&self) -> usize {
        self.ownership_anomalies
    }

    pub fn ungrouped_suggestions(&self) -> usize {
        self.ungrouped_suggestions
    }

    pub fn door_resyncs(&self) -> usize {
        self.door_resyncs
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Anything that was repaired or needs attention.
    pub fn has_issues(&self) -> bool {
        self.invalid_regions > 0
            || self.orphaned_links > 0
            || self.ownership_anomalies > 0
            || self.ungrouped_suggestions > 0
            || !self.findings.is_empty()
    }

    /// Sum of repaired and reported items.
    pub fn total(&self) -> usize {
        self.invalid_regions + self.orphaned_links + self.ownership_anomalies + self.ungrouped_suggestions
    }
}

impl fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sync: {} valid, {} invalid regions, {} orphaned links, {} ownership anomalies, {} suggestions, {} door resyncs in {}ms",
            self.mode,
            self.valid_regions,
            self.invalid_regions,
            self.orphaned_links,
            self.ownership_anomalies,
            self.ungrouped_suggestions,
            self.door_resyncs,
            self.elapsed.as_millis()
        )
    }
}

/// Accumulates counts while passes run.
#[derive(Debug)]
pub(crate) struct ResultBuilder {
    pub(crate) valid_regions: usize,
    pub(crate) invalid_regions: usize,
    pub(crate) orphaned_links: usize,
    pub(crate) ownership_anomalies: usize,
    pub(crate) ungrouped_suggestions: usize,
    pub(crate) door_resyncs: usize,
    findings: Vec<Finding>,
    mode: ReconcileMode,
}

impl ResultBuilder {
    pub(crate) fn new(mode: ReconcileMode) -> Self {
        Self {
            valid_regions: 0,
            invalid_regions: 0,
            orphaned_links: 0,
            ownership_anomalies: 0,
            ungrouped_suggestions: 0,
            door_resyncs: 0,
            findings: Vec::new(),
            mode,
        }
    }

    pub(crate) fn finding(&mut self, pass: Pass, message: impl Into<String>) {
        self.findings.push(Finding {
            pass,
            message: message.into(),
        });
    }

    pub(crate) fn build(self, elapsed: Duration, completed_at: DateTime<Utc>) -> ReconciliationResult {
        ReconciliationResult {
            valid_regions: self.valid_regions,
            invalid_regions: self.invalid_regions,
            orphaned_links: self.orphaned_links,
            ownership_anomalies: self.ownership_anomalies,
            ungrouped_suggestions: self.ungrouped_suggestions,
            door_resyncs: self.door_resyncs,
            findings: self.findings,
            elapsed,
            mode: self.mode,
            completed_at,
        }
    }
}
