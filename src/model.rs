use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// An inventoried on-disk file. `path` is repo-relative with forward slashes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Referenced,
    Allowlisted,
    ProtectedEntrypoint,
    /// Not reached by any reference. `safe_delete` names the rule that marked
    /// it removable, if any.
    UnusedCandidate { safe_delete: Option<String> },
}

impl Classification {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Self::UnusedCandidate { .. })
    }

    pub fn is_safe_delete(&self) -> bool {
        matches!(self, Self::UnusedCandidate { safe_delete: Some(_) })
    }
}

/// On-disk shape of `reports/unused-site-files.json`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub entrypoints_count: usize,
    pub referenced_files_count: usize,
    pub referenced_missing_count: usize,
    pub referenced_missing: Vec<String>,
    pub inventory_files_count: usize,
    pub unused_candidates_count: usize,
    pub unused_candidates_total_bytes: u64,
    pub unused_candidates: Vec<FileRecord>,
    pub safe_delete_count: usize,
    pub safe_delete_total_bytes: u64,
    pub safe_delete: Vec<FileRecord>,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PruneSummary {
    pub planned: usize,
    pub removed: usize,
    pub failed: usize,
    pub dry_run: bool,
}
