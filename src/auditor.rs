use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{EffectiveConfig, SafeDeleteRule};
use crate::model::{Classification, FileRecord, PruneSummary, Report};
use crate::refs::{extract_css_refs, extract_html_refs, normalize_ref, repo_relative, resolve_ref};
use crate::report;

pub const DEFAULT_REPORT: &str = "reports/unused-site-files.json";

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub root_document: String,
    pub site_dir: String,
    pub inventory_dirs: Vec<String>,
    pub inventory_files: Vec<String>,
    pub extra_inventory_globs: Vec<String>,
    pub root_prefixes: Vec<String>,
    pub reference_attrs: Vec<String>,
    pub allowlist: Vec<String>,
    pub safe_delete: Vec<SafeDeleteRule>,
}

impl AuditOptions {
    pub fn from_config(cfg: EffectiveConfig) -> Self {
        Self {
            root_document: cfg.root_document,
            site_dir: cfg.site_dir,
            inventory_dirs: cfg.inventory_dirs,
            inventory_files: cfg.inventory_files,
            extra_inventory_globs: cfg.extra_inventory_globs,
            root_prefixes: cfg.root_prefixes,
            reference_attrs: cfg.reference_attrs,
            allowlist: cfg.allowlist,
            safe_delete: cfg.safe_delete,
        }
    }
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self::from_config(EffectiveConfig::default())
    }
}

/// One snapshot of the reference graph against the file tree.
#[derive(Debug, Clone)]
pub struct Audit {
    /// Canonical repository root.
    pub root: PathBuf,
    pub entrypoints: Vec<PathBuf>,
    pub referenced: BTreeSet<String>,
    pub referenced_missing: BTreeSet<String>,
    /// Inventory sorted by path, each with its classification.
    pub files: Vec<(FileRecord, Classification)>,
}

impl Audit {
    pub fn candidates(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|(_, c)| c.is_candidate()).map(|(f, _)| f)
    }

    pub fn safe_delete(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|(_, c)| c.is_safe_delete()).map(|(f, _)| f)
    }

    pub fn report(&self) -> Report {
        let unused: Vec<FileRecord> = self.candidates().cloned().collect();
        let safe: Vec<FileRecord> = self.safe_delete().cloned().collect();
        Report {
            entrypoints_count: self.entrypoints.len(),
            referenced_files_count: self.referenced.len(),
            referenced_missing_count: self.referenced_missing.len(),
            referenced_missing: self.referenced_missing.iter().cloned().collect(),
            inventory_files_count: self.files.len(),
            unused_candidates_count: unused.len(),
            unused_candidates_total_bytes: unused.iter().map(|f| f.size).sum(),
            unused_candidates: unused,
            safe_delete_count: safe.len(),
            safe_delete_total_bytes: safe.iter().map(|f| f.size).sum(),
            safe_delete: safe,
            notes: report::NOTES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Auditor {
    opts: AuditOptions,
    allowlist: HashSet<String>,
    extra_roots: GlobSet,
    safe_rules: Vec<(String, GlobMatcher)>,
}

impl Auditor {
    pub fn new(opts: AuditOptions) -> Result<Self> {
        let extra_roots = build_globset(&opts.extra_inventory_globs)?;
        let mut safe_rules = Vec::with_capacity(opts.safe_delete.len());
        for rule in &opts.safe_delete {
            let glob = GlobBuilder::new(&rule.glob)
                .case_insensitive(rule.case_insensitive)
                .build()
                .with_context(|| format!("invalid safe_delete glob for {}: {}", rule.name, rule.glob))?;
            safe_rules.push((rule.name.clone(), glob.compile_matcher()));
        }
        let allowlist = opts.allowlist.iter().cloned().collect();
        Ok(Self {
            opts,
            allowlist,
            extra_roots,
            safe_rules,
        })
    }

    pub fn audit(&self, root: &Path) -> Result<Audit> {
        let root = fs::canonicalize(root)
            .or_else(|_| std::path::absolute(root))
            .with_context(|| format!("failed resolving root {}", root.display()))?;

        let entrypoints = self.discover_entrypoints(&root);
        let mut graph = RefGraph::default();
        let mut stylesheets: BTreeSet<PathBuf> = BTreeSet::new();

        for page in &entrypoints {
            let Some(text) = read_lossy(page) else {
                continue;
            };
            for raw in extract_html_refs(&text, &self.opts.reference_attrs) {
                if let Some((rel, resolved, exists)) = self.follow(&root, page, &raw) {
                    if exists && rel.to_ascii_lowercase().ends_with(".css") {
                        stylesheets.insert(resolved);
                    }
                    graph.record(rel, exists);
                }
            }
        }

        for css in &stylesheets {
            let Some(text) = read_lossy(css) else {
                continue;
            };
            for raw in extract_css_refs(&text) {
                if let Some((rel, _, exists)) = self.follow(&root, css, &raw) {
                    graph.record(rel, exists);
                }
            }
        }

        let inventory = self.inventory(&root);
        let files: Vec<(FileRecord, Classification)> = inventory
            .into_iter()
            .map(|record| {
                let class = self.classify(&record, &graph.referenced);
                (record, class)
            })
            .collect();

        info!(
            entrypoints = entrypoints.len(),
            referenced = graph.referenced.len(),
            missing = graph.missing.len(),
            inventory = files.len(),
            "audit complete"
        );

        Ok(Audit {
            root,
            entrypoints,
            referenced: graph.referenced,
            referenced_missing: graph.missing,
            files,
        })
    }

    /// Deletes the safe-delete subset of `audit`. Nothing is touched unless
    /// both `fix` and `yes` are set.
    pub fn prune(&self, audit: &Audit, fix: bool, yes: bool) -> PruneSummary {
        let targets: Vec<&FileRecord> = audit.safe_delete().collect();
        let planned = targets.len();

        if !fix {
            return PruneSummary {
                planned,
                removed: 0,
                failed: 0,
                dry_run: true,
            };
        }

        if !yes {
            warn!("refusing to delete files without --yes");
            return PruneSummary {
                planned,
                removed: 0,
                failed: 0,
                dry_run: true,
            };
        }

        let mut removed = 0usize;
        let mut failed = 0usize;
        for record in targets {
            let path = audit.root.join(&record.path);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %record.path, "removed");
                    removed += 1;
                }
                Err(err) => {
                    warn!(path = %record.path, error = %err, "failed to remove");
                    failed += 1;
                }
            }
        }

        PruneSummary {
            planned,
            removed,
            failed,
            dry_run: false,
        }
    }

    fn discover_entrypoints(&self, root: &Path) -> Vec<PathBuf> {
        let mut entrypoints = Vec::new();
        let root_doc = root.join(&self.opts.root_document);
        if root_doc.exists() {
            entrypoints.push(root_doc);
        }

        let mut pages: Vec<PathBuf> = WalkDir::new(root.join(&self.opts.site_dir))
            .into_iter()
            .filter_map(Result::ok)
            .map(walkdir::DirEntry::into_path)
            .filter(|p| p.is_file() && p.to_string_lossy().ends_with(".html"))
            .collect();
        pages.sort();
        entrypoints.extend(pages);
        entrypoints
    }

    /// Normalizes and resolves `raw` as seen from `base`. Returns the
    /// repo-relative path, the resolved location and whether it exists.
    fn follow(&self, root: &Path, base: &Path, raw: &str) -> Option<(String, PathBuf, bool)> {
        let norm = normalize_ref(raw)?;
        let Some(resolved) = resolve_ref(root, base, &norm, &self.opts.root_prefixes) else {
            debug!(reference = raw, from = %base.display(), "reference leaves the repository");
            return None;
        };
        let rel = repo_relative(root, &resolved)?;
        let exists = resolved.exists();
        Some((rel, resolved, exists))
    }

    fn inventory(&self, root: &Path) -> Vec<FileRecord> {
        let mut seen: BTreeMap<String, u64> = BTreeMap::new();

        let named = self.opts.inventory_dirs.iter().chain(&self.opts.inventory_files);
        for name in named {
            collect_files(root, &root.join(name), &mut seen);
        }

        if !self.opts.extra_inventory_globs.is_empty() {
            match fs::read_dir(root) {
                Ok(entries) => {
                    for ent in entries.filter_map(Result::ok) {
                        let is_dir = ent.file_type().map(|t| t.is_dir()).unwrap_or(false);
                        if is_dir && self.extra_roots.is_match(ent.file_name()) {
                            collect_files(root, &ent.path(), &mut seen);
                        }
                    }
                }
                Err(err) => debug!(error = %err, "cannot list repository root"),
            }
        }

        seen.into_iter().map(|(path, size)| FileRecord { path, size }).collect()
    }

    fn classify(&self, record: &FileRecord, referenced: &BTreeSet<String>) -> Classification {
        if self.allowlist.contains(&record.path) {
            return Classification::Allowlisted;
        }
        if referenced.contains(&record.path) {
            return Classification::Referenced;
        }
        if self.is_entrypoint_path(&record.path) {
            return Classification::ProtectedEntrypoint;
        }
        let safe_delete = self
            .safe_rules
            .iter()
            .find(|(_, glob)| glob.is_match(&record.path))
            .map(|(name, _)| name.clone());
        Classification::UnusedCandidate { safe_delete }
    }

    fn is_entrypoint_path(&self, path: &str) -> bool {
        if path == self.opts.root_document {
            return true;
        }
        let in_site = path
            .strip_prefix(self.opts.site_dir.as_str())
            .is_some_and(|rest| rest.starts_with('/'));
        in_site && path.to_ascii_lowercase().ends_with(".html")
    }
}

/// Writes the report for a default audit of `repo_root`. A relative
/// `report_path` is taken from the repository root.
pub fn audit(repo_root: &Path, report_path: &Path) -> Result<Report> {
    let auditor = Auditor::new(AuditOptions::default())?;
    let result = auditor.audit(repo_root)?;
    let report = result.report();
    report::write_report(&result.root.join(report_path), &report)?;
    Ok(report)
}

#[derive(Debug, Default)]
struct RefGraph {
    referenced: BTreeSet<String>,
    missing: BTreeSet<String>,
}

impl RefGraph {
    fn record(&mut self, rel: String, exists: bool) {
        if exists {
            self.referenced.insert(rel);
        } else {
            self.missing.insert(rel);
        }
    }
}

fn read_lossy(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "unreadable, contributes no references");
            None
        }
    }
}

fn collect_files(root: &Path, start: &Path, out: &mut BTreeMap<String, u64>) {
    for ent in WalkDir::new(start).into_iter().filter_map(Result::ok) {
        let Ok(meta) = fs::metadata(ent.path()) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        if let Some(rel) = repo_relative(root, ent.path()) {
            out.entry(rel).or_insert(meta.len());
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        b.add(Glob::new(p).with_context(|| format!("invalid glob: {p}"))?);
    }
    b.build().context("failed to build glob set")
}
