use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::color::Paint;
use crate::config::EffectiveConfig;
use crate::model::{OutputFormat, PruneSummary, Report};
use crate::scholar::ScholarData;

fn paint(cfg: &EffectiveConfig) -> Paint {
    Paint::new(cfg.color)
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

pub fn print_audit(report: &Report, report_path: &Path, cfg: &EffectiveConfig) -> Result<()> {
    if cfg.format == OutputFormat::Json {
        return emit_json(serde_json::json!({
            "report": report_path,
            "entrypoints": report.entrypoints_count,
            "inventory": report.inventory_files_count,
            "referencedMissing": report.referenced_missing_count,
            "unusedCandidates": report.unused_candidates_count,
            "unusedCandidatesBytes": report.unused_candidates_total_bytes,
            "safeDelete": report.safe_delete_count,
            "safeDeleteBytes": report.safe_delete_total_bytes,
        }));
    }

    for line in audit_lines(report, report_path, paint(cfg)) {
        println!("{line}");
    }
    Ok(())
}

fn audit_lines(report: &Report, report_path: &Path, p: Paint) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", p.heading("Wrote report:"), p.path(&report_path.display().to_string())),
        format!("Entrypoints: {}", report.entrypoints_count),
        format!("Inventory files: {}", report.inventory_files_count),
        format!(
            "Unused candidates: {} ({} bytes)",
            p.warn(&report.unused_candidates_count.to_string()),
            report.unused_candidates_total_bytes
        ),
        format!(
            "Safe delete: {} ({} bytes)",
            p.good(&report.safe_delete_count.to_string()),
            report.safe_delete_total_bytes
        ),
    ];
    if report.referenced_missing_count > 0 {
        lines.push(format!(
            "Referenced but missing: {}",
            p.bad(&report.referenced_missing_count.to_string())
        ));
    }
    lines
}

pub fn print_prune_summary(summary: &PruneSummary, cfg: &EffectiveConfig) -> Result<()> {
    if cfg.format == OutputFormat::Json {
        return emit_json(serde_json::json!({
            "planned": summary.planned,
            "removed": summary.removed,
            "failed": summary.failed,
            "dryRun": summary.dry_run,
        }));
    }

    let p = paint(cfg);
    println!(
        "{} planned={} removed={} failed={} dry_run={}",
        p.heading("Prune summary"),
        summary.planned,
        summary.removed,
        summary.failed,
        summary.dry_run
    );
    Ok(())
}

pub fn print_scholar(data: &ScholarData, output: &Path, cfg: &EffectiveConfig) -> Result<()> {
    if cfg.format == OutputFormat::Json {
        return emit_json(serde_json::json!({
            "output": output,
            "data": data,
        }));
    }

    let p = paint(cfg);
    println!("{} {}", p.heading("Scholar data saved to"), p.path(&output.display().to_string()));
    println!("  Total citations: {}", data.total_citations);
    println!("  h-index: {}", data.h_index);
    println!("  Publications: {}", serde_json::to_string(&data.publications_per_year)?);
    println!("  Citations/year: {}", serde_json::to_string(&data.citations_per_year)?);
    Ok(())
}

pub fn print_scholar_failure(output: &Path, cfg: &EffectiveConfig) {
    let p = paint(cfg);
    eprintln!(
        "{} keeping existing data at {} if available",
        p.bad("Scholar fetch failed;"),
        output.display()
    );
}

pub fn print_status(path: &Path, value: &Value, cfg: &EffectiveConfig) -> Result<()> {
    if cfg.format == OutputFormat::Json {
        return emit_json(serde_json::json!({ "path": path, "status": value }));
    }

    let p = paint(cfg);
    println!(
        "{} {} (lastRunUtc {})",
        p.heading("Updated"),
        p.path(&path.display().to_string()),
        value["lastRunUtc"].as_str().unwrap_or("?")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NOTES;

    fn report(missing: usize) -> Report {
        Report {
            entrypoints_count: 3,
            referenced_files_count: 10,
            referenced_missing_count: missing,
            referenced_missing: (0..missing).map(|i| format!("gone{i}.pdf")).collect(),
            inventory_files_count: 20,
            unused_candidates_count: 4,
            unused_candidates_total_bytes: 4096,
            unused_candidates: vec![],
            safe_delete_count: 1,
            safe_delete_total_bytes: 12,
            safe_delete: vec![],
            notes: NOTES.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn plain_summary_lines() {
        let lines = audit_lines(&report(0), Path::new("reports/unused-site-files.json"), Paint::plain());
        assert_eq!(
            lines,
            vec![
                "Wrote report: reports/unused-site-files.json",
                "Entrypoints: 3",
                "Inventory files: 20",
                "Unused candidates: 4 (4096 bytes)",
                "Safe delete: 1 (12 bytes)",
            ]
        );
    }

    #[test]
    fn missing_references_add_a_line() {
        let lines = audit_lines(&report(2), Path::new("r.json"), Paint::plain());
        assert_eq!(lines.last().map(String::as_str), Some("Referenced but missing: 2"));
    }
}
