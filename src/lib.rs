pub mod auditor;
pub mod color;
pub mod config;
pub mod model;
pub mod output;
pub mod refs;
pub mod report;
pub mod scholar;
pub mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use auditor::{Audit, Auditor, AuditOptions, DEFAULT_REPORT};
use clap::{CommandFactory, Parser};
use color::ColorPolicy;
use config::EffectiveConfig;
use model::OutputFormat;
use tracing::info;

#[derive(Debug, clap::Parser)]
#[command(
    name = "site-upkeep",
    version,
    about = "Maintenance jobs for a static site: unused-file audit, citation stats, run status",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    #[arg(long, value_enum, global = true)]
    pub color: Option<ColorPolicy>,

    /// Repository root every job works in.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Audit report location, relative to the root.
    #[arg(long, global = true, default_value = DEFAULT_REPORT)]
    pub report: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Audit site files no page references and write the report.
    Audit {
        /// Exit non-zero when a page references a missing file.
        #[arg(long, default_value_t = false)]
        fail_on_missing: bool,
    },
    /// Delete the safe-delete subset of a fresh audit.
    Prune {
        #[arg(long, default_value_t = false)]
        fix: bool,
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Fetch citation statistics into the site's JSON data.
    Scholar {
        #[arg(long, default_value = scholar::DEFAULT_SCHOLAR_ID)]
        id: String,
        #[arg(long, default_value = scholar::DEFAULT_OUTPUT)]
        output: PathBuf,
        /// Seconds allowed for the whole fetch.
        #[arg(long, default_value_t = scholar::DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Stamp automation run metadata into the status file.
    Status {
        #[arg(long, default_value = status::DEFAULT_STATUS_PATH)]
        path: PathBuf,
        #[arg(long, default_value = status::DEFAULT_TIMEZONE)]
        timezone: String,
    },
    /// Show command help.
    Help {
        command: Option<String>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Help { command }) = &cli.command {
        if let Some(name) = command {
            let mut cmd = Cli::command();
            if let Some(sc) = cmd.find_subcommand_mut(name) {
                sc.print_help().context("failed to print help")?;
                println!();
                return Ok(());
            }
        }
        Cli::command().print_help().context("failed to print help")?;
        println!();
        return Ok(());
    }

    let cfg = EffectiveConfig::load(&cli)?;
    let command = cli.command.unwrap_or(Command::Audit { fail_on_missing: false });

    match command {
        Command::Audit { fail_on_missing } => {
            let audit = run_audit(&cli.root, &cli.report, &cfg)?;
            maybe_fail(&audit, fail_on_missing)
        }
        Command::Prune { fix, yes } => run_prune(&cli.root, &cli.report, &cfg, fix, yes),
        Command::Scholar { id, output, timeout } => run_scholar(&cli.root.join(output), &id, timeout, &cfg),
        Command::Status { path, timezone } => {
            let path = cli.root.join(path);
            let value = status::update_status(&path, &timezone)?;
            output::print_status(&path, &value, &cfg)
        }
        Command::Help { .. } => unreachable!(),
    }
}

fn run_audit(root: &Path, report_rel: &Path, cfg: &EffectiveConfig) -> Result<Audit> {
    let auditor = Auditor::new(AuditOptions::from_config(cfg.clone()))?;
    let audit = auditor.audit(root)?;
    write_and_print(&audit, report_rel, cfg)?;
    Ok(audit)
}

fn run_prune(root: &Path, report_rel: &Path, cfg: &EffectiveConfig, fix: bool, yes: bool) -> Result<()> {
    let auditor = Auditor::new(AuditOptions::from_config(cfg.clone()))?;
    let audit = auditor.audit(root)?;
    write_and_print(&audit, report_rel, cfg)?;
    let summary = auditor.prune(&audit, fix, yes);
    output::print_prune_summary(&summary, cfg)
}

fn write_and_print(audit: &Audit, report_rel: &Path, cfg: &EffectiveConfig) -> Result<()> {
    let report_path = audit.root.join(report_rel);
    let result = audit.report();
    report::write_report(&report_path, &result)?;
    info!(path = %report_path.display(), "report written");
    output::print_audit(&result, &report_path, cfg)
}

fn run_scholar(dest: &Path, id: &str, timeout: u64, cfg: &EffectiveConfig) -> Result<()> {
    match scholar::update_scholar_data(id, dest, Duration::from_secs(timeout)) {
        Ok(data) => output::print_scholar(&data, dest, cfg),
        Err(err) => {
            output::print_scholar_failure(dest, cfg);
            Err(err.context("fetching scholar data"))
        }
    }
}

fn maybe_fail(audit: &Audit, fail_on_missing: bool) -> Result<()> {
    if fail_on_missing && !audit.referenced_missing.is_empty() {
        anyhow::bail!(
            "{} referenced files are missing and --fail-on-missing set",
            audit.referenced_missing.len()
        );
    }
    Ok(())
}
