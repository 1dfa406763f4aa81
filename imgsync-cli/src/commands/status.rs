//! `imgsync status`: lock, canonical and staging visibility for a namespace.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use imgsync_core::{ConfigFile, Namespace, PublishConfig};
use imgsync_publish::{lock, CanonicalReconciler, LockState, StagingArea};

use super::{parse_namespace, ConfigArgs};

/// Arguments for `imgsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Collection namespace.
    pub namespace: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let namespace = parse_namespace(&self.namespace)?;
        let config = self.config.resolve(ConfigFile::default())?;

        let report = build_report(&config, &namespace)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    namespace: String,
    lock: &'static str,
    holder_pid: Option<u32>,
    held_since: Option<String>,
    canonical_slots: usize,
    staging_entries: usize,
}

impl StatusReport {
    /// Leftover staging with no run holding the lock means a run was killed.
    fn interrupted(&self) -> bool {
        self.staging_entries > 0 && self.lock != "held"
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "namespace")]
    namespace: String,
    #[tabled(rename = "lock")]
    lock: String,
    #[tabled(rename = "holder")]
    holder: String,
    #[tabled(rename = "canonical slots")]
    canonical_slots: usize,
    #[tabled(rename = "staging entries")]
    staging_entries: usize,
}

fn build_report(config: &PublishConfig, namespace: &Namespace) -> Result<StatusReport> {
    let state = lock::inspect(&config.lock_root, namespace)
        .with_context(|| format!("failed to inspect lock for '{namespace}'"))?;
    let canonical_slots = CanonicalReconciler::new(config.canonical_dir(namespace))
        .slot_count()
        .context("failed to count canonical slots")?;
    let staging_entries = StagingArea::new(config.staging_dir(namespace))
        .entry_count()
        .context("failed to count staging entries")?;

    let (lock, holder_pid, held_since) = match state {
        LockState::Free => ("free", None, None),
        LockState::Held(info) => ("held", Some(info.pid), Some(info.started_at.to_rfc3339())),
        LockState::Orphaned { .. } => ("orphaned", None, None),
    };

    Ok(StatusReport {
        namespace: namespace.to_string(),
        lock,
        holder_pid,
        held_since,
        canonical_slots,
        staging_entries,
    })
}

fn print_table(report: &StatusReport) {
    let holder = match (report.holder_pid, &report.held_since) {
        (Some(pid), Some(since)) => format!("pid {pid} since {since}"),
        _ => "-".to_string(),
    };
    let row = StatusTableRow {
        namespace: report.namespace.clone(),
        lock: format!("{} {}", lock_indicator(report.lock), report.lock.to_uppercase()),
        holder,
        canonical_slots: report.canonical_slots,
        staging_entries: report.staging_entries,
    };
    let mut table = Table::new([row]);
    table.with(Style::rounded());
    println!("{table}");

    if report.lock == "orphaned" {
        println!(
            "{} lock directory has no readable marker; run 'imgsync unlock {}' once no run is active.",
            "!".red().bold(),
            report.namespace
        );
    }
    if report.interrupted() {
        println!(
            "{} {} staging entries left by an interrupted run; the next run discards them.",
            "!".yellow().bold(),
            report.staging_entries
        );
    }
}

fn lock_indicator(lock: &str) -> String {
    match lock {
        "free" => "■".green().bold().to_string(),
        "held" => "■".yellow().bold().to_string(),
        _ => "■".red().bold().to_string(),
    }
}
