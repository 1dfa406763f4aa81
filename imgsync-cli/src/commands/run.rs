//! `imgsync run`: one publish run for a namespace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use imgsync_core::{AmbiguityPolicy, ConfigFile, PublishAction, StagingConflictPolicy, TransferKind};
use imgsync_publish::{OutcomeStatus, Pipeline, RunReport};

use super::{parse_namespace, ConfigArgs};
use crate::logging;

/// Arguments for `imgsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source root holding namespace collections.
    pub source: PathBuf,

    /// Collection namespace, e.g. `ark12345`.
    pub namespace: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Stage and classify only; transfer and commit nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Pick the first match when a whitelist pattern matches several files.
    #[arg(long)]
    pub lenient: bool,

    /// Report and skip staging collisions instead of aborting.
    #[arg(long)]
    pub skip_conflicts: bool,

    /// Transfer collaborator.
    #[arg(long, value_name = "rsync|copy")]
    pub transfer: Option<TransferKind>,

    /// Also append log output to this file (rotated at 10 MiB).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let namespace = parse_namespace(&self.namespace)?;
        let config = self.config.resolve(ConfigFile {
            ambiguity: self.lenient.then_some(AmbiguityPolicy::Lenient),
            staging_conflict: self.skip_conflicts.then_some(StagingConflictPolicy::Skip),
            transfer: self.transfer,
            log_file: self.log_file.clone(),
            ..Default::default()
        })?;
        logging::init(config.log_file.as_deref());

        let pipeline = Pipeline::from_config(config);
        let report = pipeline
            .run(&self.source, &namespace, self.dry_run)
            .with_context(|| format!("run failed for namespace '{namespace}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let elapsed = report.finished_at - report.started_at;

    if report.artifacts.is_empty() && report.skipped_objects.is_empty() {
        println!("{prefix}✓ '{}': nothing to do", report.namespace);
        return;
    }

    println!(
        "{prefix}✓ '{}' ({} added, {} updated, {} unchanged, {} skipped) in {}ms",
        report.namespace,
        report.added(),
        report.updated(),
        report.unchanged(),
        report.skipped_objects.len(),
        elapsed.num_milliseconds(),
    );

    for outcome in &report.artifacts {
        let (marker, verb) = match (outcome.status, outcome.action) {
            (OutcomeStatus::Unchanged, _) => ("·", "noop".to_string()),
            (OutcomeStatus::Planned, action) => ("~", format!("would {action}")),
            (OutcomeStatus::Published, PublishAction::Update) => ("↻", "update".to_string()),
            (OutcomeStatus::Published, action) => ("+", action.to_string()),
        };
        println!(
            "  {marker}  {:<14} {}  <- {}",
            verb,
            outcome.key,
            outcome.artifact.display()
        );
    }
    for conflict in &report.conflicts {
        println!(
            "  !  conflict       {}  <- {} (kept {})",
            conflict.key,
            conflict.artifact.display(),
            conflict.staged.display()
        );
    }
    for object in &report.skipped_objects {
        println!("  -  skipped        {}", object.display());
    }
}
