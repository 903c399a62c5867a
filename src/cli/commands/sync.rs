//! Sync command implementation.
//!
//! Fetches every configured project (or the one named by `--project`) and
//! prints a per-project summary. Partial success exits zero; the command
//! only fails when every attempted project failed.

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::sync::{SyncEngine, SyncReport};
use colored::Colorize;

/// Execute the sync command.
///
/// # Errors
///
/// Returns config errors, `ProjectNotFound` for an unknown `--project`, or
/// `SyncFailed` when no project could be synced.
pub fn execute(ctx: &Context, project: Option<&str>) -> Result<()> {
    let config = ctx.effective_config()?;
    let client = ctx.client()?;

    let report = SyncEngine::new(&config, &client).sync_all(project)?;

    if ctx.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }

    if report.synced.is_empty() && !report.failed.is_empty() {
        return Err(Error::SyncFailed {
            failed: report.failed.len(),
            total: report.failed.len(),
        });
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.synced.is_empty() && report.failed.is_empty() {
        println!("No projects configured.");
        println!("\nAdd one with: isync project add owner/repo");
        return;
    }

    for synced in &report.synced {
        println!(
            "{} {}  {} fetched, {} new, {} updated, {} unchanged",
            "✓".green(),
            synced.project.bold(),
            synced.fetched,
            synced.inserted,
            synced.updated,
            synced.unchanged,
        );
        for error in &synced.errors {
            println!("    {} {error}", "skipped".yellow());
        }
    }

    for failed in &report.failed {
        println!(
            "{} {}  {}",
            "✗".red(),
            failed.project.bold(),
            failed.message.dimmed()
        );
    }

    println!();
    println!(
        "Stored {} issues across {} project(s); {} skipped, {} failed.",
        report.total_stored(),
        report.synced.len(),
        report.total_item_errors(),
        report.failed.len()
    );
}
