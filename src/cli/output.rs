use colored::*;
use serde_json::json;
use std::path::PathBuf;

use crate::bundler::{BundleReport, Ineligibility, QuarantineReport};
use crate::common::format::{self, format_size, format_size_colored};
use crate::lifecycle::{ArchiveOutcome, BatchReport, HistoryResult};

// ─── Archive ──────────────────────────────────────────────────────────────────

/// Print per-history archive results in human-readable format
pub fn print_batch_report(report: &BatchReport) {
    format::print_header("Archive Results");

    for result in &report.results {
        print_history_result(result);
    }

    println!();
    println!(
        "  {} succeeded  •  {} failed{}",
        report.succeeded().to_string().green(),
        report.failures().count().to_string().red(),
        if report.aborted {
            format!("  •  {}", "batch aborted".red().bold())
        } else {
            String::new()
        }
    );
}

fn print_history_result(result: &HistoryResult) {
    let id = result.history_id.bold();
    match &result.outcome {
        Ok(ArchiveOutcome::Purged { export_id, .. }) => {
            println!("  {} {}  archived and purged (export {})", "✓".green(), id, export_id.dimmed());
        }
        Ok(ArchiveOutcome::AlreadyArchived { archived, purged }) => {
            println!(
                "  {} {}  already archived [{}] or purged [{}]",
                "•".dimmed(),
                id,
                archived,
                purged
            );
        }
        Ok(ArchiveOutcome::SkippedExistingExport { export_id }) => {
            println!(
                "  {} {}  up-to-date export {} already exists, not purged",
                "!".yellow(),
                id,
                export_id
            );
        }
        Ok(ArchiveOutcome::ExportFailed { task_id }) => {
            println!("  {} {}  export task failed, investigate task {}", "✗".red(), id, task_id);
        }
        Err(e) => {
            println!("  {} {}  {}", "✗".red(), id, e.to_string().red());
        }
    }
}

pub fn print_batch_json(report: &BatchReport) {
    let results: Vec<_> = report
        .results
        .iter()
        .map(|r| match &r.outcome {
            Ok(outcome) => json!({
                "history_id": r.history_id,
                "success": outcome.is_success(),
                "result": outcome,
            }),
            Err(e) => json!({
                "history_id": r.history_id,
                "success": false,
                "error": { "kind": e.kind(), "message": e.to_string() },
            }),
        })
        .collect();

    let doc = json!({
        "succeeded": report.succeeded(),
        "failed": report.failures().count(),
        "aborted": report.aborted,
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
}

// ─── Bundle ───────────────────────────────────────────────────────────────────

pub fn print_bundle_reports(reports: &[BundleReport]) {
    format::print_header("Bundle Results");

    if reports.is_empty() {
        println!("  Not enough archived data to bundle yet.");
        return;
    }

    for report in reports {
        println!(
            "  {} {}  {}  ({})",
            "📦".to_string(),
            report.archive_uuid.bold(),
            format::format_count(report.entries.len()),
            format_size_colored(report.total_bytes)
        );
        format::print_kv("tar", &report.tar_path.display().to_string());
        format::print_kv("manifest", &report.manifest_path.display().to_string());
        if report.sources_removed > 0 {
            format::print_kv("sources removed", &report.sources_removed.to_string());
        }
        for error in &report.removal_errors {
            println!("  {} {}", "✗".red(), error.red());
        }
        println!();
    }

    let total: u64 = reports.iter().map(|r| r.total_bytes).sum();
    println!(
        "  {} bundle(s), {} total",
        reports.len().to_string().green(),
        format_size(total)
    );
}

pub fn print_bundle_json(reports: &[BundleReport]) {
    let doc = json!({ "bundles": reports });
    println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
}

// ─── Verify ───────────────────────────────────────────────────────────────────

pub fn print_quarantine_report(report: &QuarantineReport) {
    format::print_header("Export Verification");

    for file in &report.flagged {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reason = match &file.reason {
            Ineligibility::MalformedName { message } => message.clone(),
            Ineligibility::NotRetired {
                history_id,
                archived,
                purged,
            } => format!(
                "history {} not archived [{}] or not purged [{}]",
                history_id, archived, purged
            ),
            Ineligibility::Unverified { history_id, error } => {
                format!("history {} could not be checked: {}", history_id, error)
            }
        };
        println!("  {} {}: {}", "✗".red(), name, reason.dimmed());
    }

    println!();
    println!(
        "  {} checked  •  {} valid  •  {} flagged  •  {} quarantined",
        report.checked,
        report.eligible.to_string().green(),
        report.flagged.len().to_string().red(),
        report.moved.len()
    );
}

pub fn print_quarantine_json(report: &QuarantineReport) {
    println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
}

// ─── Stage ────────────────────────────────────────────────────────────────────

pub fn print_staged(files: &[PathBuf], directory: &std::path::Path) {
    println!(
        "{} have been generated in '{}'.",
        format::format_count(files.len()),
        directory.display()
    );
}
