use serde::Serialize;
use std::path::{Path, PathBuf};

use super::eligibility::{self, IneligibleFile};
use crate::common::{ArchiverError, Result};
use crate::remote::HistoryApi;

/// Result of auditing an export directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuarantineReport {
    /// Files checked against the remote
    pub checked: usize,
    /// Files whose history is archived and purged
    pub eligible: usize,
    /// Files that failed the check, including unverifiable ones
    pub flagged: Vec<IneligibleFile>,
    /// Destinations of files moved to quarantine
    pub moved: Vec<PathBuf>,
}

/// Re-validate staged export files and move the invalid ones aside.
///
/// Only files confirmed invalid (malformed name, or a history the remote
/// reports as not archived and purged) are moved; files whose state could
/// not be fetched are reported but left in place. With no `quarantine_dir`
/// this is a read-only audit.
pub fn scan_and_quarantine(
    api: &dyn HistoryApi,
    directory: &Path,
    file_pattern: &str,
    quarantine_dir: Option<&Path>,
) -> Result<QuarantineReport> {
    let scan = eligibility::scan(api, directory, file_pattern)?;

    let moved = match quarantine_dir {
        Some(dir) => relocate(&scan.ineligible, dir)?,
        None => Vec::new(),
    };

    Ok(QuarantineReport {
        checked: scan.candidate_count(),
        eligible: scan.eligible.len(),
        flagged: scan.ineligible,
        moved,
    })
}

/// Move every confirmed-ineligible file into `quarantine_dir`.
///
/// An existing file in `quarantine_dir` is never overwritten; a file whose
/// name is already taken stays where it is and is not listed as moved.
pub fn relocate(files: &[IneligibleFile], quarantine_dir: &Path) -> Result<Vec<PathBuf>> {
    let confirmed: Vec<&IneligibleFile> = files.iter().filter(|f| f.reason.is_confirmed()).collect();
    if confirmed.is_empty() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(quarantine_dir).map_err(|e| ArchiverError::io(quarantine_dir, e))?;

    let mut moved = Vec::with_capacity(confirmed.len());
    for file in confirmed {
        let Some(name) = file.path.file_name() else {
            continue;
        };
        let dest = quarantine_dir.join(name);
        if dest.exists() {
            tracing::warn!(
                path = %file.path.display(),
                existing = %dest.display(),
                "Quarantine already holds a file with this name, leaving it in place"
            );
            continue;
        }
        move_file(&file.path, &dest)?;
        tracing::info!(from = %file.path.display(), to = %dest.display(), "Quarantined export file");
        moved.push(dest);
    }
    Ok(moved)
}

/// Rename, falling back to copy + remove across file systems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| ArchiverError::io(from, e))?;
    std::fs::remove_file(from).map_err(|e| ArchiverError::io(from, e))?;
    Ok(())
}
