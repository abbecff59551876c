use serde::Serialize;
use std::path::{Path, PathBuf};

use super::archive;
use super::eligibility::{self, EligibilityScan};
use super::manifest::{BundleManifest, ManifestEntry};
use super::quarantine;
use super::selection;
use crate::common::{ArchiverError, Result};
use crate::remote::HistoryApi;

/// Standard directory layout under an archive base folder
#[derive(Debug, Clone, PartialEq)]
pub struct BundleLayout {
    /// Export files deposited by the exporter
    pub export_dir: PathBuf,
    /// Finished tar bundles
    pub bundled_dir: PathBuf,
    /// JSON manifests
    pub manifest_dir: PathBuf,
    /// Export files whose history is not retired
    pub quarantine_dir: PathBuf,
}

impl BundleLayout {
    pub fn new(base: &Path) -> Self {
        Self {
            export_dir: base.join("export"),
            bundled_dir: base.join("bundled"),
            manifest_dir: base.join("manifest"),
            quarantine_dir: base.join("quarantine"),
        }
    }
}

/// Knobs for one bundling run
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Size budget for a single bundle, in bytes
    pub target_size: u64,
    /// Glob, relative to the source directory
    pub file_pattern: String,
    /// Delete bundled source files once the tar is in place
    pub remove_sources: bool,
    /// Gzip the tar stream
    pub compress: bool,
    /// Move confirmed-ineligible files here while checking the gate
    pub quarantine_dir: Option<PathBuf>,
    pub show_progress: bool,
}

impl BundleOptions {
    pub fn new(target_size: u64, file_pattern: &str) -> Self {
        Self {
            target_size,
            file_pattern: file_pattern.to_string(),
            remove_sources: true,
            compress: true,
            quarantine_dir: None,
            show_progress: false,
        }
    }
}

/// Outcome of one bundling operation
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    pub archive_uuid: String,
    pub tar_path: PathBuf,
    pub manifest_path: PathBuf,
    pub entries: Vec<ManifestEntry>,
    pub total_bytes: u64,
    pub sources_removed: usize,
    pub removal_errors: Vec<String>,
}

/// Whether the eligible files in `directory` add up to at least the budget.
///
/// Sums every eligible file, not just what a single bundle would take. With
/// `quarantine_dir` set, files confirmed ineligible are moved there.
pub fn has_enough_data(
    api: &dyn HistoryApi,
    directory: &Path,
    options: &BundleOptions,
) -> Result<bool> {
    let scan = eligibility::scan(api, directory, &options.file_pattern)?;

    if let Some(quarantine_dir) = &options.quarantine_dir {
        quarantine::relocate(&scan.ineligible, quarantine_dir)?;
    }

    let eligible = scan.eligible_bytes();
    tracing::info!(
        directory = %directory.display(),
        eligible_bytes = eligible,
        target_size = options.target_size,
        ineligible = scan.ineligible.len(),
        "Checked export folder"
    );
    Ok(eligible >= options.target_size)
}

/// Bundle the oldest eligible files of `directory` into one tar.
///
/// Order of effects: manifest written, tar written and renamed into place,
/// then (optionally) sources deleted. A failure before the rename leaves no
/// tar, no manifest and every source file untouched.
pub fn bundle(
    api: &dyn HistoryApi,
    directory: &Path,
    manifest_dir: &Path,
    tar_dir: &Path,
    options: &BundleOptions,
) -> Result<BundleReport> {
    let scan = eligibility::scan(api, directory, &options.file_pattern)?;
    bundle_scanned(scan, directory, manifest_dir, tar_dir, options)
}

pub(crate) fn bundle_scanned(
    scan: EligibilityScan,
    directory: &Path,
    manifest_dir: &Path,
    tar_dir: &Path,
    options: &BundleOptions,
) -> Result<BundleReport> {
    let candidates = selection::without_duplicate_names(scan.eligible);
    let selected = selection::select_oldest(candidates, options.target_size);
    if selected.is_empty() {
        return Err(ArchiverError::EmptySelection {
            directory: directory.to_path_buf(),
            target_size: options.target_size,
        });
    }
    let total_bytes = selection::total_size(&selected);

    std::fs::create_dir_all(tar_dir).map_err(|e| ArchiverError::io(tar_dir, e))?;

    let manifest = BundleManifest::new(&selected);
    let manifest_path = manifest.write(manifest_dir)?;
    let tar_path = tar_dir.join(manifest.tar_file_name());

    if let Err(e) = archive::write_tar(
        &tar_path,
        &selected,
        &manifest_path,
        options.compress,
        options.show_progress,
    ) {
        if let Err(cleanup) = std::fs::remove_file(&manifest_path) {
            tracing::warn!(path = %manifest_path.display(), error = %cleanup, "Failed to remove orphaned manifest");
        }
        return Err(e);
    }

    tracing::info!(
        archive_uuid = %manifest.archive_uuid,
        files = selected.len(),
        total_bytes,
        tar = %tar_path.display(),
        "Bundle written"
    );

    let mut sources_removed = 0;
    let mut removal_errors = Vec::new();
    if options.remove_sources {
        for file in &selected {
            match std::fs::remove_file(&file.path) {
                Ok(()) => sources_removed += 1,
                Err(e) => {
                    tracing::error!(path = %file.path.display(), error = %e, "Failed to remove bundled source");
                    removal_errors.push(format!("Failed to remove '{}': {}", file.path.display(), e));
                }
            }
        }
    }

    Ok(BundleReport {
        archive_uuid: manifest.archive_uuid.to_string(),
        tar_path,
        manifest_path,
        entries: manifest.entries,
        total_bytes,
        sources_removed,
        removal_errors,
    })
}

/// Gate, then bundle once if there is enough data.
pub fn run_once(
    api: &dyn HistoryApi,
    layout: &BundleLayout,
    options: &BundleOptions,
) -> Result<Option<BundleReport>> {
    if !has_enough_data(api, &layout.export_dir, options)? {
        return Ok(None);
    }
    bundle(api, &layout.export_dir, &layout.manifest_dir, &layout.bundled_dir, options).map(Some)
}

/// Repeat gate-then-bundle until the gate reports too little data.
///
/// Each cycle rescans the directory. Stops early if bundled sources could
/// not be removed, since the next cycle would bundle them again.
pub fn run_continual(
    api: &dyn HistoryApi,
    layout: &BundleLayout,
    options: &BundleOptions,
) -> Result<Vec<BundleReport>> {
    let mut reports = Vec::new();
    while let Some(report) = run_once(api, layout, options)? {
        let stop = !report.removal_errors.is_empty() || !options.remove_sources;
        reports.push(report);
        if stop {
            if options.remove_sources {
                tracing::error!("Stopping continual bundling: bundled sources could not be removed");
            }
            break;
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::eligibility::ArchivableFile;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_failed_tar_write_removes_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let layout = BundleLayout::new(dir.path());
        std::fs::create_dir_all(&layout.export_dir).unwrap();

        let present = layout.export_dir.join("2024-01-01T00-00-00_aaa.rocrate.zip");
        std::fs::write(&present, b"export").unwrap();
        let scan = EligibilityScan {
            eligible: vec![
                ArchivableFile {
                    path: present.clone(),
                    size_bytes: 6,
                    modified: SystemTime::UNIX_EPOCH + Duration::from_secs(10),
                    history_id: "aaa".into(),
                },
                ArchivableFile {
                    path: layout.export_dir.join("2024-01-01T00-00-00_bbb.rocrate.zip"),
                    size_bytes: 6,
                    modified: SystemTime::UNIX_EPOCH + Duration::from_secs(20),
                    history_id: "bbb".into(),
                },
            ],
            ineligible: Vec::new(),
        };

        let err = bundle_scanned(
            scan,
            &layout.export_dir,
            &layout.manifest_dir,
            &layout.bundled_dir,
            &BundleOptions::new(100, "*.rocrate.zip"),
        )
        .unwrap_err();

        assert!(matches!(err, ArchiverError::Io { .. }));
        assert!(present.exists());
        assert_eq!(std::fs::read_dir(&layout.manifest_dir).unwrap().count(), 0);
        assert_eq!(
            std::fs::read_dir(&layout.bundled_dir).unwrap().count(),
            0,
            "Neither the tar nor its part file may remain"
        );
    }
}
