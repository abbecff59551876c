use std::collections::HashSet;

use super::eligibility::ArchivableFile;

/// Pick the oldest files whose combined size stays within `target_size`.
///
/// Files are ordered oldest first (ties broken by path) and taken as a
/// prefix: selection stops at the first file that would push the total past
/// the budget, even if a later, smaller file would still fit.
pub fn select_oldest(mut files: Vec<ArchivableFile>, target_size: u64) -> Vec<ArchivableFile> {
    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    let mut total: u64 = 0;
    let mut selected = Vec::new();
    for file in files {
        match total.checked_add(file.size_bytes) {
            Some(next) if next <= target_size => {
                total = next;
                selected.push(file);
            }
            _ => break,
        }
    }
    selected
}

/// Drop files whose name repeats the name of an older file.
///
/// Bundles store every export flat under one directory, so same-named files
/// from different subdirectories cannot share a tar. The newer copies stay
/// on disk for a later bundle.
pub fn without_duplicate_names(mut files: Vec<ArchivableFile>) -> Vec<ArchivableFile> {
    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    let mut seen = HashSet::new();
    files.retain(|file| {
        let fresh = seen.insert(file.file_name());
        if !fresh {
            tracing::warn!(path = %file.path.display(), "Deferring export with a name already in this bundle");
        }
        fresh
    });
    files
}

pub fn total_size(files: &[ArchivableFile]) -> u64 {
    files.iter().map(|f| f.size_bytes).sum()
}
