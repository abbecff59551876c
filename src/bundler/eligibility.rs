use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::naming::{self, NamingError};
use crate::common::{ArchiverError, Result};
use crate::remote::HistoryApi;

/// An export file whose history is confirmed archived and purged
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivableFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
    pub history_id: String,
}

impl ArchivableFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Why a candidate file was kept out of the working set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    /// File name does not carry a history id
    MalformedName { message: String },
    /// Remote reports the history is not (yet) archived and purged
    NotRetired {
        history_id: String,
        archived: bool,
        purged: bool,
    },
    /// The remote state could not be read
    Unverified { history_id: String, error: String },
}

impl Ineligibility {
    /// Whether the file is known to be invalid, as opposed to unverifiable.
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Ineligibility::Unverified { .. })
    }
}

impl From<NamingError> for Ineligibility {
    fn from(e: NamingError) -> Self {
        Ineligibility::MalformedName {
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IneligibleFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub reason: Ineligibility,
}

/// Result of checking every candidate file against the remote
#[derive(Debug, Default)]
pub struct EligibilityScan {
    pub eligible: Vec<ArchivableFile>,
    pub ineligible: Vec<IneligibleFile>,
}

impl EligibilityScan {
    pub fn eligible_bytes(&self) -> u64 {
        self.eligible.iter().map(|f| f.size_bytes).sum()
    }

    pub fn candidate_count(&self) -> usize {
        self.eligible.len() + self.ineligible.len()
    }
}

/// Regular files under `directory` matching the glob `pattern`, sorted by path.
pub fn list_candidates(directory: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let root = glob::Pattern::escape(&directory.to_string_lossy());
    let full = format!("{}/{}", root.trim_end_matches('/'), pattern);

    let entries = glob::glob(&full)
        .map_err(|e| ArchiverError::Config(format!("invalid file pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Check every candidate file's history against the remote.
///
/// Summary lookups that fail are not fatal: the file is excluded and a
/// warning is logged.
pub fn scan(api: &dyn HistoryApi, directory: &Path, pattern: &str) -> Result<EligibilityScan> {
    let mut result = EligibilityScan::default();

    for path in list_candidates(directory, pattern)? {
        let Some(metadata) = candidate_metadata(&path) else {
            continue;
        };
        let size_bytes = metadata.len();

        match check_file(api, &path) {
            Ok(history_id) => {
                let modified = metadata
                    .modified()
                    .map_err(|e| ArchiverError::io(&path, e))?;
                result.eligible.push(ArchivableFile {
                    path,
                    size_bytes,
                    modified,
                    history_id,
                });
            }
            Err(reason) => {
                match &reason {
                    Ineligibility::Unverified { history_id, error } => tracing::warn!(
                        path = %path.display(),
                        history_id = %history_id,
                        error = %error,
                        "Could not fetch history summary, excluding file"
                    ),
                    other => tracing::info!(
                        path = %path.display(),
                        reason = ?other,
                        "Excluding ineligible export file"
                    ),
                }
                result.ineligible.push(IneligibleFile {
                    path,
                    size_bytes,
                    reason,
                });
            }
        }
    }

    Ok(result)
}

/// Metadata of a listed file, or `None` if it can no longer be read.
fn candidate_metadata(path: &Path) -> Option<std::fs::Metadata> {
    match std::fs::metadata(path) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Export file vanished during scan, skipping");
            None
        }
    }
}

/// The eligibility predicate shared by bundling and quarantine.
pub fn check_file(api: &dyn HistoryApi, path: &Path) -> std::result::Result<String, Ineligibility> {
    let history_id = naming::history_id_from_path(path)?;

    match api.history_summary(&history_id) {
        Ok(summary) if summary.is_retired() => Ok(history_id),
        Ok(summary) => Err(Ineligibility::NotRetired {
            history_id,
            archived: summary.archived,
            purged: summary.purged,
        }),
        Err(e) => Err(Ineligibility::Unverified {
            history_id,
            error: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanished_candidate_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let kept = dir.path().join("2024-01-01T00-00-00_abc.rocrate.zip");
        std::fs::write(&kept, b"export").unwrap();

        assert!(candidate_metadata(&kept).is_some());
        assert!(candidate_metadata(&dir.path().join("gone.rocrate.zip")).is_none());
    }
}
