use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::eligibility::ArchivableFile;
use crate::common::{ArchiverError, Result};

/// One file included in a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub history_id: String,
    pub archive_uuid: String,
}

/// The ordered record of what went into one bundle.
///
/// Every entry carries the bundle's uuid, which also names the tar, so
/// manifests can be merged downstream without opening any tar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleManifest {
    pub archive_uuid: Uuid,
    pub entries: Vec<ManifestEntry>,
}

impl BundleManifest {
    /// Build a manifest for `files` in selection order, under a fresh uuid.
    pub fn new(files: &[ArchivableFile]) -> Self {
        Self::with_uuid(Uuid::new_v4(), files)
    }

    pub fn with_uuid(archive_uuid: Uuid, files: &[ArchivableFile]) -> Self {
        let id = archive_uuid.to_string();
        let entries = files
            .iter()
            .map(|f| ManifestEntry {
                filename: f.file_name(),
                history_id: f.history_id.clone(),
                archive_uuid: id.clone(),
            })
            .collect();
        Self {
            archive_uuid,
            entries,
        }
    }

    /// `<uuid>_manifest.json`
    pub fn file_name(&self) -> String {
        manifest_file_name(&self.archive_uuid)
    }

    /// `<uuid>_gxyarchive.tar`
    pub fn tar_file_name(&self) -> String {
        tar_file_name(&self.archive_uuid)
    }

    /// Serialize as a JSON array, pretty-printed with 4-space indentation.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.entries.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Write the manifest into `manifest_dir` and sync it, returning its path.
    pub fn write(&self, manifest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(manifest_dir).map_err(|e| ArchiverError::io(manifest_dir, e))?;
        let path = manifest_dir.join(self.file_name());
        let json = self.to_json()?;

        let mut file = std::fs::File::create(&path).map_err(|e| ArchiverError::io(&path, e))?;
        file.write_all(&json)
            .and_then(|()| file.sync_all())
            .map_err(|e| ArchiverError::io(&path, e))?;
        Ok(path)
    }

    /// Read back the entries of a manifest file.
    pub fn read_entries(path: &Path) -> Result<Vec<ManifestEntry>> {
        let contents = std::fs::read(path).map_err(|e| ArchiverError::io(path, e))?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

pub fn manifest_file_name(archive_uuid: &Uuid) -> String {
    format!("{}_manifest.json", archive_uuid)
}

pub fn tar_file_name(archive_uuid: &Uuid) -> String {
    format!("{}_gxyarchive.tar", archive_uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn archivable(name: &str, history_id: &str) -> ArchivableFile {
        ArchivableFile {
            path: PathBuf::from("/export").join(name),
            size_bytes: 1,
            modified: SystemTime::now(),
            history_id: history_id.to_string(),
        }
    }

    #[test]
    fn test_entries_share_uuid_and_keep_order() {
        let files = vec![
            archivable("2024-01-01T00-00-00_bbb.rocrate.zip", "bbb"),
            archivable("2023-01-01T00-00-00_aaa.rocrate.zip", "aaa"),
        ];
        let manifest = BundleManifest::new(&files);
        let id = manifest.archive_uuid.to_string();

        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].history_id, "bbb");
        assert_eq!(manifest.entries[1].filename, "2023-01-01T00-00-00_aaa.rocrate.zip");
        assert!(manifest.entries.iter().all(|e| e.archive_uuid == id));
        assert_eq!(manifest.tar_file_name(), format!("{}_gxyarchive.tar", id));
        assert_eq!(manifest.file_name(), format!("{}_manifest.json", id));
    }

    #[test]
    fn test_json_is_indented_array() {
        let uuid = Uuid::parse_str("1d941e24-b1e3-4e1f-bfe8-1973d33e503a").unwrap();
        let manifest = BundleManifest::with_uuid(uuid, &[archivable("t_abc.zip", "abc")]);
        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();

        assert!(json.starts_with("[\n    {\n        \"filename\": \"t_abc.zip\""));
        assert!(json.contains("\"archive_uuid\": \"1d941e24-b1e3-4e1f-bfe8-1973d33e503a\""));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = BundleManifest::new(&[archivable("t_abc.zip", "abc")]);
        let path = manifest.write(&dir.path().join("manifest")).unwrap();

        assert!(path.ends_with(manifest.file_name()));
        assert_eq!(BundleManifest::read_entries(&path).unwrap(), manifest.entries);
    }
}
