use flate2::write::GzEncoder;
use flate2::Compression;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::eligibility::ArchivableFile;
use crate::common::{ArchiverError, Result};

/// Directory inside the tar holding the bundled export files
pub const ARCHIVE_PREFIX: &str = "archives";

/// Temporary path a tar is written to before being renamed into place.
pub fn part_path(tar_path: &Path) -> PathBuf {
    let name = tar_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tar_path.with_file_name(format!("_{}.part", name))
}

/// Write `files` plus `manifest_path` into a tar at `tar_path`.
///
/// The tar is built at [`part_path`], flushed and synced, and only then
/// renamed to `tar_path`; the rename is the only point at which the bundle
/// becomes visible. On failure the part file is removed and `tar_path` is
/// never created.
pub fn write_tar(
    tar_path: &Path,
    files: &[ArchivableFile],
    manifest_path: &Path,
    compress: bool,
    show_progress: bool,
) -> Result<()> {
    let part = part_path(tar_path);

    let written = write_part(&part, files, manifest_path, compress, show_progress);
    if let Err(e) = written {
        if part.exists() {
            if let Err(cleanup) = std::fs::remove_file(&part) {
                tracing::warn!(path = %part.display(), error = %cleanup, "Failed to remove partial tar");
            }
        }
        return Err(e);
    }

    std::fs::rename(&part, tar_path).map_err(|e| ArchiverError::io(tar_path, e))?;
    if let Some(dir) = tar_path.parent() {
        sync_dir(dir);
    }
    Ok(())
}

fn write_part(
    part: &Path,
    files: &[ArchivableFile],
    manifest_path: &Path,
    compress: bool,
    show_progress: bool,
) -> Result<()> {
    let file = File::create(part).map_err(|e| ArchiverError::io(part, e))?;

    let pb = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} Bundling... {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━░");
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let file = if compress {
        let gz = GzEncoder::new(file, Compression::default());
        let gz = append_all(gz, part, files, manifest_path, pb.as_ref())?;
        gz.finish().map_err(|e| ArchiverError::io(part, e))?
    } else {
        append_all(file, part, files, manifest_path, pb.as_ref())?
    };

    file.sync_all().map_err(|e| ArchiverError::io(part, e))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    Ok(())
}

fn append_all<W: Write>(
    writer: W,
    part: &Path,
    files: &[ArchivableFile],
    manifest_path: &Path,
    pb: Option<&ProgressBar>,
) -> Result<W> {
    let mut builder = tar::Builder::new(writer);

    for file in files {
        if let Some(pb) = pb {
            pb.set_message(file.file_name());
        }
        let name = format!("{}/{}", ARCHIVE_PREFIX, file.file_name());
        builder
            .append_path_with_name(&file.path, &name)
            .map_err(|e| ArchiverError::io(&file.path, e))?;
        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    let manifest_name = manifest_path
        .file_name()
        .ok_or_else(|| ArchiverError::Config(format!("manifest path '{}' has no file name", manifest_path.display())))?;
    builder
        .append_path_with_name(manifest_path, manifest_name)
        .map_err(|e| ArchiverError::io(manifest_path, e))?;

    builder.into_inner().map_err(|e| ArchiverError::io(part, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
