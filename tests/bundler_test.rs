use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use gxyarchiver::bundler::archive::{part_path, write_tar};
use gxyarchiver::bundler::{
    bundle, has_enough_data, run_continual, run_once, ArchivableFile, BundleLayout,
    BundleManifest, BundleOptions,
};
use gxyarchiver::common::ArchiverError;
use gxyarchiver::remote::MockHistoryApi;

const PATTERN: &str = "**/*.rocrate.zip";

/// Write an export file for `history_id`, `age_secs` old
fn write_export(dir: &Path, history_id: &str, size: usize, age_secs: u64) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("2024-01-01T00-00-00_{}.rocrate.zip", history_id));
    std::fs::write(&path, vec![b'x'; size]).unwrap();
    let mtime = SystemTime::now() - Duration::from_secs(age_secs);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
    path
}

fn options(target_size: u64) -> BundleOptions {
    BundleOptions::new(target_size, PATTERN)
}

fn tar_entries(path: &Path, compressed: bool) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let reader: Box<dyn std::io::Read> = if compressed {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = tar::Archive::new(reader);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn dir_names(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ─── Gate ─────────────────────────────────────────────────────────────────────

#[test]
fn test_has_enough_data_sums_whole_directory() {
    let base = TempDir::new().unwrap();
    let mock = MockHistoryApi::new()
        .with_history("aaa", true, true)
        .with_history("bbb", true, true)
        .with_history("ccc", true, true);
    for (i, id) in ["aaa", "bbb", "ccc"].iter().enumerate() {
        write_export(base.path(), id, 10, 100 - i as u64);
    }

    assert!(has_enough_data(&mock, base.path(), &options(25)).unwrap());
    assert!(has_enough_data(&mock, base.path(), &options(30)).unwrap());
    assert!(!has_enough_data(&mock, base.path(), &options(31)).unwrap());
}

#[test]
fn test_has_enough_data_excludes_unretired_histories() {
    let base = TempDir::new().unwrap();
    let mock = MockHistoryApi::new()
        .with_history("retired", true, true)
        .with_history("archived_only", true, false)
        .with_history("live", false, false);
    write_export(base.path(), "retired", 10, 30);
    write_export(base.path(), "archived_only", 10, 20);
    write_export(base.path(), "live", 10, 10);

    assert!(has_enough_data(&mock, base.path(), &options(10)).unwrap());
    assert!(!has_enough_data(&mock, base.path(), &options(11)).unwrap());
}

#[test]
fn test_unreachable_summary_and_bad_names_are_not_fatal() {
    let base = TempDir::new().unwrap();
    let mock = MockHistoryApi::new()
        .with_history("ok", true, true)
        .with_unreachable_history("flaky");
    write_export(base.path(), "ok", 10, 20);
    write_export(base.path(), "flaky", 10, 10);
    std::fs::write(base.path().join("notes.rocrate.zip"), b"stray").unwrap();

    assert!(has_enough_data(&mock, base.path(), &options(10)).unwrap());
    assert!(!has_enough_data(&mock, base.path(), &options(11)).unwrap());
}

#[test]
fn test_gate_quarantines_confirmed_ineligible_files() {
    let base = TempDir::new().unwrap();
    let export = base.path().join("export");
    let quarantine = base.path().join("quarantine");
    let mock = MockHistoryApi::new()
        .with_history("ok", true, true)
        .with_history("live", false, false)
        .with_unreachable_history("flaky");
    write_export(&export, "ok", 10, 30);
    let live = write_export(&export, "live", 10, 20);
    let flaky = write_export(&export, "flaky", 10, 10);

    let mut opts = options(10);
    opts.quarantine_dir = Some(quarantine.clone());
    assert!(has_enough_data(&mock, &export, &opts).unwrap());

    assert!(!live.exists());
    assert!(quarantine.join(live.file_name().unwrap()).exists());
    assert!(flaky.exists(), "Unverifiable files stay in place");
    assert_eq!(dir_names(&quarantine).len(), 1);
}

// ─── Bundle ───────────────────────────────────────────────────────────────────

#[test]
fn test_bundle_takes_two_oldest_of_three() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new()
        .with_history("oldest", true, true)
        .with_history("middle", true, true)
        .with_history("newest", true, true);
    let unit = 1024;
    let oldest = write_export(&layout.export_dir, "oldest", unit, 300);
    let middle = write_export(&layout.export_dir, "middle", unit, 200);
    let newest = write_export(&layout.export_dir, "newest", unit, 100);

    let report = run_once(&mock, &layout, &options(2 * unit as u64))
        .unwrap()
        .expect("gate should pass");

    let ids: Vec<&str> = report.entries.iter().map(|e| e.history_id.as_str()).collect();
    assert_eq!(ids, vec!["oldest", "middle"]);
    assert_eq!(report.total_bytes, 2 * unit as u64);
    assert_eq!(report.sources_removed, 2);

    assert!(!oldest.exists());
    assert!(!middle.exists());
    assert!(newest.exists(), "Third file must remain untouched");
    assert_eq!(std::fs::metadata(&newest).unwrap().len(), unit as u64);

    let manifest = BundleManifest::read_entries(&report.manifest_path).unwrap();
    assert_eq!(manifest, report.entries);

    let tar_name = report.tar_path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(tar_name, format!("{}_gxyarchive.tar", report.archive_uuid));
    assert_eq!(dir_names(&layout.bundled_dir), vec![tar_name]);

    let entries = tar_entries(&report.tar_path, true);
    assert_eq!(
        entries,
        vec![
            "archives/2024-01-01T00-00-00_oldest.rocrate.zip".to_string(),
            "archives/2024-01-01T00-00-00_middle.rocrate.zip".to_string(),
            format!("{}_manifest.json", report.archive_uuid),
        ]
    );
}

#[test]
fn test_unretired_file_never_bundled_or_deleted() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new()
        .with_history("live", false, false)
        .with_history("aaa", true, true)
        .with_history("bbb", true, true);
    let live = write_export(&layout.export_dir, "live", 10, 1_000);
    write_export(&layout.export_dir, "aaa", 10, 500);
    write_export(&layout.export_dir, "bbb", 10, 400);

    let report = bundle(
        &mock,
        &layout.export_dir,
        &layout.manifest_dir,
        &layout.bundled_dir,
        &options(100),
    )
    .unwrap();

    assert!(report.entries.iter().all(|e| e.history_id != "live"));
    assert_eq!(report.entries.len(), 2);
    assert!(live.exists());
}

#[test]
fn test_manifest_uuid_matches_tar_and_is_never_reused() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new();
    for i in 0..6 {
        let id = format!("hist{}", i);
        mock.set_history(&id, true, true);
        write_export(&layout.export_dir, &id, 10, 600 - i * 10);
    }

    let mut opts = options(20);
    opts.compress = false;
    let reports = run_continual(&mock, &layout, &opts).unwrap();
    assert_eq!(reports.len(), 3);

    let mut seen = HashSet::new();
    for report in &reports {
        assert!(seen.insert(report.archive_uuid.clone()), "uuid reused");
        assert!(report
            .tar_path
            .to_string_lossy()
            .ends_with(&format!("{}_gxyarchive.tar", report.archive_uuid)));
        let manifest = BundleManifest::read_entries(&report.manifest_path).unwrap();
        assert!(manifest.iter().all(|e| e.archive_uuid == report.archive_uuid));
        assert!(report.total_bytes <= 20);
        assert_eq!(tar_entries(&report.tar_path, false).len(), manifest.len() + 1);
    }

    // Oldest files went into the first bundle
    let first: Vec<&str> = reports[0].entries.iter().map(|e| e.history_id.as_str()).collect();
    assert_eq!(first, vec!["hist0", "hist1"]);
    assert!(dir_names(&layout.export_dir).is_empty());
}

#[test]
fn test_continual_stops_when_gate_fails() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new();
    for i in 0..5 {
        let id = format!("h{}", i);
        mock.set_history(&id, true, true);
        write_export(&layout.export_dir, &id, 10, 100 - i * 10);
    }

    let reports = run_continual(&mock, &layout, &options(20)).unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(dir_names(&layout.export_dir), vec!["2024-01-01T00-00-00_h4.rocrate.zip"]);
    assert_eq!(dir_names(&layout.manifest_dir).len(), 2);
}

#[test]
fn test_keep_sources_leaves_files() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new().with_history("aaa", true, true);
    let file = write_export(&layout.export_dir, "aaa", 10, 10);

    let mut opts = options(10);
    opts.remove_sources = false;
    let reports = run_continual(&mock, &layout, &opts).unwrap();

    assert_eq!(reports.len(), 1, "Keeping sources must not loop forever");
    assert_eq!(reports[0].sources_removed, 0);
    assert!(file.exists());
    assert!(reports[0].tar_path.exists());
}

#[test]
fn test_empty_selection_is_an_error() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new()
        .with_history("huge", true, true)
        .with_history("small", true, true);
    let huge = write_export(&layout.export_dir, "huge", 100, 200);
    let small = write_export(&layout.export_dir, "small", 5, 100);

    // The gate passes on the directory total, but the oldest file alone is
    // over budget, so the oldest-first prefix is empty
    assert!(has_enough_data(&mock, &layout.export_dir, &options(50)).unwrap());
    let err = run_once(&mock, &layout, &options(50)).unwrap_err();

    assert!(matches!(err, ArchiverError::EmptySelection { target_size: 50, .. }));
    assert!(huge.exists());
    assert!(small.exists());
    assert!(dir_names(&layout.manifest_dir).is_empty());
    assert!(dir_names(&layout.bundled_dir).is_empty());
}

#[test]
fn test_io_failure_leaves_sources_and_no_outputs() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new().with_history("aaa", true, true);
    let file = write_export(&layout.export_dir, "aaa", 10, 10);

    // A regular file where the tar directory should be
    std::fs::write(&layout.bundled_dir, b"in the way").unwrap();

    let err = run_once(&mock, &layout, &options(10)).unwrap_err();

    assert!(matches!(err, ArchiverError::Io { .. }));
    assert!(file.exists());
    assert!(dir_names(&layout.manifest_dir).is_empty());
}

#[test]
fn test_same_name_in_subdirectories_is_bundled_separately() {
    let base = TempDir::new().unwrap();
    let layout = BundleLayout::new(base.path());
    let mock = MockHistoryApi::new().with_history("dup", true, true);
    let older = write_export(&layout.export_dir.join("a"), "dup", 10, 300);
    let newer = write_export(&layout.export_dir.join("b"), "dup", 10, 100);
    let name = "2024-01-01T00-00-00_dup.rocrate.zip";

    let first = bundle(
        &mock,
        &layout.export_dir,
        &layout.manifest_dir,
        &layout.bundled_dir,
        &options(100),
    )
    .unwrap();

    assert_eq!(first.entries.len(), 1);
    assert_eq!(
        tar_entries(&first.tar_path, true),
        vec![
            format!("archives/{}", name),
            format!("{}_manifest.json", first.archive_uuid),
        ]
    );
    assert!(!older.exists());
    assert!(newer.exists(), "Newer copy waits for the next bundle");

    let second = bundle(
        &mock,
        &layout.export_dir,
        &layout.manifest_dir,
        &layout.bundled_dir,
        &options(100),
    )
    .unwrap();

    assert_eq!(second.entries.len(), 1);
    assert_eq!(second.entries[0].filename, name);
    assert!(!newer.exists());
}

// ─── Tar atomicity ───────────────────────────────────────────────────────────

#[test]
fn test_failed_tar_write_leaves_no_final_or_part_file() {
    let dir = TempDir::new().unwrap();
    let present = write_export(dir.path(), "present", 10, 20);
    let manifest_path = dir.path().join("m_manifest.json");
    std::fs::write(&manifest_path, b"[]").unwrap();

    let files = vec![
        ArchivableFile {
            path: present.clone(),
            size_bytes: 10,
            modified: SystemTime::now(),
            history_id: "present".into(),
        },
        ArchivableFile {
            path: dir.path().join("2024-01-01T00-00-00_gone.rocrate.zip"),
            size_bytes: 10,
            modified: SystemTime::now(),
            history_id: "gone".into(),
        },
    ];
    let tar_path = dir.path().join("x_gxyarchive.tar");

    let err = write_tar(&tar_path, &files, &manifest_path, true, false).unwrap_err();

    assert!(matches!(err, ArchiverError::Io { .. }));
    assert!(!tar_path.exists());
    assert!(!part_path(&tar_path).exists());
    assert!(present.exists());
}

#[test]
fn test_successful_tar_write_removes_part_file() {
    let dir = TempDir::new().unwrap();
    let present = write_export(dir.path(), "present", 10, 20);
    let manifest_path = dir.path().join("m_manifest.json");
    std::fs::write(&manifest_path, b"[]").unwrap();
    let files = vec![ArchivableFile {
        path: present,
        size_bytes: 10,
        modified: SystemTime::now(),
        history_id: "present".into(),
    }];
    let tar_path = dir.path().join("x_gxyarchive.tar");

    write_tar(&tar_path, &files, &manifest_path, false, false).unwrap();

    assert!(tar_path.exists());
    assert!(!part_path(&tar_path).exists());
    assert_eq!(
        tar_entries(&tar_path, false),
        vec!["archives/2024-01-01T00-00-00_present.rocrate.zip", "m_manifest.json"]
    );
}
