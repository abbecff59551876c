//! Test-data stager: fills an export directory with random files named the
//! way the exporter names them.

use chrono::Local;
use rand::{Rng, RngCore};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::common::{ArchiverError, Result};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FixtureOptions {
    pub count: usize,
    pub min_size: u64,
    pub max_size: u64,
    pub extension: String,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            count: 20,
            min_size: MIB,
            max_size: 4 * MIB,
            extension: "rocrate.zip".to_string(),
        }
    }
}

/// Write `options.count` random files into `directory`.
pub fn generate_export_files(directory: &Path, options: &FixtureOptions) -> Result<Vec<PathBuf>> {
    if options.min_size > options.max_size {
        return Err(ArchiverError::Config(format!(
            "minimum fixture size {} exceeds maximum {}",
            options.min_size, options.max_size
        )));
    }
    std::fs::create_dir_all(directory).map_err(|e| ArchiverError::io(directory, e))?;

    let mut rng = rand::thread_rng();
    let mut written = Vec::with_capacity(options.count);

    for _ in 0..options.count {
        let size = rng.gen_range(options.min_size..=options.max_size);
        let history_id: String = Uuid::new_v4().simple().to_string().chars().take(16).collect();
        let timestamp = Local::now().format("%Y-%m-%dT%H-%M-%S%.6f");
        let path = directory.join(format!("{}_{}.{}", timestamp, history_id, options.extension));

        let mut contents = vec![0u8; size as usize];
        rng.fill_bytes(&mut contents);
        std::fs::write(&path, &contents).map_err(|e| ArchiverError::io(&path, e))?;
        written.push(path);
    }

    tracing::info!(directory = %directory.display(), count = written.len(), "Staged fixture files");
    Ok(written)
}
