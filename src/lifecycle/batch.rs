use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;

use super::cancel::CancellationToken;
use super::engine::{archive_history, ArchiveOutcome, ExportSettings};
use crate::common::{ArchiverError, Result};
use crate::remote::HistoryApi;

/// Options for archiving a list of histories
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; each runs one history at a time
    pub concurrency: usize,
    /// Record errors and keep going, instead of stopping the batch
    pub ignore_errors: bool,
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            ignore_errors: true,
            show_progress: false,
        }
    }
}

/// Outcome for one history id in a batch
#[derive(Debug)]
pub struct HistoryResult {
    pub history_id: String,
    pub outcome: Result<ArchiveOutcome>,
}

impl HistoryResult {
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(outcome) if outcome.is_success())
    }
}

/// Per-history results, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<HistoryResult>,
    /// The batch stopped early after an error
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &HistoryResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Read history ids from a file, one per line, skipping blank lines.
pub fn read_history_ids(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| ArchiverError::io(path, e))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Archive every history in `history_ids` on a fixed-size worker pool.
///
/// Every id gets a result. Without `ignore_errors`, the first error cancels
/// the shared token: histories not yet started are reported as cancelled and
/// running ones stop at their next poll.
pub fn archive_histories(
    api: &dyn HistoryApi,
    history_ids: &[String],
    settings: &ExportSettings,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .thread_name(|i| format!("archive-worker-{}", i))
        .build()
        .map_err(|e| ArchiverError::WorkerPool(e.to_string()))?;

    let cancel = CancellationToken::new();
    let pb = if options.show_progress {
        let pb = ProgressBar::new(history_ids.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} Archiving... {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━━░");
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let results: Vec<HistoryResult> = pool.install(|| {
        history_ids
            .par_iter()
            .with_max_len(1)
            .map(|history_id| {
                let outcome = if cancel.is_cancelled() {
                    Err(ArchiverError::Cancelled {
                        history_id: history_id.clone(),
                    })
                } else {
                    archive_history(api, history_id, settings, &cancel)
                };

                if let Err(e) = &outcome {
                    if !matches!(e, ArchiverError::Cancelled { .. }) {
                        tracing::error!(history_id = %history_id, error = %e, "Archiving failed");
                        if !options.ignore_errors {
                            cancel.cancel();
                        }
                    }
                }
                if let Some(pb) = &pb {
                    pb.set_message(history_id.clone());
                    pb.inc(1);
                }

                HistoryResult {
                    history_id: history_id.clone(),
                    outcome,
                }
            })
            .collect()
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    Ok(BatchReport {
        results,
        aborted: cancel.is_cancelled(),
    })
}
