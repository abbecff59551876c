use chrono::Local;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::cancel::CancellationToken;
use crate::bundler::naming;
use crate::common::{ArchiverError, Result};
use crate::remote::{up_to_date_export, ExportRequest, HistoryApi, PurgeRequest, TaskState};

/// How exports are requested and watched
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Target URI prefix, e.g. `gxfiles://gxy-archiver`
    pub namespace: String,
    pub model_store_format: String,
    pub include_files: bool,
    pub include_deleted: bool,
    pub include_hidden: bool,
    /// Sleep between task status checks
    pub poll_interval: Duration,
    /// Sleep after creating the export, before the first status check
    pub request_delay: Duration,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            namespace: "gxfiles://gxy-archiver".to_string(),
            model_store_format: "rocrate.zip".to_string(),
            include_files: true,
            include_deleted: true,
            include_hidden: true,
            poll_interval: Duration::from_secs(5),
            request_delay: Duration::from_secs(1),
        }
    }
}

impl ExportSettings {
    /// Same settings with no sleeping at all.
    pub fn without_delays(mut self) -> Self {
        self.poll_interval = Duration::ZERO;
        self.request_delay = Duration::ZERO;
        self
    }

    fn export_request(&self, history_id: &str) -> ExportRequest {
        ExportRequest {
            target_uri: naming::export_target_uri(
                &self.namespace,
                &Local::now(),
                history_id,
                &self.model_store_format,
            ),
            model_store_format: self.model_store_format.clone(),
            include_files: self.include_files,
            include_deleted: self.include_deleted,
            include_hidden: self.include_hidden,
        }
    }
}

/// What happened to one history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Nothing to do: the remote already reports it archived or purged
    AlreadyArchived { archived: bool, purged: bool },
    /// An up-to-date export from an earlier run exists; left unpurged
    SkippedExistingExport { export_id: String },
    /// Exported, verified and purged by this run
    Purged { task_id: String, export_id: String },
    /// The export task ended in FAILURE; nothing was purged
    ExportFailed { task_id: String },
}

impl ArchiveOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ArchiveOutcome::ExportFailed { .. })
    }
}

/// Drive one history through export, verification and purge.
///
/// Issues at most one export request and at most one purge request. A
/// history with an existing up-to-date export is left alone rather than
/// purged against a record this run did not create. The status poll has no
/// timeout; `cancel` is honoured between polls.
pub fn archive_history(
    api: &dyn HistoryApi,
    history_id: &str,
    settings: &ExportSettings,
    cancel: &CancellationToken,
) -> Result<ArchiveOutcome> {
    tracing::info!(history_id, "Processing history");

    let summary = api.history_summary(history_id)?;
    if summary.archived || summary.purged {
        tracing::info!(
            history_id,
            archived = summary.archived,
            purged = summary.purged,
            "History already archived or purged, skipping"
        );
        return Ok(ArchiveOutcome::AlreadyArchived {
            archived: summary.archived,
            purged: summary.purged,
        });
    }

    if let Some(existing) = up_to_date_export(api, history_id)? {
        tracing::warn!(
            history_id,
            export_id = %existing.id,
            "Up-to-date export record already exists, skipping"
        );
        return Ok(ArchiveOutcome::SkippedExistingExport {
            export_id: existing.id,
        });
    }

    let request = settings.export_request(history_id);
    let task = api.create_export(history_id, &request)?;
    tracing::info!(
        history_id,
        task_id = %task.id,
        target_uri = %request.target_uri,
        "Export task created"
    );

    sleep(settings.request_delay);

    match wait_for_task(api, history_id, &task.id, settings.poll_interval, cancel)? {
        TaskState::Success => {}
        _ => {
            tracing::error!(history_id, task_id = %task.id, "Export task failed");
            return Ok(ArchiveOutcome::ExportFailed { task_id: task.id });
        }
    }

    let export = up_to_date_export(api, history_id)?.ok_or_else(|| {
        ArchiverError::MissingExportRecord {
            history_id: history_id.to_string(),
            task_id: task.id.clone(),
        }
    })?;

    api.purge_history(history_id, &PurgeRequest::purging(&export.id))?;
    tracing::info!(history_id, export_id = %export.id, "History archived and purged");

    Ok(ArchiveOutcome::Purged {
        task_id: task.id,
        export_id: export.id,
    })
}

/// Poll until the task is SUCCESS or FAILURE.
fn wait_for_task(
    api: &dyn HistoryApi,
    history_id: &str,
    task_id: &str,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<TaskState> {
    let started = Instant::now();
    let mut attempt: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ArchiverError::Cancelled {
                history_id: history_id.to_string(),
            });
        }

        let state = api.task_state(task_id)?;
        if state.is_terminal() {
            tracing::debug!(
                history_id,
                task_id,
                state = %state,
                attempts = attempt + 1,
                elapsed_secs = started.elapsed().as_secs(),
                "Export task finished"
            );
            return Ok(state);
        }

        attempt += 1;
        tracing::debug!(
            history_id,
            task_id,
            state = %state,
            attempt,
            elapsed_secs = started.elapsed().as_secs(),
            "Monitoring export task"
        );
        sleep(interval);
    }
}

fn sleep(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
