use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use super::client::HistoryApi;
use super::types::{ExportRecord, ExportRequest, ExportTask, HistorySummary, PurgeRequest, TaskState};
use crate::common::{ArchiverError, Result};

/// A remote call recorded by [`MockHistoryApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Summary(String),
    Exports(String),
    CreateExport { history_id: String, target_uri: String },
    TaskState(String),
    Purge { history_id: String, export_id: String },
}

#[derive(Default)]
struct MockState {
    histories: HashMap<String, HistorySummary>,
    exports: HashMap<String, Vec<ExportRecord>>,
    task_script: VecDeque<TaskState>,
    task_histories: HashMap<String, String>,
    unreachable: HashSet<String>,
    lag_export_records: bool,
    next_id: u64,
    calls: Vec<ApiCall>,
}

/// In-memory remote for tests with scripted task states and recorded calls.
///
/// A succeeded export task registers an up-to-date export record for its
/// history (unless [`MockHistoryApi::lagging_export_records`] is set), and a
/// purge marks the history archived and purged, so a full lifecycle can be
/// replayed against it.
#[derive(Default)]
pub struct MockHistoryApi {
    state: Mutex<MockState>,
}

impl MockHistoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(self, history_id: &str, archived: bool, purged: bool) -> Self {
        self.set_history(history_id, archived, purged);
        self
    }

    pub fn with_export(self, history_id: &str, export_id: &str, up_to_date: bool) -> Self {
        self.lock()
            .exports
            .entry(history_id.to_string())
            .or_default()
            .push(ExportRecord {
                id: export_id.to_string(),
                up_to_date,
            });
        self
    }

    /// States returned by successive task polls; `SUCCESS` once exhausted
    pub fn with_task_states(self, states: Vec<TaskState>) -> Self {
        self.lock().task_script = states.into();
        self
    }

    /// Summary lookups for this history fail with a 503
    pub fn with_unreachable_history(self, history_id: &str) -> Self {
        self.lock().unreachable.insert(history_id.to_string());
        self
    }

    /// Successful tasks do not produce an export record
    pub fn lagging_export_records(self) -> Self {
        self.lock().lag_export_records = true;
        self
    }

    pub fn set_history(&self, history_id: &str, archived: bool, purged: bool) {
        self.lock().histories.insert(
            history_id.to_string(),
            HistorySummary::new(history_id, archived, purged),
        );
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    pub fn purge_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Purge { .. }))
            .count()
    }

    pub fn export_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::CreateExport { .. }))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn not_found(path: String) -> ArchiverError {
        ArchiverError::Remote {
            url: format!("mock://{}", path),
            status: 404,
            body: "Object not found".to_string(),
        }
    }
}

impl HistoryApi for MockHistoryApi {
    fn history_summary(&self, history_id: &str) -> Result<HistorySummary> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Summary(history_id.to_string()));
        if state.unreachable.contains(history_id) {
            return Err(ArchiverError::Transient {
                url: format!("mock://histories/{}", history_id),
                status: 503,
                attempts: 1,
            });
        }
        state
            .histories
            .get(history_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("histories/{}", history_id)))
    }

    fn export_records(&self, history_id: &str) -> Result<Vec<ExportRecord>> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Exports(history_id.to_string()));
        Ok(state.exports.get(history_id).cloned().unwrap_or_default())
    }

    fn create_export(&self, history_id: &str, request: &ExportRequest) -> Result<ExportTask> {
        let mut state = self.lock();
        state.calls.push(ApiCall::CreateExport {
            history_id: history_id.to_string(),
            target_uri: request.target_uri.clone(),
        });
        state.next_id += 1;
        let task_id = format!("task-{}", state.next_id);
        state
            .task_histories
            .insert(task_id.clone(), history_id.to_string());
        Ok(ExportTask { id: task_id })
    }

    fn task_state(&self, task_id: &str) -> Result<TaskState> {
        let mut state = self.lock();
        state.calls.push(ApiCall::TaskState(task_id.to_string()));
        let next = state.task_script.pop_front().unwrap_or(TaskState::Success);

        if next == TaskState::Success && !state.lag_export_records {
            if let Some(history_id) = state.task_histories.get(task_id).cloned() {
                state.next_id += 1;
                let export_id = format!("export-{}", state.next_id);
                let records = state.exports.entry(history_id).or_default();
                for record in records.iter_mut() {
                    record.up_to_date = false;
                }
                records.push(ExportRecord {
                    id: export_id,
                    up_to_date: true,
                });
            }
        }
        Ok(next)
    }

    fn purge_history(&self, history_id: &str, request: &PurgeRequest) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Purge {
            history_id: history_id.to_string(),
            export_id: request.archive_export_id.clone(),
        });
        let summary = state
            .histories
            .get_mut(history_id)
            .ok_or_else(|| Self::not_found(format!("histories/{}/archive", history_id)))?;
        summary.archived = true;
        summary.purged = request.purge_history;
        Ok(())
    }
}
