pub mod client;
pub mod mock;
pub mod types;

pub use client::{up_to_date_export, GalaxyClient, HistoryApi};
pub use mock::{ApiCall, MockHistoryApi};
pub use types::{ExportRecord, ExportRequest, ExportTask, HistorySummary, PurgeRequest, TaskState};
