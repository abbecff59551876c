pub mod batch;
pub mod cancel;
pub mod engine;

pub use batch::{archive_histories, read_history_ids, BatchOptions, BatchReport, HistoryResult};
pub use cancel::CancellationToken;
pub use engine::{archive_history, ArchiveOutcome, ExportSettings};
