pub mod config;
pub mod errors;
pub mod format;
pub mod retry;

pub use errors::{ArchiverError, Result};
pub use retry::RetryPolicy;
