//! Export filename convention: `<timestamp>_<history_id>.<ext...>`.
//!
//! The exporter names its target files this way and the bundler parses the
//! history id back out of them, so both directions live here.

use chrono::{DateTime, TimeZone};
use std::path::Path;
use thiserror::Error;

/// Timestamp layout used in export filenames (no `:` so it is path safe)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("'{0}' has no file name")]
    NoFileName(String),

    #[error("'{0}' has no '_' separating timestamp and history id")]
    MissingSeparator(String),

    #[error("'{0}' has an empty timestamp")]
    EmptyTimestamp(String),

    #[error("'{0}' has no extension after the history id")]
    MissingExtension(String),

    #[error("'{name}' has an invalid history id '{history_id}'")]
    InvalidHistoryId { name: String, history_id: String },
}

/// Build the export filename for `history_id` at `when`.
pub fn export_file_name<Tz: TimeZone>(when: &DateTime<Tz>, history_id: &str, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.{}", when.format(TIMESTAMP_FORMAT), history_id, format)
}

/// Full export target URI: `<namespace>/<timestamp>_<history_id>.<format>`.
pub fn export_target_uri<Tz: TimeZone>(
    namespace: &str,
    when: &DateTime<Tz>,
    history_id: &str,
    format: &str,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}/{}",
        namespace.trim_end_matches('/'),
        export_file_name(when, history_id, format)
    )
}

/// Parse the history id out of an export file name.
///
/// The id is the text after the last `_` and before the first `.` that
/// follows it. Malformed names are rejected so callers can treat the file
/// as ineligible.
pub fn parse_history_id(file_name: &str) -> Result<&str, NamingError> {
    let (timestamp, rest) = file_name
        .rsplit_once('_')
        .ok_or_else(|| NamingError::MissingSeparator(file_name.to_string()))?;

    if timestamp.is_empty() {
        return Err(NamingError::EmptyTimestamp(file_name.to_string()));
    }

    let (history_id, extension) = rest
        .split_once('.')
        .ok_or_else(|| NamingError::MissingExtension(file_name.to_string()))?;

    if extension.is_empty() {
        return Err(NamingError::MissingExtension(file_name.to_string()));
    }

    if !is_valid_history_id(history_id) {
        return Err(NamingError::InvalidHistoryId {
            name: file_name.to_string(),
            history_id: history_id.to_string(),
        });
    }

    Ok(history_id)
}

/// Parse the history id from a path's final component.
pub fn history_id_from_path(path: &Path) -> Result<String, NamingError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| NamingError::NoFileName(path.display().to_string()))?;
    parse_history_id(name).map(str::to_string)
}

fn is_valid_history_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
