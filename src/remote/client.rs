use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{
    ExportRecord, ExportRequest, ExportTask, HistorySummary, PurgeRequest, TaskState,
    EXPORT_ACCEPT,
};
use crate::common::{ArchiverError, Result, RetryPolicy};

const API_KEY_HEADER: &str = "X-API-KEY";

/// The five remote operations the archiver relies on.
///
/// Every decision re-reads the remote; implementations must not cache.
pub trait HistoryApi: Send + Sync {
    fn history_summary(&self, history_id: &str) -> Result<HistorySummary>;

    fn export_records(&self, history_id: &str) -> Result<Vec<ExportRecord>>;

    fn create_export(&self, history_id: &str, request: &ExportRequest) -> Result<ExportTask>;

    fn task_state(&self, task_id: &str) -> Result<TaskState>;

    fn purge_history(&self, history_id: &str, request: &PurgeRequest) -> Result<()>;
}

/// First export record flagged up to date, if any.
pub fn up_to_date_export(api: &dyn HistoryApi, history_id: &str) -> Result<Option<ExportRecord>> {
    Ok(api
        .export_records(history_id)?
        .into_iter()
        .find(|record| record.up_to_date))
}

/// Galaxy REST client with retry on rate limiting and upstream outages.
pub struct GalaxyClient {
    base_url: String,
    api_key: String,
    client: Client,
    retry: RetryPolicy,
}

impl GalaxyClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiverError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send the request built by `build`, retrying transient failures.
    ///
    /// Only connection failures (request never reached the server) and
    /// retryable statuses are retried; anything else non-2xx is terminal.
    fn send(&self, url: &str, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            let request = build(&self.client).header(API_KEY_HEADER, &self.api_key);
            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if RetryPolicy::is_retryable_status(status.as_u16()) {
                        if self.retry.allows(attempt) {
                            let delay = self.retry.delay_for(attempt);
                            tracing::debug!(
                                url,
                                status = status.as_u16(),
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "Transient response, backing off"
                            );
                            std::thread::sleep(delay);
                            attempt += 1;
                            continue;
                        }
                        return Err(ArchiverError::Transient {
                            url: url.to_string(),
                            status: status.as_u16(),
                            attempts: attempt + 1,
                        });
                    }
                    let body = response.text().unwrap_or_default();
                    return Err(ArchiverError::Remote {
                        url: url.to_string(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if e.is_connect() && self.retry.allows(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(url, attempt, error = %e, "Connection failed, backing off");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(ArchiverError::Transport {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
        response.json().map_err(|e| ArchiverError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl HistoryApi for GalaxyClient {
    fn history_summary(&self, history_id: &str) -> Result<HistorySummary> {
        let url = self.url(&format!("histories/{}", history_id));
        let response = self.send(&url, |c| c.get(&url).query(&[("view", "summary")]))?;
        Self::decode(&url, response)
    }

    fn export_records(&self, history_id: &str) -> Result<Vec<ExportRecord>> {
        let url = self.url(&format!("histories/{}/exports", history_id));
        let response = self.send(&url, |c| {
            c.get(&url).header(reqwest::header::ACCEPT, EXPORT_ACCEPT)
        })?;
        Self::decode(&url, response)
    }

    fn create_export(&self, history_id: &str, request: &ExportRequest) -> Result<ExportTask> {
        let url = self.url(&format!("histories/{}/write_store", history_id));
        let response = self.send(&url, |c| c.post(&url).json(request))?;
        Self::decode(&url, response)
    }

    fn task_state(&self, task_id: &str) -> Result<TaskState> {
        let url = self.url(&format!("tasks/{}/state", task_id));
        let response = self.send(&url, |c| c.get(&url))?;
        let body = response.text().map_err(|e| ArchiverError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok(TaskState::from_body(&body))
    }

    fn purge_history(&self, history_id: &str, request: &PurgeRequest) -> Result<()> {
        let url = self.url(&format!("histories/{}/archive", history_id));
        self.send(&url, |c| c.post(&url).json(request))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GalaxyClient::new(
            "http://localhost:8080/api/",
            "key",
            Duration::from_secs(5),
            RetryPolicy::none(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api");
        assert_eq!(
            client.url("/histories/abc/exports"),
            "http://localhost:8080/api/histories/abc/exports"
        );
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let client = GalaxyClient::new(
            "http://127.0.0.1:9",
            "key",
            Duration::from_secs(2),
            RetryPolicy::none(),
        )
        .unwrap();
        let err = client.history_summary("abc").unwrap_err();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }
}
