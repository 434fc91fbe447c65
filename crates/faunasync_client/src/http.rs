//! Blocking HTTP implementation of the transport traits
//!
//! One request is in flight at a time; the calling thread blocks for the
//! duration of each request. Every request is wrapped in a bounded retry
//! loop with exponential backoff: network failures and server-side errors
//! (5xx, 429) are retried up to `max_retry` times, anything else fails fast.

use crate::error::{Result, TransferError};
use crate::transport::{Catalog, Transport};
use crate::types::{DiffEntry, GroupId, LogicalGroup, Page, Query, Record};
use crate::{OBSERVATIONS_LIST, TAXO_GROUPS};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Base backoff between retries (doubles each attempt)
const RETRY_BACKOFF_BASE_MS: u64 = 2_000;
/// Backoff ceiling
const RETRY_BACKOFF_MAX_MS: u64 = 60_000;
/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Wire date format expected by the remote listing API
const WIRE_DATETIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Connection settings for a remote site.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL of the site, used as prefix for API calls
    pub base_url: String,
    /// Account email, passed with every request
    pub user_email: String,
    /// Account password
    pub user_pw: String,
    /// Per-application API key issued by the site
    pub client_key: String,
    /// Maximum retries per request before giving up
    pub max_retry: u32,
}

/// Blocking HTTP transport with bounded retry.
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, controler: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url.trim_end_matches('/'),
            controler.trim_start_matches('/')
        )
    }

    /// Issue one GET with retry, returning the decoded JSON body.
    fn get_json(&self, url: &str, query: &Query) -> Result<Value> {
        let params: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.clone(), value_to_param(v)))
            .chain([
                ("user_email".to_string(), self.config.user_email.clone()),
                ("user_pw".to_string(), self.config.user_pw.clone()),
            ])
            .collect();

        retry_request(url, self.config.max_retry.max(1), backoff_delay, || {
            let response = self
                .client
                .get(url)
                .header("X-Client-Key", &self.config.client_key)
                .query(&params)
                .send();

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<Value>() {
                            Ok(body) => Attempt::Done(body),
                            Err(e) => Attempt::Abort(TransferError::Http(e)),
                        }
                    } else if is_retryable(status) {
                        Attempt::Retry(format!("status {status}"))
                    } else {
                        Attempt::Abort(TransferError::Status {
                            status,
                            url: url.to_string(),
                        })
                    }
                }
                Err(e) => Attempt::Retry(e.to_string()),
            }
        })
    }
}

/// One classified request attempt.
enum Attempt {
    /// Successful response, decoded body
    Done(Value),
    /// Transient failure worth another attempt
    Retry(String),
    /// Permanent failure, surfaced immediately
    Abort(TransferError),
}

/// Bounded retry loop: run `attempt` up to `attempts` times, sleeping
/// `delay(n)` before retry n+1. Exhausting the budget surfaces the last
/// transient failure.
fn retry_request<F>(
    url: &str,
    attempts: u32,
    delay: fn(u32) -> Duration,
    mut attempt: F,
) -> Result<Value>
where
    F: FnMut() -> Attempt,
{
    let mut last_error = String::new();
    for n in 0..attempts {
        if n > 0 {
            let pause = delay(n - 1);
            warn!(url, attempt = n, delay_ms = pause.as_millis() as u64, "Retrying request");
            std::thread::sleep(pause);
        }

        match attempt() {
            Attempt::Done(body) => return Ok(body),
            Attempt::Abort(err) => return Err(err),
            Attempt::Retry(reason) => {
                debug!(url, attempt = n, error = %reason, "Request attempt failed");
                last_error = reason;
            }
        }
    }

    Err(TransferError::RetriesExhausted {
        attempts,
        last_error,
    })
}

impl Transport for HttpTransport {
    fn fetch(&self, controler: &str, query: &Query) -> Result<Page> {
        let body = self.get_json(&self.api_url(controler), query)?;
        parse_page(body)
    }

    fn diff(&self, group: &GroupId, since: DateTime<Utc>) -> Result<Vec<DiffEntry>> {
        let mut query = Query::new();
        query.insert("id_taxo_group".into(), Value::String(group.0.clone()));
        query.insert(
            "modification_type".into(),
            Value::String("only_modified".into()),
        );
        query.insert(
            "date".into(),
            Value::String(since.format(WIRE_DATETIME_FORMAT).to_string()),
        );
        let url = format!("{}/diff", self.api_url(OBSERVATIONS_LIST));
        let body = self.get_json(&url, &query)?;
        let entries: Vec<DiffEntry> = serde_json::from_value(body)?;
        Ok(entries)
    }
}

impl Catalog for HttpTransport {
    fn list_groups(&self) -> Result<Vec<LogicalGroup>> {
        let body = self.get_json(&self.api_url(TAXO_GROUPS), &Query::new())?;
        let data = body
            .get("data")
            .ok_or_else(|| TransferError::Malformed("catalog response has no 'data'".into()))?;
        let groups: Vec<LogicalGroup> = serde_json::from_value(data.clone())?;
        Ok(groups)
    }
}

/// Whether a status is worth retrying (server-side or throttling).
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Exponential backoff: base * 2^attempt, capped.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = RETRY_BACKOFF_BASE_MS
        .saturating_mul(1u64 << attempt.min(16))
        .min(RETRY_BACKOFF_MAX_MS);
    Duration::from_millis(ms)
}

/// Ids arrive either as strings or bare numbers depending on the endpoint.
fn id_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Render one query parameter for the URL.
fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode one page from a response body.
///
/// Expected shape: `{"data": [ ... ], "pagination_key": "..."}` where
/// `pagination_key` is absent on the final page. Each item must carry a
/// stable id under `id` (long form) or `id_sighting` (short form).
pub fn parse_page(body: Value) -> Result<Page> {
    let items = match body.get("data") {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(TransferError::Malformed(format!(
                "'data' is not an array: {other}"
            )))
        }
        None => Vec::new(),
    };

    let continuation = body
        .get("pagination_key")
        .and_then(Value::as_str)
        .map(str::to_string);

    let records = items
        .into_iter()
        .map(|item| {
            let id = item
                .get("id")
                .or_else(|| item.get("id_sighting"))
                .and_then(id_as_string)
                .ok_or_else(|| {
                    TransferError::Malformed(format!("record has no id: {item}"))
                })?;
            Ok(Record { id, payload: item })
        })
        .collect::<Result<Vec<Record>>>()?;

    Ok(Page {
        items: records,
        continuation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_with_continuation() {
        let body = json!({
            "data": [
                {"id": "101", "species": "Parus major"},
                {"id": "102", "species": "Turdus merula"}
            ],
            "pagination_key": "abc123"
        });
        let page = parse_page(body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "101");
        assert_eq!(page.continuation.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_page_final_chunk() {
        let body = json!({"data": [{"id_sighting": "7"}]});
        let page = parse_page(body).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "7");
        assert!(page.continuation.is_none());
    }

    #[test]
    fn test_parse_page_empty_body() {
        let page = parse_page(json!({})).unwrap();
        assert!(page.items.is_empty());
        assert!(page.continuation.is_none());
    }

    #[test]
    fn test_parse_page_accepts_numeric_id() {
        let body = json!({"data": [{"id": 4242}]});
        let page = parse_page(body).unwrap();
        assert_eq!(page.items[0].id, "4242");
    }

    #[test]
    fn test_parse_page_rejects_missing_id() {
        let body = json!({"data": [{"species": "unknown"}]});
        assert!(matches!(
            parse_page(body),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(1), Duration::from_millis(4_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(8_000));
        assert_eq!(backoff_delay(10), Duration::from_millis(60_000));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(60_000));
    }

    #[test]
    fn test_retry_exhaustion_after_max_attempts() {
        let calls = std::cell::Cell::new(0u32);
        let result = retry_request("http://test/api", 3, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Attempt::Retry(format!("status 503 (attempt {})", calls.get()))
        });

        assert_eq!(calls.get(), 3, "the loop must use the whole retry budget");
        match result {
            Err(TransferError::RetriesExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("attempt 3"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_recovers_on_later_attempt() {
        let calls = std::cell::Cell::new(0u32);
        let body = retry_request("http://test/api", 3, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Attempt::Retry("connection reset".to_string())
            } else {
                Attempt::Done(json!({"data": []}))
            }
        })
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(body, json!({"data": []}));
    }

    #[test]
    fn test_fatal_status_fails_without_retrying() {
        let calls = std::cell::Cell::new(0u32);
        let result = retry_request("http://test/api", 5, |_| Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Attempt::Abort(TransferError::Status {
                status: StatusCode::UNAUTHORIZED,
                url: "http://test/api".to_string(),
            })
        });

        assert_eq!(calls.get(), 1, "a permanent failure must not be retried");
        assert!(matches!(result, Err(TransferError::Status { .. })));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }
}
