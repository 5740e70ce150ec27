//! In-memory [`LogApi`] implementations for tests.
//!
//! - [`ScriptedApi`] — Replays a fixed queue of responses, whatever the URL
//! - [`SyntheticLogApi`] — Serves aggregate and search requests from a list of
//!   timestamped entries, like a real server would

use std::collections::VecDeque;

use chrono::DateTime;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use url::Url;

use crate::api::{AGGREGATE_PATH, LogApi, SEARCH_PATH};
use crate::error::{Result, SliceError};
use crate::types::{PAGE_LIMIT, TimeInterval, Timestamp, format_timestamp};

/// Aggregate response body reporting `count` entries for `source`.
///
/// A zero count omits the source, as the server does for empty groups.
#[must_use]
pub fn aggregate_body(source: &str, count: u64) -> String {
    let mut groups = Map::new();
    if count > 0 {
        groups.insert(source.to_string(), Value::from(count));
    }
    json!({
        "aggregationResult": {
            "timeBuckets": 1,
            "log.source": groups,
        }
    })
    .to_string()
}

/// Search response body holding `entries` in the given order.
#[must_use]
pub fn search_body<'a>(entries: impl IntoIterator<Item = (&'a Timestamp, &'a str)>) -> String {
    let results: Vec<Value> = entries
        .into_iter()
        .map(|(ts, content)| {
            json!({
                "timestamp": format_timestamp(ts),
                "content": content,
                "additionalColumns": {"loglevel": ["INFO"]},
            })
        })
        .collect();
    let slice_size = results.len();
    json!({"results": results, "sliceSize": slice_size}).to_string()
}

/// Reason phrase for the handful of statuses tests script.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Extracts the `from`/`to` window of a request URL.
///
/// # Errors
///
/// Returns [`SliceError::Request`] if the URL or its bounds do not parse.
pub fn window_of(url: &str) -> Result<TimeInterval> {
    let parsed = Url::parse(url).map_err(|e| SliceError::Request(e.to_string()))?;
    let bound = |key: &str| -> Result<Timestamp> {
        let value = parsed
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| SliceError::Request(format!("missing '{key}' in {url}")))?;
        DateTime::parse_from_rfc3339(&value).map_err(|e| SliceError::Request(e.to_string()))
    };
    TimeInterval::new(bound("from")?, bound("to")?)
}

enum Scripted {
    Body(String),
    Status(u16),
}

/// Replays queued responses in order and records every requested URL.
pub struct ScriptedApi {
    source: String,
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedApi {
    /// Creates an empty script for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues an aggregate response reporting `count` entries.
    pub fn push_count(&self, count: u64) {
        let body = aggregate_body(&self.source, count);
        self.responses.lock().push_back(Scripted::Body(body));
    }

    /// Queues a raw response body.
    pub fn push_body(&self, body: impl Into<String>) {
        self.responses.lock().push_back(Scripted::Body(body.into()));
    }

    /// Queues a failed response.
    pub fn push_status(&self, status: u16) {
        self.responses.lock().push_back(Scripted::Status(status));
    }

    /// Every URL requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Windows of every request so far, in request order.
    #[must_use]
    pub fn requested_windows(&self) -> Vec<TimeInterval> {
        self.requests
            .lock()
            .iter()
            .filter_map(|url| window_of(url).ok())
            .collect()
    }

    /// Responses not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

impl LogApi for ScriptedApi {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().push(url.to_string());
        match self.responses.lock().pop_front() {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(SliceError::Transport {
                status,
                reason: reason_phrase(status).to_string(),
                url: url.to_string(),
            }),
            None => Err(SliceError::Request(format!("no scripted response for {url}"))),
        }
    }
}

/// Serves requests from a fixed set of timestamped entries.
///
/// Aggregate requests report the exact number of entries in the window;
/// search requests return at most one page of them, oldest first.
pub struct SyntheticLogApi {
    source: String,
    entries: Vec<(Timestamp, String)>,
    page_limit: usize,
    requests: Mutex<Vec<String>>,
}

impl SyntheticLogApi {
    /// Creates the server; entries may be given in any order.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        entries: impl IntoIterator<Item = (Timestamp, String)>,
    ) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|(ts, _)| *ts);
        Self {
            source: source.into(),
            entries,
            page_limit: PAGE_LIMIT as usize,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the search page size.
    #[must_use]
    pub const fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// Entries whose timestamp falls in `window`.
    #[must_use]
    pub fn entries_in(&self, window: &TimeInterval) -> &[(Timestamp, String)] {
        let lo = self.entries.partition_point(|(ts, _)| *ts < window.start());
        let hi = self.entries.partition_point(|(ts, _)| *ts < window.end());
        &self.entries[lo..hi]
    }

    /// Number of entries in `window`.
    #[must_use]
    pub fn count_in(&self, window: &TimeInterval) -> u64 {
        self.entries_in(window).len() as u64
    }

    /// Every URL requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Windows requested from the search endpoint, in order.
    #[must_use]
    pub fn search_windows(&self) -> Vec<TimeInterval> {
        self.requests
            .lock()
            .iter()
            .filter(|url| url.contains(SEARCH_PATH))
            .filter_map(|url| window_of(url).ok())
            .collect()
    }

    /// Number of aggregate requests so far.
    #[must_use]
    pub fn aggregate_requests(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|url| url.contains(AGGREGATE_PATH))
            .count()
    }
}

impl LogApi for SyntheticLogApi {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().push(url.to_string());
        let window = window_of(url)?;
        if url.contains(AGGREGATE_PATH) {
            return Ok(aggregate_body(&self.source, self.count_in(&window)));
        }
        if url.contains(SEARCH_PATH) {
            let page = self
                .entries_in(&window)
                .iter()
                .take(self.page_limit)
                .map(|(ts, content)| (ts, content.as_str()));
            return Ok(search_body(page));
        }
        Err(SliceError::Transport {
            status: 404,
            reason: reason_phrase(404).to_string(),
            url: url.to_string(),
        })
    }
}
