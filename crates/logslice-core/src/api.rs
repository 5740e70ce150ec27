//! Access to the log-search API.
//!
//! This module provides:
//! - [`LogApi`] — The single fetch capability every request goes through
//! - [`Endpoints`] — URL construction for the aggregate and search endpoints
//! - [`CountProbe`] — Counts the entries of one window

use tracing::trace;
use url::form_urlencoded::Serializer;

use crate::count::CountExtractor;
use crate::error::Result;
use crate::types::{PAGE_LIMIT, QueryFilter, TimeInterval, format_timestamp};

/// Fetches a URL and returns the response body.
///
/// Implementations return [`crate::SliceError::Transport`] for any status
/// other than 200. Nothing above this trait retries.
#[allow(async_fn_in_trait)]
pub trait LogApi {
    /// Performs a GET request.
    async fn fetch(&self, url: &str) -> Result<String>;
}

impl<T: LogApi + ?Sized> LogApi for &T {
    async fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url).await
    }
}

/// Path of the aggregate (count) endpoint.
pub const AGGREGATE_PATH: &str = "/rest/v2/logs/aggregate";

/// Path of the search (content) endpoint.
pub const SEARCH_PATH: &str = "/rest/v2/logs/search";

/// Builds request URLs against one API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    page_limit: u64,
}

impl Endpoints {
    /// Creates endpoints for `base_url`; a trailing slash is ignored.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            page_limit: PAGE_LIMIT,
        }
    }

    /// Overrides the `limit` sent to the search endpoint.
    #[must_use]
    pub const fn with_page_limit(mut self, page_limit: u64) -> Self {
        self.page_limit = page_limit;
        self
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The `limit` sent to the search endpoint.
    #[must_use]
    pub const fn page_limit(&self) -> u64 {
        self.page_limit
    }

    /// URL counting entries per `log.source` within `window`.
    #[must_use]
    pub fn aggregate_url(&self, window: &TimeInterval, filter: &QueryFilter) -> String {
        let query = Serializer::new(String::new())
            .append_pair("query", filter.as_str())
            .append_pair("maxGroupValues", "100")
            .append_pair("timeBuckets", "1")
            .append_pair("groupBy", "log.source")
            .append_pair("from", &format_timestamp(&window.start()))
            .append_pair("to", &format_timestamp(&window.end()))
            .finish();
        format!("{}{AGGREGATE_PATH}?{query}", self.base_url)
    }

    /// URL returning the entries of `window`, oldest first.
    #[must_use]
    pub fn search_url(&self, window: &TimeInterval, filter: &QueryFilter) -> String {
        let query = Serializer::new(String::new())
            .append_pair("from", &format_timestamp(&window.start()))
            .append_pair("to", &format_timestamp(&window.end()))
            .append_pair("limit", &self.page_limit.to_string())
            .append_pair("sort", "timestamp")
            .append_pair("query", filter.as_str())
            .finish();
        format!("{}{SEARCH_PATH}?{query}", self.base_url)
    }
}

/// Counts the entries of one source within a window.
pub struct CountProbe<'a, A> {
    api: &'a A,
    endpoints: &'a Endpoints,
    filter: &'a QueryFilter,
    extractor: &'a CountExtractor,
}

impl<'a, A: LogApi> CountProbe<'a, A> {
    /// Creates a probe.
    #[must_use]
    pub const fn new(
        api: &'a A,
        endpoints: &'a Endpoints,
        filter: &'a QueryFilter,
        extractor: &'a CountExtractor,
    ) -> Self {
        Self {
            api,
            endpoints,
            filter,
            extractor,
        }
    }

    /// Requests the aggregate for `window` and extracts the source's count.
    ///
    /// # Errors
    ///
    /// Propagates any fetch failure.
    pub async fn count(&self, window: &TimeInterval) -> Result<u64> {
        let url = self.endpoints.aggregate_url(window, self.filter);
        let body = self.api.fetch(&url).await?;
        let count = self.extractor.extract(&body);
        trace!(window = %window, count, "probed window");
        Ok(count)
    }
}
