//! Retrieval runs: window planning, content fetches and output.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{CountProbe, Endpoints, LogApi};
use crate::content::{extract_field, parse_document, release};
use crate::controller::{WindowDecision, WindowPlanner};
use crate::count::CountExtractor;
use crate::error::Result;
use crate::sink::LogSink;
use crate::types::{QueryFilter, RunTarget, TimeInterval, WindowPolicy, format_timestamp};

/// Field extracted from search results unless configured otherwise.
pub const DEFAULT_CONTENT_FIELD: &str = "content";

/// Everything that identifies one retrieval run.
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Interval to retrieve.
    pub target: RunTarget,
    /// Filter sent with every request.
    pub filter: QueryFilter,
    /// Log source whose count is read from aggregate responses.
    pub source: String,
    /// Field collected from search responses.
    pub content_field: String,
    /// Window sizing policy.
    pub policy: WindowPolicy,
}

impl FetchJob {
    /// Creates a job with the default content field and policy.
    #[must_use]
    pub fn new(target: RunTarget, filter: QueryFilter, source: impl Into<String>) -> Self {
        Self {
            target,
            filter,
            source: source.into(),
            content_field: DEFAULT_CONTENT_FIELD.to_string(),
            policy: WindowPolicy::default(),
        }
    }

    /// Sets the extracted field.
    #[must_use]
    pub fn with_content_field(mut self, field: impl Into<String>) -> Self {
        self.content_field = field.into();
        self
    }

    /// Sets the window policy.
    #[must_use]
    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Totals of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Windows whose content was fetched.
    pub windows_fetched: u64,
    /// Windows skipped because they held no entries.
    pub windows_skipped: u64,
    /// Count requests issued.
    pub probes: u64,
    /// Entries appended to the sink.
    pub entries_written: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries from {} windows ({} empty windows skipped, {} count requests)",
            self.entries_written, self.windows_fetched, self.windows_skipped, self.probes
        )
    }
}

/// Drives a run against one API.
pub struct FetchPipeline<A> {
    api: A,
    endpoints: Endpoints,
}

impl<A: LogApi> FetchPipeline<A> {
    /// Creates a pipeline.
    #[must_use]
    pub const fn new(api: A, endpoints: Endpoints) -> Self {
        Self { api, endpoints }
    }

    /// Retrieves `job.target` window by window into `sink`.
    ///
    /// Windows are decided left to right; each accepted window is fetched,
    /// its `content_field` values extracted and appended before the next
    /// window is sized. Searches ask for `job.policy.page_limit` entries, the
    /// same bound the planner sizes windows against. The header is the
    /// caller's responsibility.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run; entries appended before it stay in the sink.
    pub async fn run<S: LogSink>(&self, job: &FetchJob, sink: &mut S) -> Result<RunSummary> {
        let endpoints = self
            .endpoints
            .clone()
            .with_page_limit(job.policy.page_limit);
        let extractor = CountExtractor::new(&job.source)?;
        let probe = CountProbe::new(&self.api, &endpoints, &job.filter, &extractor);
        let mut planner = WindowPlanner::new(job.target, job.policy.clone())?;
        let mut summary = RunSummary::default();

        info!(
            interval = %job.target.interval(),
            filter = %job.filter,
            "starting retrieval"
        );

        while let Some(decision) = planner.next_decision(&probe).await? {
            match decision {
                WindowDecision::Skipped { .. } => summary.windows_skipped += 1,
                WindowDecision::Accepted { window, count } => {
                    let entries = self.fetch_window(&endpoints, &window, job).await?;
                    sink.append(&entries)?;
                    summary.windows_fetched += 1;
                    summary.entries_written += entries.len() as u64;
                    info!(
                        window_start = %format_timestamp(&window.start()),
                        window_end = %format_timestamp(&window.end()),
                        count,
                        written = entries.len(),
                        percent_done = progress(&job.target, &window),
                        "window retrieved"
                    );
                }
            }
        }

        summary.probes = planner.probes();
        info!(
            windows_fetched = summary.windows_fetched,
            windows_skipped = summary.windows_skipped,
            probes = summary.probes,
            entries_written = summary.entries_written,
            "retrieval complete"
        );
        Ok(summary)
    }

    async fn fetch_window(
        &self,
        endpoints: &Endpoints,
        window: &TimeInterval,
        job: &FetchJob,
    ) -> Result<Vec<String>> {
        let url = endpoints.search_url(window, &job.filter);
        let body = self.api.fetch(&url).await?;
        let document = parse_document(&body)?;
        let entries = extract_field(&document, &job.content_field);
        release(document);
        debug!(window = %window, entries = entries.len(), "extracted window content");

        if entries.len() as u64 >= endpoints.page_limit() {
            warn!(
                window = %window,
                limit = endpoints.page_limit(),
                "search returned a full page, later entries of this window may be missing"
            );
        }
        Ok(entries)
    }
}

/// Share of the target covered once `window` is done, in percent.
fn progress(target: &RunTarget, window: &TimeInterval) -> f64 {
    let span = target.span().num_milliseconds();
    if span == 0 {
        return 100.0;
    }
    let done = (window.end() - target.from()).num_milliseconds();
    done as f64 * 100.0 / span as f64
}
