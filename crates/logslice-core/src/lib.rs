//! # logslice-core
//!
//! Adaptive time-window slicing for log search APIs that cap every response
//! at a fixed page of entries.
//!
//! This crate provides:
//!
//! - [`WindowPlanner`] — Sizes windows from aggregate counts so each fits a page
//! - [`FetchPipeline`] — Plans, fetches and writes a whole run
//! - [`CountExtractor`] — Reads one source's count from an aggregate response
//! - [`extract_field`] — Collects every value stored under a field, in pre-order
//! - [`LogApi`] — The fetch capability, with [`fake`] implementations for tests
//! - [`LogSink`] — Append-only output, with [`FileSink`] and [`MemorySink`]
//!
//! ## Example
//!
//! ```rust
//! use chrono::{DateTime, TimeDelta};
//! use logslice_core::fake::SyntheticLogApi;
//! use logslice_core::{Endpoints, FetchJob, FetchPipeline, MemorySink, QueryFilter, RunTarget};
//!
//! # tokio_test_block(async {
//! let from = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap();
//! let entries = (0..10).map(|i| (from + TimeDelta::minutes(i), format!("line {i}")));
//! let api = SyntheticLogApi::new("stdout", entries);
//!
//! let target = RunTarget::new(from, from + TimeDelta::hours(1)).unwrap();
//! let job = FetchJob::new(target, QueryFilter::for_source("ns", None, "stdout"), "stdout");
//! let pipeline = FetchPipeline::new(&api, Endpoints::new("https://logs.example.com"));
//! let mut sink = MemorySink::new();
//!
//! let summary = pipeline.run(&job, &mut sink).await.unwrap();
//! assert_eq!(summary.entries_written, 10);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod content;
pub mod controller;
pub mod count;
pub mod error;
pub mod fake;
pub mod pipeline;
pub mod sink;
pub mod types;

// Re-export main types
pub use api::{AGGREGATE_PATH, CountProbe, Endpoints, LogApi, SEARCH_PATH};
pub use content::{extract_field, parse_document, release};
pub use controller::{WindowDecision, WindowPlanner};
pub use count::CountExtractor;
pub use error::{Result, SliceError};
pub use pipeline::{DEFAULT_CONTENT_FIELD, FetchJob, FetchPipeline, RunSummary};
pub use sink::{BANNER, FileSink, LogSink, MemorySink, RunHeader};
pub use types::{
    DEFAULT_GROWTH_FACTOR, DEFAULT_MAX_PROBES, GROW_BELOW, PAGE_LIMIT, QueryFilter, RunTarget,
    SaturationPolicy, SearchState, TimeInterval, Timestamp, WindowPolicy, format_timestamp,
};
