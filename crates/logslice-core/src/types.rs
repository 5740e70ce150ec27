//! Core types for window slicing.
//!
//! This module provides:
//! - [`TimeInterval`] — Half-open time window `[start, end)`
//! - [`RunTarget`] — Fixed outer bound of a retrieval run
//! - [`SearchState`] — Cursor, proposed window end and delta of the controller
//! - [`QueryFilter`] — Predicate string shared by every window of a run
//! - [`WindowPolicy`] — Thresholds and guards of the window controller

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, SubsecRound, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};

/// Timestamps carry the offset of the zone they were configured in, so the
/// rendered query parameters read the same way the operator wrote them.
pub type Timestamp = DateTime<FixedOffset>;

/// Maximum number of entries the search endpoint returns per request.
pub const PAGE_LIMIT: u64 = 1000;

/// Windows reporting fewer entries than this are widened.
pub const GROW_BELOW: u64 = 250;

/// Default geometric growth multiplier for sparse windows.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.1;

/// Default cap on count requests spent sizing a single window.
pub const DEFAULT_MAX_PROBES: u32 = 1024;

/// Renders a timestamp as ISO-8601 with millisecond precision.
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// A half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeInterval {
    start: Timestamp,
    end: Timestamp,
}

impl TimeInterval {
    /// Creates an interval, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::InvalidInterval`] when the bounds are reversed.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if start > end {
            return Err(SliceError::InvalidInterval(format!(
                "start {} is after end {}",
                format_timestamp(&start),
                format_timestamp(&end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> Timestamp {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> Timestamp {
        self.end
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// True if the window has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Checks if a timestamp falls within this window.
    #[must_use]
    pub fn contains(&self, ts: &Timestamp) -> bool {
        *ts >= self.start && *ts < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            format_timestamp(&self.start),
            format_timestamp(&self.end)
        )
    }
}

/// The fixed outer bound `[from, to)` of a whole retrieval run.
///
/// Bounds are truncated to whole milliseconds, the precision of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTarget {
    from: Timestamp,
    to: Timestamp,
}

impl RunTarget {
    /// Creates a run target.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::InvalidInterval`] if `from > to`.
    pub fn new(from: Timestamp, to: Timestamp) -> Result<Self> {
        let interval = TimeInterval::new(from.trunc_subsecs(3), to.trunc_subsecs(3))?;
        Ok(Self {
            from: interval.start,
            to: interval.end,
        })
    }

    /// Start of the run.
    #[must_use]
    pub const fn from(&self) -> Timestamp {
        self.from
    }

    /// End of the run.
    #[must_use]
    pub const fn to(&self) -> Timestamp {
        self.to
    }

    /// Total length of the run.
    #[must_use]
    pub fn span(&self) -> TimeDelta {
        self.to - self.from
    }

    /// The run as a single interval.
    #[must_use]
    pub const fn interval(&self) -> TimeInterval {
        TimeInterval {
            start: self.from,
            end: self.to,
        }
    }
}

/// Snapshot of the window controller between decisions.
///
/// `cursor` is the start of the region not yet retrieved, `window_end` the
/// end of the next candidate window and `delta` the stride used to propose it.
/// `window_end` equals `cursor + delta` unless clamped to the run end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    /// Start of the not-yet-retrieved region.
    pub cursor: Timestamp,
    /// End of the currently proposed window.
    pub window_end: Timestamp,
    /// Current window stride.
    pub delta: TimeDelta,
}

/// Opaque predicate string sent as the `query` parameter of every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFilter(String);

impl QueryFilter {
    /// Uses a caller-supplied expression verbatim.
    #[must_use]
    pub fn raw(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Builds the namespace/pod/source conjunction.
    #[must_use]
    pub fn for_source(namespace: &str, pod: Option<&str>, source: &str) -> Self {
        let mut clauses = vec![format!("k8s.namespace.name={}", quote(namespace))];
        if let Some(pod) = pod {
            clauses.push(format!("k8s.pod.name={}", quote(pod)));
        }
        clauses.push(format!("log.source={}", quote(source)));
        Self(clauses.join(" AND "))
    }

    /// The expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// What to do when a window at the minimum delta still fills a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturationPolicy {
    /// Abort the run.
    Fail,
    /// Fetch the window anyway; entries beyond the page limit are lost.
    #[default]
    Accept,
}

/// Thresholds and guards of the window controller.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPolicy {
    /// Multiplier applied to delta when a window is sparse. Must exceed 1.
    pub growth_factor: f64,
    /// Counts below this (and above zero) widen the window.
    pub grow_below: u64,
    /// Counts at or above this shrink the window.
    pub page_limit: u64,
    /// Delta is never halved below this.
    pub min_delta: TimeDelta,
    /// Maximum count requests per decision.
    pub max_probes: u32,
    /// Behaviour at the minimum delta.
    pub on_saturation: SaturationPolicy,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            growth_factor: DEFAULT_GROWTH_FACTOR,
            grow_below: GROW_BELOW,
            page_limit: PAGE_LIMIT,
            min_delta: TimeDelta::milliseconds(1),
            max_probes: DEFAULT_MAX_PROBES,
            on_saturation: SaturationPolicy::Accept,
        }
    }
}

impl WindowPolicy {
    /// Sets the growth factor.
    #[must_use]
    pub const fn with_growth_factor(mut self, factor: f64) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Sets the minimum delta.
    #[must_use]
    pub const fn with_min_delta(mut self, min_delta: TimeDelta) -> Self {
        self.min_delta = min_delta;
        self
    }

    /// Sets the per-decision probe cap.
    #[must_use]
    pub const fn with_max_probes(mut self, max_probes: u32) -> Self {
        self.max_probes = max_probes;
        self
    }

    /// Sets the saturation policy.
    #[must_use]
    pub const fn with_saturation(mut self, policy: SaturationPolicy) -> Self {
        self.on_saturation = policy;
        self
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`SliceError::InvalidPolicy`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(SliceError::InvalidPolicy(format!(
                "growth factor must be a finite number above 1, got {}",
                self.growth_factor
            )));
        }
        if self.grow_below == 0 || self.grow_below >= self.page_limit {
            return Err(SliceError::InvalidPolicy(format!(
                "grow threshold {} must be between 1 and the page limit {}",
                self.grow_below, self.page_limit
            )));
        }
        if self.min_delta < TimeDelta::milliseconds(1) {
            return Err(SliceError::InvalidPolicy(
                "minimum delta must be at least one millisecond".to_string(),
            ));
        }
        if self.max_probes == 0 {
            return Err(SliceError::InvalidPolicy(
                "max probes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
