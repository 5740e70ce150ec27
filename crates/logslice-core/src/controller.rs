//! Adaptive window sizing.
//!
//! The search API caps each response at a page of entries and has no
//! continuation token, so the run interval is cut into windows whose count,
//! probed through the cheap aggregate endpoint, fits in one page.
//!
//! Each decision starts from the proposal `[cursor, cursor + delta)` clamped
//! to the run end and loops on the probed count `n`:
//!
//! | count                   | action                                         |
//! |-------------------------|------------------------------------------------|
//! | `n == 0`                | skip the window, keep delta                    |
//! | `0 < n < grow_below`    | multiply delta by the growth factor, re-probe  |
//! |                         | (only while the grown window stays in bounds)  |
//! | `n < page_limit`        | accept                                         |
//! | `n >= page_limit`       | halve delta, re-probe                          |
//!
//! Termination is enforced by a delta floor and a per-decision probe cap.

use chrono::TimeDelta;
use tracing::{debug, warn};

use crate::api::{CountProbe, LogApi};
use crate::error::{Result, SliceError};
use crate::types::{
    RunTarget, SaturationPolicy, SearchState, TimeInterval, Timestamp, WindowPolicy,
    format_timestamp,
};

/// Outcome of sizing one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// The window fits in one page and holds `count` entries.
    Accepted {
        /// The window to fetch.
        window: TimeInterval,
        /// Entries reported by the last probe.
        count: u64,
    },
    /// The window holds no entries.
    Skipped {
        /// The empty window.
        window: TimeInterval,
    },
}

impl WindowDecision {
    /// The window this decision covers.
    #[must_use]
    pub const fn window(&self) -> TimeInterval {
        match self {
            Self::Accepted { window, .. } | Self::Skipped { window } => *window,
        }
    }

    /// True for [`WindowDecision::Accepted`].
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Walks a run target left to right, one window decision at a time.
///
/// The planner is a lazy, finite, non-restartable sequence: every call to
/// [`WindowPlanner::next_decision`] probes until it can accept or skip the
/// window at the cursor, then moves the cursor to that window's end.
/// Decisions are contiguous, never overlap, and together cover the target.
#[derive(Debug, Clone)]
pub struct WindowPlanner {
    target: RunTarget,
    policy: WindowPolicy,
    cursor: Timestamp,
    delta: TimeDelta,
    probes: u64,
}

impl WindowPlanner {
    /// Starts a plan whose first proposal spans the whole target.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn new(target: RunTarget, policy: WindowPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            target,
            cursor: target.from(),
            delta: target.span().max(policy.min_delta),
            policy,
            probes: 0,
        })
    }

    /// Current cursor, proposed window end and delta.
    #[must_use]
    pub fn state(&self) -> SearchState {
        SearchState {
            cursor: self.cursor,
            window_end: self.propose(self.cursor, self.delta),
            delta: self.delta,
        }
    }

    /// True once the cursor has reached the end of the target.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.target.to()
    }

    /// Total count requests issued so far.
    #[must_use]
    pub const fn probes(&self) -> u64 {
        self.probes
    }

    /// Sizes the next window, or returns `None` when the target is covered.
    ///
    /// # Errors
    ///
    /// Propagates count failures, and fails when the probe cap is hit or a
    /// window at the minimum delta is saturated under [`SaturationPolicy::Fail`].
    pub async fn next_decision<A: LogApi>(
        &mut self,
        probe: &CountProbe<'_, A>,
    ) -> Result<Option<WindowDecision>> {
        if self.is_finished() {
            return Ok(None);
        }

        let cursor = self.cursor;
        let mut delta = self.delta;
        let mut window_end = self.propose(cursor, delta);
        let mut probes = 0u32;

        let decision = loop {
            if probes >= self.policy.max_probes {
                return Err(SliceError::ProbeLimit {
                    cursor: format_timestamp(&cursor),
                    probes,
                });
            }

            let window = TimeInterval::new(cursor, window_end)?;
            let count = probe.count(&window).await?;
            probes += 1;
            self.probes += 1;

            if count == 0 {
                debug!(window = %window, "no entries, skipping window");
                break WindowDecision::Skipped { window };
            }

            if count < self.policy.grow_below {
                let grown = grow(delta, self.policy.growth_factor);
                let headroom = window_end
                    .checked_add_signed(grown)
                    .is_some_and(|end| end < self.target.to());
                if headroom {
                    debug!(
                        window = %window,
                        count,
                        delta_ms = grown.num_milliseconds(),
                        "sparse window, increasing delta"
                    );
                    delta = grown;
                    window_end = self.propose(cursor, delta);
                    continue;
                }
                break WindowDecision::Accepted { window, count };
            }

            if count < self.policy.page_limit {
                break WindowDecision::Accepted { window, count };
            }

            let span = window_end - cursor;
            if span <= self.policy.min_delta {
                match self.policy.on_saturation {
                    SaturationPolicy::Fail => {
                        return Err(SliceError::Saturated { window, count });
                    }
                    SaturationPolicy::Accept => {
                        warn!(
                            window = %window,
                            count,
                            "window at minimum size exceeds the page limit, entries will be missing"
                        );
                        break WindowDecision::Accepted { window, count };
                    }
                }
            }

            delta = halve(span, self.policy.min_delta);
            debug!(
                window = %window,
                count,
                delta_ms = delta.num_milliseconds(),
                "dense window, reducing delta"
            );
            window_end = self.propose(cursor, delta);
        };

        self.cursor = decision.window().end();
        self.delta = delta;
        Ok(Some(decision))
    }

    /// `cursor + delta`, clamped to the end of the target.
    fn propose(&self, cursor: Timestamp, delta: TimeDelta) -> Timestamp {
        cursor
            .checked_add_signed(delta)
            .map_or(self.target.to(), |end| end.min(self.target.to()))
    }
}

/// Multiplies `delta` by `factor` at millisecond precision, always growing
/// by at least one millisecond.
fn grow(delta: TimeDelta, factor: f64) -> TimeDelta {
    let ms = delta.num_milliseconds();
    let scaled = (ms as f64 * factor).round();
    let grown = if scaled >= (i64::MAX / 2) as f64 {
        i64::MAX / 2
    } else {
        scaled as i64
    };
    TimeDelta::milliseconds(grown.max(ms + 1))
}

/// Halves `span` at millisecond precision without going below `floor`.
fn halve(span: TimeDelta, floor: TimeDelta) -> TimeDelta {
    TimeDelta::milliseconds(span.num_milliseconds() / 2).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Endpoints;
    use crate::count::CountExtractor;
    use crate::fake::ScriptedApi;
    use crate::types::{PAGE_LIMIT, QueryFilter};
    use chrono::DateTime;
    use test_case::test_case;

    const SOURCE: &str = "stdout";

    fn ts(s: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn hours(h: i64) -> TimeDelta {
        TimeDelta::hours(h)
    }

    struct Harness {
        api: ScriptedApi,
        endpoints: Endpoints,
        filter: QueryFilter,
        extractor: CountExtractor,
    }

    impl Harness {
        fn new(counts: &[u64]) -> Self {
            let api = ScriptedApi::new(SOURCE);
            for &count in counts {
                api.push_count(count);
            }
            Self {
                api,
                endpoints: Endpoints::new("https://logs.example.com"),
                filter: QueryFilter::for_source("ns", None, SOURCE),
                extractor: CountExtractor::new(SOURCE).unwrap(),
            }
        }

        fn probe(&self) -> CountProbe<'_, ScriptedApi> {
            CountProbe::new(&self.api, &self.endpoints, &self.filter, &self.extractor)
        }

        fn probed_windows(&self) -> Vec<TimeInterval> {
            self.api.requested_windows()
        }
    }

    fn target(from: &str, span: TimeDelta) -> RunTarget {
        let from = ts(from);
        RunTarget::new(from, from + span).unwrap()
    }

    #[tokio::test]
    async fn shrinks_dense_window_then_accepts() {
        let harness = Harness::new(&[1500, 400]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();

        let decision = planner.next_decision(&harness.probe()).await.unwrap();

        let start = run.from();
        assert_eq!(
            decision,
            Some(WindowDecision::Accepted {
                window: TimeInterval::new(start, start + hours(5)).unwrap(),
                count: 400,
            })
        );
        assert_eq!(planner.state().delta, hours(5));
        assert_eq!(planner.state().cursor, start + hours(5));
        assert_eq!(
            harness.probed_windows(),
            vec![
                TimeInterval::new(start, start + hours(10)).unwrap(),
                TimeInterval::new(start, start + hours(5)).unwrap(),
            ]
        );
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Reaction {
        Grow,
        Accept,
        Shrink,
    }

    #[test_case(1, Reaction::Grow ; "single entry grows")]
    #[test_case(249, Reaction::Grow ; "just under grow threshold grows")]
    #[test_case(250, Reaction::Accept ; "grow threshold accepts")]
    #[test_case(999, Reaction::Accept ; "just under page limit accepts")]
    #[test_case(1000, Reaction::Shrink ; "full page shrinks")]
    #[test_case(1001, Reaction::Shrink ; "over page limit shrinks")]
    #[tokio::test]
    async fn reaction_to_first_count(count: u64, expected: Reaction) {
        let harness = Harness::new(&[count, 500]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);
        let t0 = run.from();

        let decision = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        let requested = harness.probed_windows();
        let first = TimeInterval::new(t0, t0 + hours(1)).unwrap();
        assert_eq!(requested.first(), Some(&first));
        let reaction = match requested.as_slice() {
            [only] => {
                assert_eq!(
                    decision,
                    WindowDecision::Accepted {
                        window: *only,
                        count
                    }
                );
                Reaction::Accept
            }
            [_, next] if next.duration() == TimeDelta::milliseconds(3_960_000) => Reaction::Grow,
            [_, next] if next.duration() == TimeDelta::minutes(30) => Reaction::Shrink,
            other => panic!("unexpected count requests {other:?}"),
        };
        assert_eq!(reaction, expected);
        if reaction != Reaction::Accept {
            assert_eq!(
                decision,
                WindowDecision::Accepted {
                    window: requested[1],
                    count: 500,
                }
            );
        }
    }

    #[tokio::test]
    async fn empty_window_is_skipped_with_same_delta() {
        let harness = Harness::new(&[0, 300]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);
        let t0 = run.from();

        let first = planner.next_decision(&harness.probe()).await.unwrap();
        assert_eq!(
            first,
            Some(WindowDecision::Skipped {
                window: TimeInterval::new(t0, t0 + hours(1)).unwrap()
            })
        );
        assert_eq!(planner.state().delta, hours(1));

        let second = planner.next_decision(&harness.probe()).await.unwrap();
        assert_eq!(
            second.map(|d| d.window()),
            Some(TimeInterval::new(t0 + hours(1), t0 + hours(2)).unwrap())
        );
    }

    #[tokio::test]
    async fn sparse_window_grows_by_factor_before_accepting() {
        let harness = Harness::new(&[200, 260]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);
        let t0 = run.from();

        let decision = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        let grown = TimeDelta::milliseconds(3_960_000);
        assert_eq!(
            decision,
            WindowDecision::Accepted {
                window: TimeInterval::new(t0, t0 + grown).unwrap(),
                count: 260,
            }
        );
        assert_eq!(planner.state().delta, grown);
        assert_eq!(harness.probed_windows().len(), 2);
    }

    #[tokio::test]
    async fn sparse_window_without_headroom_is_accepted() {
        let harness = Harness::new(&[10]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();

        let decision = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        assert_eq!(decision.window(), run.interval());
        assert!(decision.is_accepted());
        assert!(planner.is_finished());
        assert_eq!(planner.next_decision(&harness.probe()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn mid_band_count_is_accepted_unchanged() {
        let harness = Harness::new(&[999]);
        let run = target("2024-01-01T00:00:00Z", hours(4));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);

        let decision = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        assert_eq!(decision.window().duration(), hours(1));
        assert_eq!(planner.state().delta, hours(1));
    }

    #[tokio::test]
    async fn final_window_is_clamped_to_run_end() {
        let harness = Harness::new(&[500, 500]);
        let run = target("2024-01-01T00:00:00Z", TimeDelta::minutes(90));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);

        let _ = planner.next_decision(&harness.probe()).await.unwrap();
        let last = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        assert_eq!(last.window().end(), run.to());
        assert_eq!(last.window().duration(), TimeDelta::minutes(30));
        assert!(planner.is_finished());
    }

    #[tokio::test]
    async fn shrinking_a_clamped_window_halves_its_real_span() {
        let harness = Harness::new(&[500, 2000, 400]);
        let run = target("2024-01-01T00:00:00Z", TimeDelta::minutes(70));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();
        planner.delta = hours(1);

        let _ = planner.next_decision(&harness.probe()).await.unwrap();
        let last = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        assert_eq!(last.window().duration(), TimeDelta::minutes(5));
        assert_eq!(planner.state().delta, TimeDelta::minutes(5));
    }

    #[tokio::test]
    async fn saturated_window_fails_when_configured() {
        let harness = Harness::new(&[5000, 5000, 5000]);
        let run = target("2024-01-01T00:00:00Z", TimeDelta::milliseconds(4));
        let policy = WindowPolicy::default().with_saturation(SaturationPolicy::Fail);
        let mut planner = WindowPlanner::new(run, policy).unwrap();

        let result = planner.next_decision(&harness.probe()).await;

        match result {
            Err(SliceError::Saturated { window, count }) => {
                assert_eq!(window.duration(), TimeDelta::milliseconds(1));
                assert_eq!(count, 5000);
            }
            other => panic!("expected saturation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn saturated_window_is_accepted_by_default() {
        let harness = Harness::new(&[5000, 5000]);
        let run = target("2024-01-01T00:00:00Z", TimeDelta::milliseconds(2));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();

        let decision = planner.next_decision(&harness.probe()).await.unwrap().unwrap();

        assert_eq!(
            decision,
            WindowDecision::Accepted {
                window: TimeInterval::new(run.from(), run.from() + TimeDelta::milliseconds(1))
                    .unwrap(),
                count: 5000,
            }
        );
    }

    #[tokio::test]
    async fn probe_cap_is_fatal() {
        let harness = Harness::new(&[2000, 2000, 2000]);
        let run = target("2024-01-01T00:00:00Z", hours(10));
        let policy = WindowPolicy::default().with_max_probes(3);
        let mut planner = WindowPlanner::new(run, policy).unwrap();

        let result = planner.next_decision(&harness.probe()).await;

        assert!(matches!(result, Err(SliceError::ProbeLimit { probes: 3, .. })));
    }

    #[tokio::test]
    async fn count_failure_propagates() {
        let harness = Harness::new(&[]);
        harness.api.push_status(503);
        let run = target("2024-01-01T00:00:00Z", hours(1));
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();

        let result = planner.next_decision(&harness.probe()).await;

        assert!(matches!(result, Err(SliceError::Transport { status: 503, .. })));
        assert_eq!(planner.state().cursor, run.from());
    }

    #[tokio::test]
    async fn empty_target_yields_nothing() {
        let harness = Harness::new(&[]);
        let t = ts("2024-01-01T00:00:00Z");
        let run = RunTarget::new(t, t).unwrap();
        let mut planner = WindowPlanner::new(run, WindowPolicy::default()).unwrap();

        assert!(planner.is_finished());
        assert_eq!(planner.next_decision(&harness.probe()).await.unwrap(), None);
        assert!(harness.probed_windows().is_empty());
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let run = target("2024-01-01T00:00:00Z", hours(1));
        let policy = WindowPolicy::default().with_growth_factor(1.0);
        assert!(WindowPlanner::new(run, policy).is_err());
    }

    #[test]
    fn grow_always_adds_at_least_a_millisecond() {
        assert_eq!(
            grow(TimeDelta::milliseconds(3), 1.1),
            TimeDelta::milliseconds(4)
        );
        assert_eq!(grow(hours(1), 1.1), TimeDelta::milliseconds(3_960_000));
    }

    #[test]
    fn halve_respects_floor() {
        let floor = TimeDelta::milliseconds(1);
        assert_eq!(halve(TimeDelta::milliseconds(3), floor), floor);
        assert_eq!(halve(hours(10), floor), hours(5));
    }

    mod proptest_tests {
        use super::*;
        use crate::fake::SyntheticLogApi;
        use proptest::prelude::*;

        fn run_plan(
            offsets_ms: &[i64],
            span_ms: i64,
            factor: f64,
        ) -> (RunTarget, Vec<WindowDecision>, SyntheticLogApi) {
            let from = ts("2024-01-01T00:00:00Z");
            let run = RunTarget::new(from, from + TimeDelta::milliseconds(span_ms)).unwrap();
            let api = SyntheticLogApi::new(
                SOURCE,
                offsets_ms
                    .iter()
                    .map(|&o| (from + TimeDelta::milliseconds(o), format!("entry {o}"))),
            );
            let endpoints = Endpoints::new("https://logs.example.com");
            let filter = QueryFilter::raw("*");
            let extractor = CountExtractor::new(SOURCE).unwrap();
            let probe = CountProbe::new(&api, &endpoints, &filter, &extractor);
            let policy = WindowPolicy::default()
                .with_growth_factor(factor)
                .with_saturation(SaturationPolicy::Accept);
            let mut planner = WindowPlanner::new(run, policy).unwrap();

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut decisions = Vec::new();
            runtime.block_on(async {
                while let Some(decision) = planner.next_decision(&probe).await.unwrap() {
                    decisions.push(decision);
                }
            });
            (run, decisions, api)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn windows_tile_the_target(
                offsets in prop::collection::vec(0i64..86_400_000, 0..3000),
                span in 1i64..86_400_000,
                factor in 1.1f64..3.0,
            ) {
                let (run, decisions, _) = run_plan(&offsets, span, factor);

                let mut expected_start = run.from();
                for decision in &decisions {
                    prop_assert_eq!(decision.window().start(), expected_start);
                    prop_assert!(!decision.window().is_empty());
                    expected_start = decision.window().end();
                }
                prop_assert_eq!(expected_start, run.to());
            }

            #[test]
            fn accepted_windows_fit_in_a_page(
                offsets in prop::collection::vec(0i64..3_600_000, 0..4000),
                factor in 1.1f64..3.0,
            ) {
                let (_, decisions, api) = run_plan(&offsets, 3_600_000, factor);

                for decision in decisions {
                    if let WindowDecision::Accepted { window, count } = decision {
                        prop_assert!(count > 0);
                        prop_assert!(count < PAGE_LIMIT || window.duration() <= TimeDelta::milliseconds(1));
                        prop_assert_eq!(count, api.count_in(&window));
                    } else {
                        prop_assert_eq!(api.count_in(&decision.window()), 0);
                    }
                }
            }
        }
    }
}
