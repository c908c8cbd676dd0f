//! Dispatch strategies.
//!
//! A strategy decides which channels of a snapshot are attempted, in what
//! order and with what concurrency:
//!
//! - [`Parallel`](DispatchStrategy::Parallel): every channel at once, on a
//!   bounded worker pool, within twice the largest channel timeout.
//! - [`Sequential`](DispatchStrategy::Sequential): every channel, one at a
//!   time, in priority order.
//! - [`Failover`](DispatchStrategy::Failover): one at a time until a channel
//!   actually delivers.
//! - [`Priority`](DispatchStrategy::Priority): one at a time, tier by tier;
//!   once a tier has delivered, lower tiers are not attempted.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::config::DispatchSettings;
use crate::error::{AlertError, ChannelError};
use crate::retry::{ChannelEntry, ChannelOutcome, RetryPolicy, attempt};
use crate::types::Alert;

/// The algorithm used to deliver an alert to the channel set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// All channels concurrently.
    #[default]
    Parallel,
    /// All channels, one at a time.
    Sequential,
    /// Channels one at a time until one delivers.
    Failover,
    /// Channels tier by tier until a tier delivers.
    Priority,
}

impl DispatchStrategy {
    /// All strategies.
    pub const ALL: [Self; 4] = [Self::Parallel, Self::Sequential, Self::Failover, Self::Priority];

    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Failover => "failover",
            Self::Priority => "priority",
        }
    }
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchStrategy {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            "failover" => Ok(Self::Failover),
            "priority" => Ok(Self::Priority),
            _ => Err(AlertError::UnknownStrategy {
                name: s.to_string(),
            }),
        }
    }
}

impl Serialize for DispatchStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DispatchStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Summary of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Strategy that ran.
    pub strategy: DispatchStrategy,
    /// Channels in the snapshot.
    pub total: usize,
    /// Channels that delivered.
    pub succeeded: usize,
    /// Channels that were attempted and never delivered.
    pub failed: usize,
    /// Channels the policy did not select.
    pub skipped: usize,
    /// Per-channel detail, in the order channels were attempted.
    pub outcomes: Vec<ChannelOutcome>,
    /// Diagnostic note, e.g. when no channels are configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DispatchResult {
    /// Aggregates per-channel outcomes.
    #[must_use]
    pub fn from_outcomes(strategy: DispatchStrategy, total: usize, outcomes: Vec<ChannelOutcome>) -> Self {
        let skipped = outcomes.iter().filter(|o| o.skipped).count();
        let succeeded = outcomes.iter().filter(|o| o.delivered_alert()).count();
        let failed = outcomes.iter().filter(|o| !o.succeeded).count();
        Self {
            strategy,
            total,
            succeeded,
            failed,
            skipped,
            outcomes,
            note: None,
        }
    }

    /// Result for an empty channel set.
    #[must_use]
    pub fn empty(strategy: DispatchStrategy) -> Self {
        Self {
            note: Some("no channels configured".to_string()),
            ..Self::from_outcomes(strategy, 0, Vec::new())
        }
    }

    /// Channels that were considered; early-exit strategies leave the rest out.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns the outcome for a channel name.
    #[must_use]
    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

/// Runs `strategy` over a snapshot of the channel set.
pub(crate) async fn run(
    entries: &Arc<Vec<ChannelEntry>>,
    alert: &Arc<Alert>,
    settings: &DispatchSettings,
    pool: &Arc<Semaphore>,
) -> DispatchResult {
    let policy = RetryPolicy::from(settings);
    let outcomes = match settings.strategy {
        DispatchStrategy::Parallel => parallel(entries, alert, policy, pool).await,
        DispatchStrategy::Sequential => sequential(entries, alert, &policy).await,
        DispatchStrategy::Failover => failover(entries, alert, &policy).await,
        DispatchStrategy::Priority => priority(entries, alert, &policy).await,
    };
    DispatchResult::from_outcomes(settings.strategy, entries.len(), outcomes)
}

async fn parallel(
    entries: &Arc<Vec<ChannelEntry>>,
    alert: &Arc<Alert>,
    policy: RetryPolicy,
    pool: &Arc<Semaphore>,
) -> Vec<ChannelOutcome> {
    // twice the slowest channel's own timeout
    let overall = entries
        .iter()
        .map(|entry| entry.timeout(policy.timeout))
        .max()
        .unwrap_or(policy.timeout)
        .saturating_mul(2);
    // `None` when the bound is too large to represent; wait without one
    let deadline = Instant::now().checked_add(overall);

    let handles: Vec<_> = entries
        .iter()
        .map(|entry| {
            let entry = entry.clone();
            let alert = Arc::clone(alert);
            let pool = Arc::clone(pool);
            tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return ChannelOutcome::failed(&entry, 0, "worker pool is shut down");
                };
                attempt(&entry, &alert, &policy).await
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (entry, mut handle) in entries.iter().zip(handles) {
        let joined = match deadline {
            Some(deadline) => timeout_at(deadline, &mut handle).await,
            None => Ok((&mut handle).await),
        };
        let outcome = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(channel = %entry.name(), alert_id = %alert.id(), error = %e, "channel task failed");
                ChannelOutcome::failed(entry, 1, format!("channel task failed: {e}"))
            }
            Err(_) => {
                handle.abort();
                warn!(
                    channel = %entry.name(),
                    alert_id = %alert.id(),
                    timeout = ?overall,
                    "channel did not finish before the dispatch deadline"
                );
                ChannelOutcome::failed(entry, 0, ChannelError::Timeout(overall).to_string())
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

async fn sequential(entries: &[ChannelEntry], alert: &Alert, policy: &RetryPolicy) -> Vec<ChannelOutcome> {
    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        outcomes.push(attempt(entry, alert, policy).await);
    }
    outcomes
}

async fn failover(entries: &[ChannelEntry], alert: &Alert, policy: &RetryPolicy) -> Vec<ChannelOutcome> {
    let mut outcomes = Vec::new();
    for entry in entries {
        let outcome = attempt(entry, alert, policy).await;
        let delivered = outcome.delivered_alert();
        outcomes.push(outcome);
        if delivered {
            debug!(channel = %entry.name(), alert_id = %alert.id(), "failover stopped at first delivery");
            break;
        }
    }
    outcomes
}

async fn priority(entries: &[ChannelEntry], alert: &Alert, policy: &RetryPolicy) -> Vec<ChannelOutcome> {
    let mut outcomes = Vec::new();
    let mut delivered_tier: Option<i32> = None;

    for entry in entries {
        if let Some(tier) = delivered_tier {
            if entry.priority() < tier {
                debug!(
                    alert_id = %alert.id(),
                    delivered_tier = tier,
                    next_tier = entry.priority(),
                    "priority cutoff reached"
                );
                break;
            }
        }

        let outcome = attempt(entry, alert, policy).await;
        if outcome.delivered_alert() && delivered_tier.is_none() {
            delivered_tier = Some(entry.priority());
        }
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::channels::Channel;
    use crate::config::ChannelConfig;
    use crate::test_support::{PanickingChannel, ScriptedChannel};
    use crate::types::Severity;
    use test_case::test_case;

    fn entry(channel: ScriptedChannel, priority: i32) -> (ChannelEntry, Arc<ScriptedChannel>) {
        let channel = Arc::new(channel);
        let config = ChannelConfig::new("scripted")
            .with_levels([Severity::Error])
            .with_priority(priority);
        (ChannelEntry::new(config, channel.clone() as Arc<dyn Channel>), channel)
    }

    fn settings(strategy: DispatchStrategy) -> DispatchSettings {
        DispatchSettings::default()
            .with_strategy(strategy)
            .with_retry_delay(Duration::from_millis(10))
    }

    async fn dispatch(strategy: DispatchStrategy, entries: Vec<ChannelEntry>, alert: Alert) -> DispatchResult {
        let settings = settings(strategy);
        let pool = Arc::new(Semaphore::new(settings.workers));
        run(&Arc::new(entries), &Arc::new(alert), &settings, &pool).await
    }

    fn error_alert() -> Alert {
        Alert::new(Severity::Error, "db down")
    }

    mod strategy_name_tests {
        use super::*;
        use test_case::test_case;

        #[test_case("parallel", DispatchStrategy::Parallel)]
        #[test_case("Sequential", DispatchStrategy::Sequential)]
        #[test_case("FAILOVER", DispatchStrategy::Failover)]
        #[test_case(" priority ", DispatchStrategy::Priority)]
        fn parse(name: &str, expected: DispatchStrategy) {
            assert_eq!(name.parse::<DispatchStrategy>().unwrap(), expected);
        }

        #[test]
        fn unknown_name_is_rejected() {
            let err = "broadcast".parse::<DispatchStrategy>().unwrap_err();
            assert!(matches!(err, AlertError::UnknownStrategy { ref name } if name == "broadcast"));
        }

        #[test]
        fn display_round_trips() {
            for strategy in DispatchStrategy::ALL {
                assert_eq!(strategy.to_string().parse::<DispatchStrategy>().unwrap(), strategy);
            }
        }
    }

    mod result_tests {
        use super::*;

        #[test]
        fn empty_result_has_note() {
            let result = DispatchResult::empty(DispatchStrategy::Failover);
            assert_eq!(result.total, 0);
            assert_eq!(result.attempted(), 0);
            assert!(result.note.is_some());
        }
    }

    mod sequential_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn attempts_every_channel() {
            let (a, a_ch) = entry(ScriptedChannel::failing("a"), 0);
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 0);
            let (c, c_ch) = entry(ScriptedChannel::succeeding("c"), 0);

            let result = dispatch(DispatchStrategy::Sequential, vec![a, b, c], error_alert()).await;

            assert_eq!((result.succeeded, result.failed, result.skipped), (2, 1, 0));
            assert_eq!(result.total, 3);
            assert_eq!(a_ch.calls(), 3);
            assert_eq!(b_ch.calls(), 1);
            assert_eq!(c_ch.calls(), 1);
            let names: Vec<_> = result.outcomes.iter().map(|o| o.channel.as_str()).collect();
            assert_eq!(names, vec!["a", "b", "c"]);
        }

        #[tokio::test(start_paused = true)]
        async fn skipped_channels_are_counted() {
            let (a, _) = entry(ScriptedChannel::succeeding("a"), 0);
            let result =
                dispatch(DispatchStrategy::Sequential, vec![a], Alert::new(Severity::Info, "x")).await;

            assert_eq!((result.succeeded, result.failed, result.skipped), (0, 0, 1));
        }
    }

    mod failover_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn stops_at_first_delivery() {
            let (a, a_ch) = entry(ScriptedChannel::failing("a"), 0);
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 0);
            let (c, c_ch) = entry(ScriptedChannel::succeeding("c"), 0);

            let result = dispatch(DispatchStrategy::Failover, vec![a, b, c], error_alert()).await;

            assert_eq!(result.succeeded, 1);
            assert_eq!(result.failed, 1);
            assert_eq!(result.attempted(), 2);
            assert_eq!(result.total, 3);
            assert!(a_ch.calls() > 0);
            assert_eq!(b_ch.calls(), 1);
            assert_eq!(c_ch.calls(), 0);
            assert!(result.outcome("c").is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn skips_do_not_stop_the_loop() {
            let skip_config = ChannelConfig::new("scripted").with_levels([Severity::Critical]);
            let skip_channel = Arc::new(ScriptedChannel::succeeding("skip"));
            let skip = ChannelEntry::new(skip_config, skip_channel.clone());
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 0);

            let result = dispatch(DispatchStrategy::Failover, vec![skip, b], error_alert()).await;

            assert_eq!((result.succeeded, result.skipped), (1, 1));
            assert_eq!(skip_channel.calls(), 0);
            assert_eq!(b_ch.calls(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn all_failing_attempts_everything() {
            let (a, _) = entry(ScriptedChannel::failing("a"), 0);
            let (b, _) = entry(ScriptedChannel::failing("b"), 0);

            let result = dispatch(DispatchStrategy::Failover, vec![a, b], error_alert()).await;

            assert_eq!((result.succeeded, result.failed), (0, 2));
            assert_eq!(result.attempted(), 2);
        }
    }

    mod priority_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn lower_tier_not_attempted_after_delivery() {
            // A is skipped by policy, B delivers at the same tier, C is below.
            let a_channel = Arc::new(ScriptedChannel::succeeding("a"));
            let a = ChannelEntry::new(
                ChannelConfig::new("scripted").with_priority(100),
                a_channel.clone(),
            );
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 100);
            let (c, c_ch) = entry(ScriptedChannel::succeeding("c"), 50);

            let result = dispatch(DispatchStrategy::Priority, vec![a, b, c], error_alert()).await;

            assert_eq!(a_channel.calls(), 0);
            assert_eq!(b_ch.calls(), 1);
            assert_eq!(c_ch.calls(), 0);
            assert_eq!((result.succeeded, result.skipped), (1, 1));
            assert_eq!(result.attempted(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn same_tier_still_attempted() {
            let (a, _) = entry(ScriptedChannel::succeeding("a"), 100);
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 100);
            let (c, c_ch) = entry(ScriptedChannel::succeeding("c"), 10);

            let result = dispatch(DispatchStrategy::Priority, vec![a, b, c], error_alert()).await;

            assert_eq!(b_ch.calls(), 1);
            assert_eq!(c_ch.calls(), 0);
            assert_eq!(result.succeeded, 2);
        }

        #[tokio::test(start_paused = true)]
        async fn failing_tier_cascades_down() {
            let (a, _) = entry(ScriptedChannel::failing("a"), 100);
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 50);
            let (c, c_ch) = entry(ScriptedChannel::succeeding("c"), 50);
            let (d, d_ch) = entry(ScriptedChannel::succeeding("d"), 10);

            let result = dispatch(DispatchStrategy::Priority, vec![a, b, c, d], error_alert()).await;

            assert_eq!(b_ch.calls(), 1);
            assert_eq!(c_ch.calls(), 1);
            assert_eq!(d_ch.calls(), 0);
            assert_eq!((result.succeeded, result.failed), (2, 1));
        }

        #[tokio::test(start_paused = true)]
        async fn skip_only_tier_does_not_cut_off() {
            let a = ChannelEntry::new(
                ChannelConfig::new("scripted").with_priority(100),
                Arc::new(ScriptedChannel::succeeding("a")),
            );
            let (b, b_ch) = entry(ScriptedChannel::succeeding("b"), 50);

            let result = dispatch(DispatchStrategy::Priority, vec![a, b], error_alert()).await;

            assert_eq!(b_ch.calls(), 1);
            assert_eq!((result.succeeded, result.skipped), (1, 1));
        }
    }

    mod panic_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn panicking_channel_does_not_stop_siblings() {
            for strategy in DispatchStrategy::ALL {
                let boom = ChannelEntry::new(
                    ChannelConfig::new("scripted")
                        .with_levels([Severity::Error])
                        .with_priority(100),
                    Arc::new(PanickingChannel),
                );
                let (ok, ok_ch) = entry(ScriptedChannel::succeeding("ok"), 50);

                let result = dispatch(strategy, vec![boom, ok], error_alert()).await;

                assert_eq!((result.succeeded, result.failed), (1, 1), "{strategy}");
                assert_eq!(ok_ch.calls(), 1, "{strategy}");
                let boom = result.outcome("panicking").unwrap();
                assert_eq!(boom.attempts, 3, "{strategy}");
                assert_eq!(
                    boom.error.as_deref(),
                    Some("channel panicked: channel exploded"),
                    "{strategy}"
                );
            }
        }
    }

    mod parallel_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn runs_concurrently() {
            let delay = Duration::from_secs(1);
            let entries: Vec<_> = ["a", "b", "c"]
                .iter()
                .map(|n| entry(ScriptedChannel::succeeding(n).with_delay(delay), 0).0)
                .collect();

            let start = Instant::now();
            let result = dispatch(DispatchStrategy::Parallel, entries, error_alert()).await;

            assert_eq!((result.succeeded, result.failed, result.skipped), (3, 0, 0));
            assert!(start.elapsed() < delay * 2, "took {:?}", start.elapsed());
        }

        #[tokio::test(start_paused = true)]
        async fn outcomes_follow_submission_order() {
            let (a, _) = entry(ScriptedChannel::succeeding("a").with_delay(Duration::from_secs(3)), 0);
            let (b, _) = entry(ScriptedChannel::succeeding("b"), 0);

            let result = dispatch(DispatchStrategy::Parallel, vec![a, b], error_alert()).await;

            let names: Vec<_> = result.outcomes.iter().map(|o| o.channel.as_str()).collect();
            assert_eq!(names, vec!["a", "b"]);
        }

        #[tokio::test(start_paused = true)]
        async fn late_channel_recorded_as_timeout() {
            // 5s per attempt, 3 attempts, 10ms pauses: longer than the 10s bound
            let (slow, _) = entry(ScriptedChannel::failing("slow").with_delay(Duration::from_secs(4)), 0);
            let (fast, _) = entry(ScriptedChannel::succeeding("fast"), 0);

            let start = Instant::now();
            let result = dispatch(DispatchStrategy::Parallel, vec![slow, fast], error_alert()).await;

            assert_eq!(start.elapsed(), Duration::from_secs(10));
            assert_eq!((result.succeeded, result.failed), (1, 1));
            let slow = result.outcome("slow").unwrap();
            assert!(!slow.succeeded);
            assert_eq!(slow.error.as_deref(), Some("timed out after 10s"));
        }

        #[tokio::test]
        async fn panicking_channel_is_a_failure() {
            let boom = ChannelEntry::new(
                ChannelConfig::new("scripted").with_levels([Severity::Error]),
                Arc::new(PanickingChannel),
            );
            let (ok, ok_ch) = entry(ScriptedChannel::succeeding("ok"), 0);

            let result = dispatch(DispatchStrategy::Parallel, vec![boom, ok], error_alert()).await;

            assert_eq!((result.succeeded, result.failed), (1, 1));
            assert_eq!(ok_ch.calls(), 1);
            let boom = result.outcome("panicking").unwrap();
            assert!(boom.error.as_deref().unwrap_or_default().contains("channel panicked"));
        }

        #[tokio::test(start_paused = true)]
        async fn deadline_follows_slowest_channel_timeout() {
            let channel = Arc::new(ScriptedChannel::succeeding("patient").with_delay(Duration::from_secs(12)));
            let config = ChannelConfig::new("scripted")
                .with_levels([Severity::Error])
                .with_timeout(Duration::from_secs(20));
            let patient = ChannelEntry::new(config, channel.clone());

            for strategy in [DispatchStrategy::Sequential, DispatchStrategy::Parallel] {
                let result = dispatch(strategy, vec![patient.clone()], error_alert()).await;
                assert_eq!(result.succeeded, 1, "{strategy}");
            }
            assert_eq!(channel.calls(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn huge_timeout_does_not_overflow() {
            let settings = settings(DispatchStrategy::Parallel)
                .with_timeout(Duration::from_secs(10_000_000_000_000_000_000));
            let pool = Arc::new(Semaphore::new(settings.workers));
            let (a, a_ch) = entry(ScriptedChannel::succeeding("a"), 0);

            let result = run(&Arc::new(vec![a]), &Arc::new(error_alert()), &settings, &pool).await;

            assert_eq!(result.succeeded, 1);
            assert_eq!(a_ch.calls(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn pool_bounds_concurrency() {
            let settings = settings(DispatchStrategy::Parallel).with_workers(1);
            let pool = Arc::new(Semaphore::new(settings.workers));
            let entries: Vec<_> = ["a", "b"]
                .iter()
                .map(|n| entry(ScriptedChannel::succeeding(n).with_delay(Duration::from_secs(1)), 0).0)
                .collect();

            let start = Instant::now();
            let result = run(&Arc::new(entries), &Arc::new(error_alert()), &settings, &pool).await;

            assert_eq!(result.succeeded, 2);
            assert_eq!(start.elapsed(), Duration::from_secs(2));
        }

        #[tokio::test(start_paused = true)]
        async fn closed_pool_fails_every_channel() {
            let settings = settings(DispatchStrategy::Parallel);
            let pool = Arc::new(Semaphore::new(1));
            pool.close();
            let (a, a_ch) = entry(ScriptedChannel::succeeding("a"), 0);

            let result = run(&Arc::new(vec![a]), &Arc::new(error_alert()), &settings, &pool).await;

            assert_eq!(result.failed, 1);
            assert_eq!(a_ch.calls(), 0);
        }
    }
}
