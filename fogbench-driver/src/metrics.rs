//! Aggregation of request outcomes into run metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sketches_ddsketch::DDSketch;

use crate::executor::{Failure, Outcome};

/// Point-in-time totals of a run.
#[derive(Clone, Default)]
pub struct RunMetrics {
    /// Number of requests that have completed or failed.
    pub total: u64,
    /// Number of requests answered with `200 OK`.
    pub successes: u64,
    /// Number of requests that failed for any reason.
    pub errors: u64,
    /// Failed requests by reason.
    pub failures: BTreeMap<Failure, u64>,
    /// Received responses by HTTP status code.
    pub status_codes: BTreeMap<u16, u64>,
    /// Arrivals that were never started because no worker was available.
    pub dropped_arrivals: u64,
    /// The highest number of concurrent executions observed.
    pub peak_in_flight: usize,
    /// Latencies of all requests in seconds.
    latency: DDSketch,
}

impl RunMetrics {
    /// Share of failed requests in `0.0..=1.0`, or `0.0` before the first request.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.errors as f64 / self.total as f64
    }

    /// Number of failed requests with the given reason.
    pub fn failure_count(&self, failure: Failure) -> u64 {
        self.failures.get(&failure).copied().unwrap_or_default()
    }

    /// The latency at quantile `q` in `0.0..=1.0`, or `None` before the first request.
    pub fn latency_quantile(&self, q: f64) -> Option<Duration> {
        let secs = self.latency.quantile(q).ok().flatten()?;
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }

    /// The mean latency, or `None` before the first request.
    pub fn mean_latency(&self) -> Option<Duration> {
        let sum = self.latency.sum()?;
        let count = self.latency.count();
        (count > 0).then(|| Duration::from_secs_f64((sum / count as f64).max(0.0)))
    }

    /// The lowest recorded latency.
    pub fn min_latency(&self) -> Option<Duration> {
        self.latency.min().map(|secs| Duration::from_secs_f64(secs.max(0.0)))
    }

    /// The highest recorded latency.
    pub fn max_latency(&self) -> Option<Duration> {
        self.latency.max().map(|secs| Duration::from_secs_f64(secs.max(0.0)))
    }

    fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome.failure() {
            None => self.successes += 1,
            Some(failure) => {
                self.errors += 1;
                *self.failures.entry(failure).or_default() += 1;
            }
        }
        if let Some(status) = outcome.status() {
            *self.status_codes.entry(status).or_default() += 1;
        }
        self.latency.add(outcome.latency().as_secs_f64());
    }
}

impl fmt::Debug for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunMetrics")
            .field("total", &self.total)
            .field("successes", &self.successes)
            .field("errors", &self.errors)
            .field("failures", &self.failures)
            .field("status_codes", &self.status_codes)
            .field("dropped_arrivals", &self.dropped_arrivals)
            .field("peak_in_flight", &self.peak_in_flight)
            .field("p50", &self.latency_quantile(0.5))
            .field("p99", &self.latency_quantile(0.99))
            .finish()
    }
}

/// Collects outcomes from all concurrent executions of a run.
///
/// All methods take a single short lock and are safe to call from any task.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    metrics: Mutex<RunMetrics>,
}

impl MetricsAggregator {
    /// Creates an aggregator with empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a single request.
    pub fn record(&self, outcome: Outcome) {
        self.lock().record(&outcome);
    }

    /// Records arrivals that were dropped for lack of workers.
    pub fn record_dropped(&self, count: u64) {
        if count > 0 {
            self.lock().dropped_arrivals += count;
        }
    }

    /// Updates the peak number of concurrent executions.
    pub fn observe_in_flight(&self, in_flight: usize) {
        let mut metrics = self.lock();
        metrics.peak_in_flight = metrics.peak_in_flight.max(in_flight);
    }

    /// Returns a consistent copy of the current metrics.
    pub fn snapshot(&self) -> RunMetrics {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunMetrics> {
        // Every update leaves the metrics consistent, so a poisoned lock is still usable.
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;

    use super::*;

    fn outcomes() -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for i in 0..50u64 {
            let latency = Duration::from_millis(10 + i);
            outcomes.push(match i % 5 {
                0 => Outcome::failed(Failure::Timeout, None, latency),
                1 => Outcome::failed(Failure::Transport, None, latency),
                2 => Outcome::completed(503, latency),
                _ => Outcome::completed(200, latency),
            });
        }
        outcomes
    }

    #[test]
    fn counts_successes_and_failures() {
        let aggregator = MetricsAggregator::new();
        for outcome in outcomes() {
            aggregator.record(outcome);
        }

        let metrics = aggregator.snapshot();
        assert_eq!(metrics.total, 50);
        assert_eq!(metrics.successes, 20);
        assert_eq!(metrics.errors, 30);
        assert_eq!(metrics.failure_count(Failure::Timeout), 10);
        assert_eq!(metrics.failure_count(Failure::Transport), 10);
        assert_eq!(metrics.failure_count(Failure::Status), 10);
        assert_eq!(metrics.status_codes, BTreeMap::from([(200, 20), (503, 10)]));
        assert!((metrics.error_rate() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn recording_order_does_not_matter() {
        let expected = {
            let aggregator = MetricsAggregator::new();
            outcomes().into_iter().for_each(|o| aggregator.record(o));
            aggregator.snapshot()
        };

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut shuffled = outcomes();
            shuffled.shuffle(&mut rng);

            let aggregator = MetricsAggregator::new();
            shuffled.into_iter().for_each(|o| aggregator.record(o));
            let metrics = aggregator.snapshot();

            assert_eq!(metrics.total, expected.total);
            assert_eq!(metrics.errors, expected.errors);
            assert_eq!(metrics.failures, expected.failures);
            assert_eq!(metrics.status_codes, expected.status_codes);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_not_lost() {
        let aggregator = Arc::new(MetricsAggregator::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                tokio::spawn(async move {
                    for outcome in outcomes() {
                        aggregator.record(outcome);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        // snapshots taken while recording are always internally consistent
        for _ in 0..10 {
            let metrics = aggregator.snapshot();
            assert_eq!(metrics.total, metrics.successes + metrics.errors);
            tokio::task::yield_now().await;
        }

        for task in tasks {
            task.await.unwrap();
        }

        let metrics = aggregator.snapshot();
        assert_eq!(metrics.total, 16 * 50);
        assert_eq!(metrics.errors, 16 * 30);
    }

    #[test]
    fn latency_quantiles() {
        let aggregator = MetricsAggregator::new();
        assert_eq!(aggregator.snapshot().latency_quantile(0.5), None);
        assert_eq!(aggregator.snapshot().mean_latency(), None);

        for ms in 1..=100 {
            aggregator.record(Outcome::completed(200, Duration::from_millis(ms)));
        }

        let metrics = aggregator.snapshot();
        let p50 = metrics.latency_quantile(0.5).unwrap().as_secs_f64();
        let p99 = metrics.latency_quantile(0.99).unwrap().as_secs_f64();
        // the sketch guarantees 1% relative error
        assert!((p50 - 0.050).abs() < 0.002, "p50 = {p50}");
        assert!((p99 - 0.099).abs() < 0.003, "p99 = {p99}");

        let mean = metrics.mean_latency().unwrap().as_secs_f64();
        assert!((mean - 0.0505).abs() < 0.0001, "mean = {mean}");
        assert_eq!(metrics.max_latency(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn tracks_drops_and_peak_concurrency() {
        let aggregator = MetricsAggregator::new();
        aggregator.record_dropped(3);
        aggregator.record_dropped(0);
        aggregator.record_dropped(2);
        aggregator.observe_in_flight(7);
        aggregator.observe_in_flight(4);

        let metrics = aggregator.snapshot();
        assert_eq!(metrics.dropped_arrivals, 5);
        assert_eq!(metrics.peak_in_flight, 7);
    }
}
