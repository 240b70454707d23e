//! Rendering of run metrics for humans and machines.

use std::collections::BTreeMap;
use std::time::Duration;

use fogbench_driver::{Failure, RunMetrics};
use serde::Serialize;
use yansi::Paint;

/// Latency quantiles of a run, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatencySummary {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencySummary {
    fn from_metrics(metrics: &RunMetrics) -> Option<Self> {
        let ms = |latency: Option<Duration>| latency.map(|d| d.as_secs_f64() * 1000.0);
        Some(Self {
            avg_ms: ms(metrics.mean_latency())?,
            min_ms: ms(metrics.min_latency())?,
            max_ms: ms(metrics.max_latency())?,
            p50_ms: ms(metrics.latency_quantile(0.5))?,
            p90_ms: ms(metrics.latency_quantile(0.9))?,
            p95_ms: ms(metrics.latency_quantile(0.95))?,
            p99_ms: ms(metrics.latency_quantile(0.99))?,
        })
    }
}

/// The final result of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub elapsed_secs: f64,
    pub cancelled: bool,
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub ops_per_sec: f64,
    pub failures: BTreeMap<Failure, u64>,
    pub status_codes: BTreeMap<u16, u64>,
    pub dropped_arrivals: u64,
    pub peak_in_flight: usize,
    pub latency: Option<LatencySummary>,
}

impl Summary {
    pub fn new(metrics: &RunMetrics, elapsed: Duration, cancelled: bool) -> Self {
        let secs = elapsed.as_secs_f64();
        let ops_per_sec = if secs > 0.0 {
            metrics.total as f64 / secs
        } else {
            0.0
        };

        Self {
            elapsed_secs: secs,
            cancelled,
            requests: metrics.total,
            successes: metrics.successes,
            errors: metrics.errors,
            error_rate: metrics.error_rate(),
            ops_per_sec,
            failures: metrics.failures.clone(),
            status_codes: metrics.status_codes.clone(),
            dropped_arrivals: metrics.dropped_arrivals,
            peak_in_flight: metrics.peak_in_flight,
            latency: LatencySummary::from_metrics(metrics),
        }
    }

    pub fn print_json(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }

    pub fn print_human(&self) {
        println!();
        print!(
            "{} ({} requests in {:.2?}",
            "## RUN".bold(),
            self.requests.bold(),
            Duration::from_secs_f64(self.elapsed_secs)
        );
        if self.cancelled {
            print!(", {}", "CANCELLED".bold().yellow());
        }
        println!(")");

        print!("{} ({} ops", "MATMUL:".bold().green(), self.successes.bold());
        if self.errors > 0 {
            print!(
                ", {}",
                format!("{} FAILURES", self.errors).bold().red()
            );
        }
        println!(")");
        println!("  {:.2} operations/s", self.ops_per_sec.bold());

        if let Some(latency) = &self.latency {
            let ms = |value: f64| Duration::from_secs_f64(value / 1000.0);
            println!(
                "  avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p95: {:.2?}; p99: {:.2?}",
                ms(latency.avg_ms).bold(),
                ms(latency.p50_ms),
                ms(latency.p90_ms),
                ms(latency.p95_ms),
                ms(latency.p99_ms),
            );
            println!(
                "  min: {:.2?}; max: {:.2?}",
                ms(latency.min_ms),
                ms(latency.max_ms)
            );
        }

        if !self.failures.is_empty() {
            println!("{}", "FAILURES:".bold().red());
            for (failure, count) in &self.failures {
                println!("  {}: {}", format!("{failure:?}").to_lowercase(), count.bold());
            }
        }

        if !self.status_codes.is_empty() {
            println!("{}", "STATUS CODES:".bold());
            for (status, count) in &self.status_codes {
                let line = format!("  {status}: {count}");
                if *status == 200 {
                    println!("{}", line.green());
                } else {
                    println!("{}", line.red());
                }
            }
        }

        println!("  peak in-flight: {}", self.peak_in_flight.bold());
        if self.dropped_arrivals > 0 {
            println!(
                "  {}",
                format!("{} dropped arrivals", self.dropped_arrivals)
                    .bold()
                    .yellow()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use fogbench_driver::{MetricsAggregator, Outcome};

    use super::*;

    fn metrics() -> RunMetrics {
        let aggregator = MetricsAggregator::new();
        for millis in [10, 20, 30, 40] {
            aggregator.record(Outcome::completed(200, Duration::from_millis(millis)));
        }
        aggregator.record(Outcome::completed(503, Duration::from_millis(50)));
        aggregator.record(Outcome::failed(
            Failure::Timeout,
            None,
            Duration::from_secs(60),
        ));
        aggregator.record_dropped(3);
        aggregator.observe_in_flight(4);
        aggregator.snapshot()
    }

    #[test]
    fn summarizes_metrics() {
        let summary = Summary::new(&metrics(), Duration::from_secs(2), false);

        assert_eq!(summary.requests, 6);
        assert_eq!(summary.successes, 4);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.ops_per_sec, 3.0);
        assert_eq!(summary.failures.get(&Failure::Timeout), Some(&1));
        assert_eq!(summary.failures.get(&Failure::Status), Some(&1));
        assert_eq!(summary.status_codes.get(&200), Some(&4));
        assert_eq!(summary.dropped_arrivals, 3);
        assert_eq!(summary.peak_in_flight, 4);

        let latency = summary.latency.unwrap();
        assert!(latency.min_ms <= latency.p50_ms);
        assert!(latency.p50_ms <= latency.p99_ms);
        assert!(latency.p99_ms <= latency.max_ms * 1.02);
    }

    #[test]
    fn empty_run_has_no_latency() {
        let summary = Summary::new(&RunMetrics::default(), Duration::ZERO, true);

        assert_eq!(summary.requests, 0);
        assert_eq!(summary.ops_per_sec, 0.0);
        assert_eq!(summary.error_rate, 0.0);
        assert_eq!(summary.latency, None);
    }

    #[test]
    fn json_uses_snake_case_failures() {
        let summary = Summary::new(&metrics(), Duration::from_secs(1), false);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["failures"]["timeout"], 1);
        assert_eq!(json["status_codes"]["503"], 1);
        assert_eq!(json["dropped_arrivals"], 3);
    }
}
