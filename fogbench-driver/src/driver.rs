//! Orchestration of a load run.
//!
//! The [`Driver`] owns the topology and schedule of a single run. On a fixed tick, it asks the
//! [`RateScheduler`] how many executions to start, resolves a target for each of them with a
//! monotonically increasing iteration index, and spawns a task that executes the request and
//! records its outcome.
//!
//! A run moves through the states of [`DriverState`] exactly once. Cancelling the run skips the
//! rest of the schedule, but requests that are already in flight are allowed to finish or time
//! out, so their outcomes still count.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::executor::{RequestExecutor, RequestSpec};
use crate::metrics::{MetricsAggregator, RunMetrics};
use crate::pool::WorkerPermit;
use crate::schedule::{RateScheduler, Schedule};
use crate::topology::{Address, TargetResolver};

/// Lifecycle of a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverState {
    /// The run has not started yet.
    Idle,
    /// The schedule is being executed.
    Running,
    /// No more requests are started; waiting for in-flight requests.
    Draining,
    /// All requests have finished and the metrics are final.
    Completed,
}

/// Tuning knobs of the driver loop.
#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Pause after each request before its worker becomes available again.
    pub think_time: Duration,
    /// Interval at which the scheduler is consulted.
    pub tick: Duration,
    /// Interval for progress logs, or `None` to disable them.
    pub report_interval: Option<Duration>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            think_time: Duration::ZERO,
            tick: Duration::from_millis(10),
            report_interval: Some(Duration::from_secs(10)),
        }
    }
}

/// Runs a schedule of requests against a topology.
#[derive(Debug)]
pub struct Driver<E> {
    resolver: TargetResolver,
    scheduler: RateScheduler,
    executor: Arc<E>,
    spec: Arc<RequestSpec>,
    metrics: Arc<MetricsAggregator>,
    options: DriverOptions,
    state: watch::Sender<DriverState>,
}

impl<E: RequestExecutor> Driver<E> {
    /// Validates the run configuration and creates an idle driver.
    pub fn new(
        resolver: TargetResolver,
        schedule: Schedule,
        executor: E,
        spec: RequestSpec,
    ) -> Result<Self> {
        spec.validate()?;
        let scheduler = RateScheduler::new(schedule)?;
        let (state, _) = watch::channel(DriverState::Idle);

        Ok(Self {
            resolver,
            scheduler,
            executor: Arc::new(executor),
            spec: Arc::new(spec),
            metrics: Arc::new(MetricsAggregator::new()),
            options: DriverOptions::default(),
            state,
        })
    }

    /// Replaces the default driver options.
    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    /// Subscribes to state changes of the run.
    pub fn state(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    /// The aggregator of this run, for live snapshots while the run is in progress.
    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        Arc::clone(&self.metrics)
    }

    /// Executes the schedule and returns the final metrics.
    ///
    /// The run ends when the schedule completes or `cancel` is triggered, whichever happens
    /// first. In both cases, the returned metrics include every request that was started.
    pub async fn run(mut self, cancel: CancellationToken) -> RunMetrics {
        let schedule = self.scheduler.schedule();
        tracing::info!(
            duration = ?schedule.total_duration(),
            max_concurrency = schedule.max_concurrency(),
            targets = self.resolver.topology().total_eligible(),
            "starting run"
        );
        self.state.send_replace(DriverState::Running);

        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.options.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let report_interval = self.options.report_interval;
        let mut next_report = report_interval.map(|interval| start + interval);
        let mut index = 0u64;
        let mut starving = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("run cancelled, skipping the rest of the schedule");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let action = self.scheduler.next_action(start.elapsed());
            if action.dropped > 0 {
                self.metrics.record_dropped(action.dropped);
                if !starving {
                    starving = true;
                    tracing::warn!(
                        dropped = action.dropped,
                        workers = self.scheduler.pool().capacity(),
                        "not enough workers to sustain the arrival rate, dropping arrivals"
                    );
                }
            }

            for _ in 0..action.spawn_count {
                let Some(permit) = self.scheduler.acquire() else {
                    break;
                };
                index += 1;
                let address = self.resolver.resolve(index);
                self.spawn_execution(index, address, permit, cancel.clone());
            }
            self.metrics
                .observe_in_flight(self.scheduler.pool().in_flight());

            if let (Some(at), Some(interval)) = (next_report, report_interval)
                && Instant::now() >= at
            {
                self.report_progress(start.elapsed());
                next_report = Some(at + interval);
            }

            if action.done {
                break;
            }
        }

        self.state.send_replace(DriverState::Draining);
        tracing::info!(
            in_flight = self.scheduler.pool().in_flight(),
            "waiting for in-flight requests"
        );
        self.scheduler.pool().wait_idle().await;

        self.state.send_replace(DriverState::Completed);
        let metrics = self.metrics.snapshot();
        tracing::info!(
            elapsed = ?start.elapsed(),
            requests = metrics.total,
            errors = metrics.errors,
            dropped = metrics.dropped_arrivals,
            "run completed"
        );

        metrics
    }

    fn spawn_execution(
        &self,
        index: u64,
        address: Address,
        permit: WorkerPermit,
        cancel: CancellationToken,
    ) {
        let executor = Arc::clone(&self.executor);
        let spec = Arc::clone(&self.spec);
        let metrics = Arc::clone(&self.metrics);
        let think_time = self.options.think_time;

        tokio::spawn(async move {
            // the worker slot is held until the task ends, including the think time
            let _permit = permit;

            let outcome = executor.execute(&address, &spec).await;
            tracing::trace!(
                index,
                %address,
                status = ?outcome.status(),
                latency = ?outcome.latency(),
                "request finished"
            );
            metrics.record(outcome);

            if !think_time.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(think_time) => {}
                }
            }
        });
    }

    fn report_progress(&self, elapsed: Duration) {
        let metrics = self.metrics.snapshot();
        tracing::info!(
            elapsed = ?elapsed,
            requests = metrics.total,
            errors = metrics.errors,
            in_flight = self.scheduler.pool().in_flight(),
            backlog = self.scheduler.backlog(),
            "progress"
        );
    }
}
