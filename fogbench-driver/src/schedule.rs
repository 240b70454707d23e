//! Time-varying load profiles.
//!
//! A [`Schedule`] is either a staged ramp of concurrent workers, or a constant rate of arrivals
//! executed by a fixed pool of preallocated workers. The [`RateScheduler`] turns a schedule into
//! concrete decisions: given the time elapsed since the start of a run, how many executions
//! should start right now.
//!
//! The scheduler never looks at a clock itself. Elapsed time is passed in by the caller, which
//! makes every decision reproducible in tests.
//!
//! # Staged ramps
//!
//! The concurrency target moves linearly from the target of the previous stage (zero before the
//! first stage) to the target of the current stage over the stage's duration. A ramp of
//! `[(15s, 30), (2m, 30), (15s, 0)]` therefore ramps up to 30 workers within 15 seconds, holds
//! them for two minutes, and ramps back down within 15 seconds. Workers are never stopped during
//! a ramp-down; the scheduler only refrains from starting new ones until the number of
//! in-flight executions falls below the target.
//!
//! # Constant arrival rate
//!
//! Arrivals are due at fixed intervals of `time_unit / rate`, starting with the first arrival at
//! the very beginning of the run. If no worker is free when an arrival is due, the arrival waits
//! in a backlog that holds at most as many arrivals as there are workers. Arrivals overflowing
//! the backlog, and arrivals still waiting when the schedule ends, are dropped and reported.
//! The final decision also covers every arrival that fell due since the previous call, so each
//! of the `ceil(duration * rate / time_unit)` arrivals is either started or dropped, however
//! coarse the caller's tick.

use std::time::Duration;

use crate::error::{ConfigurationError, Result};
use crate::pool::{WorkerPermit, WorkerPool};

/// One segment of a staged ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    /// How long it takes to reach the target.
    pub duration: Duration,
    /// The number of concurrent workers at the end of the stage.
    pub target: u32,
}

impl Stage {
    /// Creates a new stage.
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// A load profile over the duration of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Ramp the number of concurrent workers through a sequence of stages.
    StagedRamp {
        /// The stages in order of execution.
        stages: Vec<Stage>,
    },
    /// Start a fixed number of executions per time unit.
    ConstantArrivalRate {
        /// Number of arrivals per `time_unit`.
        rate: u32,
        /// The time unit of `rate`.
        time_unit: Duration,
        /// How long arrivals are started.
        duration: Duration,
        /// The maximum number of concurrent executions.
        preallocated_workers: usize,
    },
}

impl Schedule {
    /// Total duration of the schedule.
    pub fn total_duration(&self) -> Duration {
        match self {
            Self::StagedRamp { stages } => stages.iter().map(|stage| stage.duration).sum(),
            Self::ConstantArrivalRate { duration, .. } => *duration,
        }
    }

    /// The maximum number of executions that can be in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        match self {
            Self::StagedRamp { stages } => stages
                .iter()
                .map(|stage| stage.target as usize)
                .max()
                .unwrap_or_default(),
            Self::ConstantArrivalRate {
                preallocated_workers,
                ..
            } => *preallocated_workers,
        }
    }

    /// Checks the schedule for configuration errors.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::StagedRamp { stages } if stages.is_empty() => {
                Err(ConfigurationError::EmptyStages)
            }
            Self::StagedRamp { .. } => Ok(()),
            Self::ConstantArrivalRate {
                preallocated_workers: 0,
                ..
            } => Err(ConfigurationError::NoWorkers),
            Self::ConstantArrivalRate { time_unit, .. } if time_unit.is_zero() => {
                Err(ConfigurationError::ZeroTimeUnit)
            }
            Self::ConstantArrivalRate { .. } => Ok(()),
        }
    }
}

/// Returns the concurrency target of a staged ramp at the given time.
///
/// Returns `None` once all stages have elapsed.
pub fn ramp_target(stages: &[Stage], elapsed: Duration) -> Option<u32> {
    let mut stage_start = Duration::ZERO;
    let mut previous = 0u32;

    for stage in stages {
        let stage_end = stage_start + stage.duration;
        if elapsed < stage_end {
            let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            let from = f64::from(previous);
            let to = f64::from(stage.target);
            return Some((from + (to - from) * progress).round() as u32);
        }

        stage_start = stage_end;
        previous = stage.target;
    }

    None
}

/// A scheduling decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Action {
    /// Number of executions to start now.
    pub spawn_count: usize,
    /// Whether the schedule has completed.
    pub done: bool,
    /// Number of arrivals dropped since the previous decision for lack of workers.
    pub dropped: u64,
}

impl Action {
    const DONE: Self = Self {
        spawn_count: 0,
        done: true,
        dropped: 0,
    };
}

/// Decides how many executions to start at each point of a run.
#[derive(Debug)]
pub struct RateScheduler {
    schedule: Schedule,
    pool: WorkerPool,
    /// Total number of arrivals accounted for, whether started, queued or dropped.
    arrived: u64,
    /// Arrivals waiting for a free worker.
    backlog: u64,
    done: bool,
}

impl RateScheduler {
    /// Validates the schedule and creates a scheduler with worker slots sized to it.
    pub fn new(schedule: Schedule) -> Result<Self> {
        schedule.validate()?;
        let pool = WorkerPool::new(schedule.max_concurrency());

        Ok(Self {
            schedule,
            pool,
            arrived: 0,
            backlog: 0,
            done: false,
        })
    }

    /// The schedule driving this scheduler.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The worker slots shared by all executions of the run.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Takes a worker slot for an execution that was granted by [`next_action`](Self::next_action).
    pub fn acquire(&self) -> Option<WorkerPermit> {
        self.pool.try_acquire()
    }

    /// Decides how many executions to start at the given time since the start of the run.
    ///
    /// The returned `spawn_count` never exceeds the number of free worker slots. Once the
    /// schedule's duration has elapsed, this returns a `done` action, and keeps returning it on
    /// every subsequent call. For constant arrival rates, the first `done` action may still
    /// carry spawns and drops for arrivals that fell due since the previous call.
    pub fn next_action(&mut self, elapsed: Duration) -> Action {
        if self.done {
            return Action::DONE;
        }

        match &self.schedule {
            Schedule::StagedRamp { stages } => match ramp_target(stages, elapsed) {
                Some(target) => {
                    let spawn_count = (target as usize)
                        .saturating_sub(self.pool.in_flight())
                        .min(self.pool.available());
                    Action {
                        spawn_count,
                        ..Default::default()
                    }
                }
                None => self.finish(),
            },
            &Schedule::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                ..
            } => {
                // arrivals due between the last call and the end of the run still count
                let finished = elapsed >= duration;
                let due = arrivals_due(rate, time_unit, duration, elapsed.min(duration));
                let pending = self.backlog + due.saturating_sub(self.arrived);
                self.arrived = self.arrived.max(due);

                let spawn_count = pending.min(self.pool.available() as u64);
                let waiting = pending - spawn_count;
                let kept = if finished {
                    0
                } else {
                    waiting.min(self.pool.capacity() as u64)
                };
                self.backlog = kept;
                self.done = finished;

                Action {
                    spawn_count: spawn_count as usize,
                    done: finished,
                    dropped: waiting - kept,
                }
            }
        }
    }

    /// Number of arrivals currently waiting for a free worker.
    pub fn backlog(&self) -> u64 {
        self.backlog
    }

    fn finish(&mut self) -> Action {
        self.done = true;
        Action::DONE
    }
}

/// Cumulative number of arrivals due at `elapsed`, including the one at time zero.
fn arrivals_due(rate: u32, time_unit: Duration, duration: Duration, elapsed: Duration) -> u64 {
    let rate = u128::from(rate);
    let unit = time_unit.as_nanos();
    if rate == 0 {
        return 0;
    }

    let total = (duration.as_nanos() * rate).div_ceil(unit);
    let due = elapsed.as_nanos() * rate / unit + 1;
    due.min(total) as u64
}
