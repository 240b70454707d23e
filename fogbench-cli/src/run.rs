//! Execution of a configured run with live progress and a final report.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fogbench_driver::{Driver, DriverState, HttpExecutor, MetricsAggregator};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::report::Summary;

/// Runs the configured scenario until it completes or the process is asked to terminate.
///
/// On `SIGINT` or `SIGTERM`, the rest of the schedule is skipped and the report covers all
/// requests that were started.
pub async fn run(config: Config, json: bool) -> Result<()> {
    let resolver = config.resolver().context("invalid topology")?;
    let driver = Driver::new(
        resolver,
        config.schedule(),
        HttpExecutor::new(),
        config.request_spec(),
    )
    .context("invalid scenario")?
    .with_options(config.driver_options());

    let aggregator = driver.metrics();
    let state = driver.state();
    let cancel = CancellationToken::new();

    let start = tokio::time::Instant::now();
    let progress = tokio::spawn(show_progress(aggregator, state));
    let mut handle = tokio::spawn(driver.run(cancel.clone()));

    let metrics = tokio::select! {
        result = &mut handle => result.context("driver task failed")?,
        _ = elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .on_signal(SignalKind::hangup()) => {
            tracing::info!("shutting down, waiting for in-flight requests");
            cancel.cancel();
            handle.await.context("driver task failed")?
        }
    };
    let elapsed = start.elapsed();
    progress.await.ok();

    let summary = Summary::new(&metrics, elapsed, cancel.is_cancelled());
    if json {
        summary.print_json()?;
    } else {
        summary.print_human();
    }

    Ok(())
}

async fn show_progress(
    metrics: Arc<MetricsAggregator>,
    mut state: watch::Receiver<DriverState>,
) {
    let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner()
        .with_style(style)
        .with_message("Running:");
    bar.enable_steady_tick(Duration::from_millis(100));

    let mut interval = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == DriverState::Completed {
                    break;
                }
            }
            _ = interval.tick() => {}
        }

        let snapshot = metrics.snapshot();
        let phase = match *state.borrow() {
            DriverState::Draining => "Draining:",
            _ => "Running:",
        };
        bar.set_message(format!(
            "{phase} {} requests, {} errors, {} dropped",
            snapshot.total, snapshot.errors, snapshot.dropped_arrivals
        ));
    }

    bar.finish_and_clear();
}
