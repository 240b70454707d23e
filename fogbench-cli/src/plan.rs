//! Dry run output: what a run would do, without sending any requests.

use std::fmt::{self, Write};

use anyhow::{Context, Result};
use fogbench_driver::{RequestSpec, Schedule, Topology};
use yansi::Paint;

use crate::config::Config;

/// Maximum number of eligible targets listed before the output is abbreviated.
const MAX_LISTED_TARGETS: u64 = 32;

/// Prints the resolved topology, targets and schedule of the configured run.
pub fn plan(config: &Config) -> Result<()> {
    let resolver = config.resolver().context("invalid topology")?;
    let schedule = config.schedule();
    schedule.validate().context("invalid scenario")?;
    let spec = config.request_spec();
    spec.validate().context("invalid request")?;

    let mut out = String::new();
    render(&mut out, resolver.topology(), &schedule, &spec)?;
    print!("{out}");
    Ok(())
}

fn render(
    out: &mut impl Write,
    topology: &Topology,
    schedule: &Schedule,
    spec: &RequestSpec,
) -> fmt::Result {
    writeln!(out, "{}", "## TOPOLOGY".bold())?;
    writeln!(
        out,
        "  {} fog groups x {} edge nodes, hosts {}..={}",
        topology.fog_count().bold(),
        topology.edge_per_fog().bold(),
        topology.start_index(),
        topology.end_index()
    )?;
    writeln!(
        out,
        "  {} eligible targets (stride {})",
        topology.total_eligible().bold(),
        topology.address_stride()
    )?;
    for address in topology.eligible().take(MAX_LISTED_TARGETS as usize) {
        writeln!(out, "    {}", spec.url(&address).blue())?;
    }
    if topology.total_eligible() > MAX_LISTED_TARGETS {
        writeln!(
            out,
            "    ... and {} more",
            topology.total_eligible() - MAX_LISTED_TARGETS
        )?;
    }

    writeln!(out, "{}", "## SCHEDULE".bold())?;
    match schedule {
        Schedule::StagedRamp { stages } => {
            writeln!(out, "  staged ramp over {:?}", schedule.total_duration())?;
            for stage in stages {
                writeln!(
                    out,
                    "    {:?} -> {} workers",
                    stage.duration,
                    stage.target.bold()
                )?;
            }
        }
        Schedule::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            preallocated_workers,
        } => {
            writeln!(
                out,
                "  {} arrivals per {time_unit:?} for {duration:?}, {} workers",
                rate.bold(),
                preallocated_workers.bold()
            )?;
        }
    }
    writeln!(
        out,
        "  at most {} concurrent requests",
        schedule.max_concurrency().bold()
    )?;

    writeln!(out, "{}", "## REQUEST".bold())?;
    writeln!(
        out,
        "  POST {} with n = {}, timeout {:?}",
        spec.path, spec.matrix_size, spec.timeout
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fogbench_driver::Stage;

    use super::*;

    #[test]
    fn lists_eligible_targets() {
        yansi::disable();

        let topology = Topology::builder("172.20.0.")
            .fog_count(3)
            .edge_per_fog(3)
            .build()
            .unwrap();
        let schedule = Schedule::StagedRamp {
            stages: vec![
                Stage::new(Duration::from_secs(15), 30),
                Stage::new(Duration::from_secs(15), 0),
            ],
        };

        let mut out = String::new();
        render(&mut out, &topology, &schedule, &RequestSpec::new(1000)).unwrap();

        assert!(out.contains("http://172.20.0.6/matmul"));
        assert!(out.contains("http://172.20.0.9/matmul"));
        assert!(out.contains("http://172.20.0.12/matmul"));
        assert!(!out.contains("http://172.20.0.7/matmul"));
        assert!(out.contains("3 eligible targets"));
        assert!(out.contains("at most 30 concurrent requests"));
    }

    #[test]
    fn abbreviates_large_topologies() {
        yansi::disable();

        let topology = Topology::builder("10.0.")
            .fog_count(16)
            .edge_per_fog(6)
            .all_edge_nodes(true)
            .build()
            .unwrap();
        let schedule = Schedule::ConstantArrivalRate {
            rate: 3,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(600),
            preallocated_workers: 180,
        };

        let mut out = String::new();
        render(&mut out, &topology, &schedule, &RequestSpec::new(1)).unwrap();

        assert!(out.contains("96 eligible targets"));
        assert!(out.contains("... and 64 more"));
        assert!(out.contains("3 arrivals per 1s for 600s, 180 workers"));
    }
}
