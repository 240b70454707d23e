use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::{observability, plan, run};

/// Load driver for fog/edge matrix multiplication benchmarks.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Plan(PlanCommand),
    Version(VersionCommand),
}

/// run the configured scenario and print a report
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// print the report as JSON
    #[argh(switch)]
    json: bool,
}

/// print the resolved targets and schedule without sending requests
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanCommand {}

/// print the fogbench version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    if let Command::Plan(PlanCommand {}) = args.command {
        return plan::plan(&config);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("fogbench-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads.max(1))
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand { json }) => run::run(config, json).await,
            Command::Plan(_) | Command::Version(_) => unreachable!(),
        }
    })
}
