use crate::stores::registered;
use crate::workload::Phase;
use anyhow::Context;
use clap::ValueHint::FilePath;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use std::fs::read_to_string;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseArg {
    Load,
    Run,
    All,
}

impl PhaseArg {
    fn phases(&self) -> &'static [Phase] {
        match self {
            PhaseArg::Load => &[Phase::Load],
            PhaseArg::Run => &[Phase::Run],
            PhaseArg::All => &[Phase::Load, Phase::Run],
        }
    }
}

#[derive(Args, Debug)]
struct BenchArgs {
    #[arg(short = 's')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the key-value store's TOML config file")]
    store_config: String,

    #[arg(short = 'w')]
    #[arg(value_hint = FilePath)]
    #[arg(help = "Path to the workload's TOML config file")]
    workload_config: String,

    #[arg(short = 'p', value_enum, default_value_t = PhaseArg::All)]
    #[arg(help = "Phases to run")]
    phase: PhaseArg,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run a benchmark")]
    Bench(BenchArgs),
    #[command(about = "List all registered key-value stores")]
    List,
}

fn bench_cli(args: &BenchArgs) -> anyhow::Result<()> {
    let opt: String = {
        let s = args.store_config.as_str();
        let w = args.workload_config.as_str();
        let store = read_to_string(s).with_context(|| format!("failed to read {}", s))?;
        let workload = read_to_string(w).with_context(|| format!("failed to read {}", w))?;
        store + "\n" + &workload
    };

    let (store, benchmark, workload) = crate::bench::init(&opt)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::Relaxed);
        warn!("SIGINT received, stopping the benchmark");
    })
    .context("failed to set the Ctrl-C handler")?;

    crate::bench::bench(&store, &benchmark, &workload, args.phase.phases(), &stop);
    debug!("Benchmark finished");
    Ok(())
}

fn list_cli() {
    for name in registered() {
        println!("Registered store: {}", name);
    }
}

/// The default command line interface.
///
/// This function is public and can be called in a different crate. For example, one can integrate
/// their own key-value stores by registering the constructor function. Then, adding this function
/// will produce a benchmark binary that has the same usage as the one in this crate.
///
/// ## Usage
///
/// To get the usage of the command line interface, users can run:
///
/// ```bash
/// kvgen -h
/// ```
///
/// The interface supports two modes, `bench` and `list`.
///
/// ### Benchmark Mode
///
/// Usage:
///
/// ```bash
/// kvgen bench -s <STORE_CONFIG> -w <WORKLOAD_CONFIG> [-p <load|run|all>]
/// ```
///
/// Where `STORE_CONFIG` and `WORKLOAD_CONFIG` are the paths to the key-value store and workload
/// configuration files, respectively. The two files are concatenated into one document. For
/// their format, you can refer to the documentations of [`crate::stores`] and [`crate::bench`].
///
/// By default both phases run. With `-p load` or `-p run`, only one of them runs, which is
/// useful for stores that persist between processes.
///
/// Interrupting with Ctrl-C stops the workers after their current operation; the phase that was
/// running is still reported and the workload is torn down.
///
/// ### List mode
///
/// Usage:
/// ``` bash
/// kvgen list
/// ```
///
/// This command lists all registered key-value stores' names.
pub fn cmdline() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    debug!("Starting kvgen with args: {:?}", cli);
    match cli.command {
        Commands::Bench(args) => bench_cli(&args)?,
        Commands::List => list_cli(),
    }
    Ok(())
}
