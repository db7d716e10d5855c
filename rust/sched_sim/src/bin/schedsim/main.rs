//! schedsim - Run scheduling strategy simulations from JSON scenarios.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sched_sim::{load_scenario, SimFormat, Simulator, Strategy, Tick, TraceStats};

/// Run scheduling strategy simulations from JSON scenarios.
#[derive(Parser)]
#[command(name = "schedsim")]
struct Cli {
    /// Path to a JSON scenario file.
    scenario: Option<PathBuf>,

    /// Strategy key or name (overrides the scenario file).
    ///
    /// Falls back to the file's "strategy" field, then to fifo.
    #[arg(short, long, env = "SCHED_SIM_STRATEGY")]
    strategy: Option<Strategy>,

    /// Stop the run after this many ticks.
    #[arg(long, value_name = "N")]
    max_ticks: Option<Tick>,

    /// Skip the per-tick queue and ownership audit.
    #[arg(long)]
    no_audit: bool,

    /// Print trace events to stderr.
    #[arg(long)]
    dump_trace: bool,

    /// Print per-process statistics.
    #[arg(long)]
    stats: bool,

    /// Only log errors (unless RUST_LOG is set).
    #[arg(short, long)]
    quiet: bool,

    /// List available strategies and exit.
    #[arg(long)]
    list_strategies: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.list_strategies {
        list_strategies();
        return Ok(());
    }

    let path = cli
        .scenario
        .as_ref()
        .context("missing required argument: <SCENARIO>")?;

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let loaded = load_scenario(&json)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    let mut scenario = loaded.scenario;
    if let Some(ticks) = cli.max_ticks {
        scenario.max_ticks = ticks;
    }
    if cli.no_audit {
        scenario.audit = false;
    }
    let strategy = cli.strategy.or(loaded.strategy).unwrap_or_default();

    let trace = Simulator::new(strategy).run(scenario);

    if cli.dump_trace {
        trace.dump();
    }

    println!("strategy: {strategy}");
    println!("{}", trace.summary());
    if cli.stats {
        let stats = TraceStats::from_trace(&trace);
        stats
            .write_summary(&trace, &mut std::io::stdout())
            .context("failed to write statistics")?;
    }

    if trace.has_error() {
        bail!("simulation error: {:?}", trace.exit_kind());
    }
    Ok(())
}

fn list_strategies() {
    for s in Strategy::ALL {
        println!("{:<6} {}", s.key(), s.name());
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(SimFormat)
        .try_init();
}
