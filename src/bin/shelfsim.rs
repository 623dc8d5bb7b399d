//! shelfsim CLI
//!
//! Run the lending-library simulation and print a daily report.
//!
//! # Example
//!
//! ```bash
//! # One year with the default configuration
//! shelfsim
//!
//! # A smaller library for ninety days, printing every day
//! shelfsim --config small.toml --days 90 --rows 1
//! ```

use anyhow::Context;
use clap::Parser;
use shelfsim::library::{Config, DailySample, Library};
use shelfsim::ONE_DAY;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Lending-library simulator
///
/// Single-threaded and reproducible: the same configuration and seed always produce the same report.
#[derive(Parser, Debug)]
#[command(name = "shelfsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file. Options it leaves out keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed, overriding the configuration.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated days to run, overriding the configured horizon.
    #[arg(short, long)]
    days: Option<u32>,

    /// Number of students, overriding the configuration.
    #[arg(short, long)]
    students: Option<usize>,

    /// Log every entity transition.
    #[arg(short, long)]
    verbose: bool,

    /// Print one daily sample every this many days.
    #[arg(long, default_value = "7")]
    rows: NonZeroUsize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    if let Some(days) = args.days {
        config.run_horizon = f64::from(days) * ONE_DAY;
    }
    if let Some(students) = args.students {
        config.students = students;
    }
    config.verbose_logging |= args.verbose;

    let default_filter = if config.verbose_logging {
        "warn,shelfsim=debug"
    } else {
        "warn,shelfsim=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    info!(
        seed = config.random_seed,
        students = config.students,
        titles = config.titles,
        horizon_days = config.run_horizon / ONE_DAY,
        "starting simulation"
    );

    let mut library = Library::new(config).context("invalid configuration")?;
    library.run().context("simulation stopped")?;

    println!("{}", DailySample::HEADER);
    for sample in library.samples().iter().step_by(args.rows.get()) {
        println!("{sample}");
    }
    println!();
    println!("{library}");
    println!("{}", library.summary());

    Ok(())
}
