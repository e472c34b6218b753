use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use ring_pipeline::{ConsoleSink, DrainPolicy, PipelineBuilder, PipelineConfig, ReadStrategy};
use std::io::{self, BufReader};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "ring-pipeline",
    about = "Filter integers from stdin through an overwrite-on-full ring buffer",
    version
)]
struct Cli {
    /// Ring buffer capacity
    #[arg(short, long, default_value_t = 3)]
    capacity: usize,

    /// Delay between reader pops, in milliseconds
    #[arg(short = 'i', long, default_value_t = 500)]
    poll_interval_ms: u64,

    /// Wake the reader on push instead of sleeping the full interval
    #[arg(long)]
    notify: bool,

    /// Stop reading as soon as input ends, dropping unread values
    #[arg(long)]
    best_effort: bool,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = PipelineConfig {
        capacity: cli.capacity,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
        read_strategy: if cli.notify {
            ReadStrategy::Notify
        } else {
            ReadStrategy::Poll
        },
        drain_policy: if cli.best_effort {
            DrainPolicy::BestEffort
        } else {
            DrainPolicy::Flush
        },
    };
    let pipeline = PipelineBuilder::from_config(config)
        .build()
        .context("invalid pipeline configuration")?;

    eprintln!("Enter integers separated by spaces");
    eprintln!("A line reading \"end\" finishes input");

    let report = pipeline
        .run(BufReader::new(io::stdin()), ConsoleSink::stdout())
        .context("pipeline run failed")?;

    log::info!("{}", report.format());
    Ok(())
}
