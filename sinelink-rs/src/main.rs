use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use sinelink_rs::search::BlastSearch;
use sinelink_rs::{cli, pipeline};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if args.quiet {
                EnvFilter::new("warn")
            } else {
                EnvFilter::new("info")
            }
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(args.threads.max(1)))
        .build_global()
        .context("building thread pool")?;

    let config = args.pipeline_config()?;
    let inputs = args.inputs()?;
    let search: BlastSearch = config.search.clone();
    let report = pipeline::run(&inputs, &config, &search, &args.out_dir)?;
    tracing::info!(
        rbh_pairs = report.rbh_pairs,
        a_only = report.asymmetry.a_only,
        b_only = report.asymmetry.b_only,
        both = report.asymmetry.both,
        neither = report.asymmetry.neither,
        out_dir = %args.out_dir.display(),
        "sinelink-rs: processing complete"
    );
    Ok(())
}
