use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use msm_bench::{CaseId, Harness, HarnessConfig, Verdict};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Times every registered MSM backend on one vector set.", long_about = None)]
struct Args {
    /// Number of random vectors; overrides MSM_INPUT_SIZE.
    #[clap(short, long, value_parser)]
    size: Option<String>,

    /// Precomputed case to run instead of random vectors, e.g. 2^12.
    #[clap(short, long, value_parser)]
    case: Option<CaseId>,

    /// Directory holding <k>.json case files; overrides MSM_CASE_DIR.
    #[clap(long, value_parser)]
    case_dir: Option<PathBuf>,

    /// Per-backend time limit in milliseconds; overrides MSM_TIMEOUT_MS.
    #[clap(short, long, value_parser)]
    timeout_ms: Option<u64>,

    /// Seed for scalar sampling; overrides MSM_SEED.
    #[clap(long, value_parser)]
    seed: Option<u64>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.debug);

    let mut config = HarnessConfig::from_env().context("reading MSM_* environment")?;
    if let Some(dir) = args.case_dir {
        config.case_dir = dir;
    }
    if let Some(ms) = args.timeout_ms {
        config.run_timeout = Some(Duration::from_millis(ms));
    }
    config.scalar_seed = args.seed.or(config.scalar_seed);

    let harness = Harness::from_config(config);
    info!(
        "registered backends: {}",
        harness
            .backends()
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    match (args.case, args.size) {
        (Some(case), _) => harness.load_case(case).await?,
        (None, Some(size)) => harness.set_input_size(&size).await?,
        (None, None) => harness.use_random_inputs().await?,
    };

    let mut failures = 0;
    for (name, outcome) in harness.run_all().await? {
        match outcome {
            Ok(outcome) => {
                let verdict = match outcome.verdict {
                    Verdict::Correct => "correct",
                    Verdict::Incorrect => "INCORRECT",
                    Verdict::Unknown => "unverified",
                };
                println!("{:<40} {} ({})", name, outcome.record.result, verdict);
            }
            Err(err) => {
                failures += 1;
                error!("{}", err);
            }
        }
    }

    println!();
    for [input, implementation, elapsed] in harness.benchmark_rows() {
        println!("{:<10} {:<40} {:>12}", input, implementation, elapsed);
    }

    if failures > 0 {
        anyhow::bail!("{} backend(s) failed", failures);
    }
    Ok(())
}
