//! DataPath Simulator CLI
//!
//! Run deterministic walkthrough scenarios, or replay a recorded point file.

use clap::Parser;
use datapath_core::ExhibitConfig;
use datapath_env::HttpProbe;
use datapath_sim::scenarios::ScenarioId;
use datapath_sim::{replay_file, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// DataPath Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "datapath-sim")]
#[command(about = "Replay walkthroughs deterministically", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (dwell, content_switch, malformed_timestamp, ground_projection, scrub, media_outage, long_walk, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulation duration in seconds
    #[arg(short, long, default_value = "120")]
    duration: f64,

    /// Tick rate in Hz
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Sample noise standard deviation in meters (overrides each scenario)
    #[arg(long)]
    noise: Option<f64>,

    /// Replay a recorded point file instead of running scenarios
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Exhibit config (JSON) for --input
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Probe media over HTTP before replaying --input
    #[arg(long)]
    validate_media: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export simulation frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize summary: {}", e),
    }
}

async fn run_replay(args: &Args, input: &PathBuf, seed: u64) -> i32 {
    let config = match &args.config {
        Some(path) => match ExhibitConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        },
        None => ExhibitConfig::default(),
    };

    let probe = if args.validate_media {
        match HttpProbe::new(config.media.probe_timeout()) {
            Ok(probe) => Some(Arc::new(probe)),
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        }
    } else {
        None
    };

    let report = match replay_file(input, config, seed, probe).await {
        Ok(report) => report,
        Err(e) => {
            error!("Replay of {} failed: {}", input.display(), e);
            return 1;
        }
    };

    if args.json {
        match serde_json::to_value(&report) {
            Ok(value) => print_json(&value),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    } else {
        for sp in &report.sub_paths {
            info!(
                "  {} {:<32} {:>4} points {:>7.2}s  following={} {:?}",
                sp.sub_path, sp.content, sp.points, sp.duration_secs, sp.following, sp.state
            );
        }
    }

    if report.passed() {
        0
    } else {
        1
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.json {
        info!("DataPath Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if let Some(input) = &args.input {
        let code = run_replay(&args, input, base_seed).await;
        std::process::exit(code);
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    if args.export.is_some() && scenarios.len() > 1 {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(1);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let mut runner = ScenarioRunner::new(seed)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate);
        if let Some(noise) = args.noise {
            runner = runner.with_noise(noise);
        }
        if args.export.is_some() {
            // 10 frames per simulated second at 60 Hz
            runner = runner.with_export(6);
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if let (Some(path), Some(export)) = (&args.export, &result.export) {
                match export.write_to_file(path) {
                    Ok(()) => info!("Exported {} frames to {}", export.frames.len(), path.display()),
                    Err(e) => error!("Failed to write export: {}", e),
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "sub_paths": r.sub_path_count,
                    "rms_error_m": r.metrics.rms_error_m,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        print_json(&summary);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
