use clap::Parser;
use pacer::prelude::*;
use pacer::report;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "pacer=info";

/// Constant-rate HTTP load generator.
#[derive(Parser, Debug)]
#[command(version, about)]
struct PacerCli {
    /// Target url
    #[arg(short, long, env = "PACER_TARGET_URL")]
    url: String,

    #[arg(short = 'X', long, env = "PACER_METHOD", default_value = "GET")]
    method: String,

    /// JSON request body
    #[arg(short, long, env = "PACER_BODY")]
    body: Option<String>,

    /// Requests per second
    #[arg(short, long, env = "PACER_RPS")]
    rps: u32,

    /// Run duration, e.g. `30s` or `2m`
    #[arg(short, long, env = "PACER_DURATION", default_value = "30s")]
    duration: humantime::Duration,

    /// Maximum requests in flight [default: rps]
    #[arg(short, long, env = "PACER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Scenario name used in reports
    #[arg(short, long, env = "PACER_SCENARIO", default_value = "")]
    scenario: String,

    /// Write `<dir>/<scenario>/<run_id>/data.json`
    #[arg(long, env = "PACER_REPORTS_DIR")]
    reports_dir: Option<PathBuf>,

    /// Print the full run data as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = PacerCli::parse();

    let mut run = Run::new(&args.url)
        .scenario(&args.scenario)
        .method(&args.method)
        .rps(args.rps)
        .duration(args.duration.into());
    if let Some(body) = &args.body {
        run = run.body(body);
    }
    if let Some(concurrency) = args.concurrency {
        run = run.concurrency(concurrency);
    }

    let data = tokio::select! {
        res = run => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted before the run finished; nothing was reported.");
            return Ok(());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{data}");
    }

    if let Some(dir) = &args.reports_dir {
        let path = report::write(&data, dir)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
