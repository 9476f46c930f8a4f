//! # Stormlight CLI
//!
//! Command-line interface for running load tests.
//!
//! ## Usage
//!
//! ```bash
//! # 10 users, 5 new users per second, for 30 seconds
//! stormlight --host http://127.0.0.1:8000 --users 10 --spawn-rate 5 --duration 30
//!
//! # Custom endpoint file, final results saved as JSON
//! stormlight --host https://staging.example.com --users 100 --spawn-rate 10 \
//!     --duration 300 --file api.toml --output results.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stormlight::environment::seconds;
use stormlight::{load_tasks, Environment, Runner, StormError};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "stormlight")]
#[command(version)]
#[command(about = "Simulate concurrent users against an HTTP service", long_about = None)]
struct Cli {
    /// Target base URL
    #[arg(long, env = "STORMLIGHT_HOST")]
    host: String,

    /// Number of users to simulate
    #[arg(short, long)]
    users: usize,

    /// Users spawned per second
    #[arg(short, long)]
    spawn_rate: f64,

    /// Test duration in seconds
    #[arg(short, long)]
    duration: f64,

    /// Endpoint definition file
    #[arg(short, long, default_value = "stormlight.toml")]
    file: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: f64,

    /// Seconds between two printed tables
    #[arg(long, default_value = "2")]
    report_interval: f64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output final results to a JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let tasks = load_tasks(&cli.file)
        .with_context(|| format!("loading endpoints from {}", cli.file.display()))?;
    info!("Loaded {} endpoints from {}", tasks.len(), cli.file.display());

    let environment = Environment::new(cli.host, tasks)
        .with_users(cli.users)
        .with_spawn_rate(cli.spawn_rate)
        .with_duration(seconds("duration", cli.duration)?)
        .with_request_timeout(seconds("request timeout", cli.timeout)?)
        .with_report_interval(seconds("report interval", cli.report_interval)?);

    let outcome = match Runner::new(environment) {
        Ok(runner) => runner.start().await,
        Err(e) => Err(e),
    };
    let snapshot = outcome.map_err(|e| {
        let summary = failure_summary(&e);
        anyhow::Error::new(e).context(summary)
    })?;

    if let Some(output_path) = cli.output {
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&output_path, json)
            .with_context(|| format!("writing results to {}", output_path.display()))?;
        info!("Results saved to {}", output_path.display());
    }

    Ok(())
}

/// Headline for a failed run, separating bad input from faults during the run
fn failure_summary(err: &StormError) -> &'static str {
    if err.is_configuration() {
        "invalid load test configuration"
    } else {
        "load test aborted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_summary() {
        assert_eq!(
            failure_summary(&StormError::InvalidSpawnRate(0.0)),
            "invalid load test configuration"
        );
        assert_eq!(
            failure_summary(&StormError::Session("no TLS backend".into())),
            "load test aborted"
        );
    }

    #[test]
    fn test_cli_parses_required_flags() {
        let cli = Cli::parse_from([
            "stormlight",
            "--host",
            "http://127.0.0.1:8000",
            "--users",
            "3",
            "--spawn-rate",
            "1.5",
            "--duration",
            "10",
        ]);
        assert_eq!(cli.users, 3);
        assert_eq!(cli.file, PathBuf::from("stormlight.toml"));
        assert!(cli.output.is_none());
    }
}
