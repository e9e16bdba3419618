use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};

use ratewarden::config::WardenConfig;
use ratewarden::ratelimit::{RateLimitInfo, RateLimiter, RuleSet};
use ratewarden::telemetry;

/// Per-key fixed-window rate limiter.
#[derive(Debug, Parser)]
#[command(name = "ratewarden", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print snapshots as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a burst of admission checks for one key
    Simulate {
        /// Key to check
        #[arg(short, long)]
        key: String,

        /// Number of checks to run
        #[arg(short = 'n', long, default_value_t = 1)]
        requests: u32,

        /// Pause between checks in milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
    /// Show configured per-key overrides
    Limits,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WardenConfig::load(cli.config.as_deref())?;
    telemetry::init(&config.logging)?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        default_limit = config.limiter.default_limit,
        default_window_ms = config.limiter.default_window_ms,
        "Configuration loaded"
    );

    let limiter = RateLimiter::with_config(&config.limiter)?;
    if let Some(path) = &config.limiter.rules_path {
        let rules = RuleSet::from_file(path)?;
        limiter.apply_rules(&rules)?;
    }

    match cli.command {
        Command::Simulate {
            key,
            requests,
            interval_ms,
        } => {
            tokio::select! {
                result = simulate(&limiter, &key, requests, Duration::from_millis(interval_ms), cli.json) => result?,
                _ = shutdown_signal() => {}
            }
        }
        Command::Limits => {
            let limits = limiter.all_limits();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&limits)?);
            } else if limits.is_empty() {
                println!("no overrides configured");
            } else {
                for entry in limits {
                    println!("{}\t{} per {}ms", entry.key, entry.limit, entry.window_ms);
                }
            }
        }
    }

    Ok(())
}

/// Check `key` `requests` times, printing each decision and a final snapshot.
async fn simulate(
    limiter: &RateLimiter,
    key: &str,
    requests: u32,
    interval: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let quota = limiter.effective_quota(key);
    info!(key = %key, quota = %quota, requests, "Starting simulation");

    for i in 1..=requests {
        let allowed = limiter.is_allowed(key);
        println!(
            "request {}: {}",
            i,
            if allowed { "allowed" } else { "blocked" }
        );

        if i < requests && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    print_info(&limiter.rate_limit_info(key), json)
}

fn print_info(info: &RateLimitInfo, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    let reset = info
        .reset_at()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| info.reset.to_string());
    println!(
        "limit={} remaining={} reset={} remaining_time={}ms",
        info.limit,
        info.remaining,
        reset,
        info.remaining_time.as_millis()
    );
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::parse_from([
            "ratewarden",
            "--config",
            "warden.yaml",
            "simulate",
            "--key",
            "api-key-1",
            "-n",
            "4",
        ]);

        assert_eq!(cli.config.as_deref(), Some("warden.yaml"));
        match cli.command {
            Command::Simulate {
                key,
                requests,
                interval_ms,
            } => {
                assert_eq!(key, "api-key-1");
                assert_eq!(requests, 4);
                assert_eq!(interval_ms, 0);
            }
            Command::Limits => panic!("expected simulate"),
        }
    }

    #[tokio::test]
    async fn test_simulate_consumes_quota() {
        let limiter = RateLimiter::new();
        limiter.set_custom_limit("k", 3, None).unwrap();

        simulate(&limiter, "k", 4, Duration::ZERO, true).await.unwrap();

        assert_eq!(limiter.rate_limit_info("k").remaining, 0);
        assert!(!limiter.is_allowed("k"));
    }
}
