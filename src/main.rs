use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use scheduler_benchmark::{BenchmarkHarness, ShutdownSignal};
use scheduler_config::{AppConfig, ConfigValidator};
use scheduler_observability::init_observability;
use tokio::signal;
use tracing::{error, info, warn};

fn cli() -> Command {
    Command::new("wafer-scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs the transfer workload against each coordination strategy")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to config/wafer-scheduler.toml when present)"),
        )
        .arg(
            Arg::new("strategies")
                .short('s')
                .long("strategies")
                .value_name("CODES")
                .value_delimiter(',')
                .help("Comma-separated strategy codes to run, in order"),
        )
        .arg(
            Arg::new("robots")
                .short('r')
                .long("robots")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("items")
                .long("items")
                .value_name("N")
                .help("Items per carrier group")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("carrier-groups")
                .long("carrier-groups")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("cycles")
                .long("cycles")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Per-strategy timeout")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["json", "pretty", "compact"]),
        )
        .arg(
            Arg::new("report-format")
                .long("report-format")
                .value_name("FORMAT")
                .value_parser(["table", "json"])
                .default_value("table"),
        )
}

/// Command line values win over the file and environment.
fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(codes) = matches.get_many::<String>("strategies") {
        config.strategies.enabled = codes
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect();
    }
    if let Some(robots) = matches.get_one::<usize>("robots") {
        config.benchmark.robots = *robots;
    }
    if let Some(items) = matches.get_one::<usize>("items") {
        config.benchmark.items_per_group = *items;
    }
    if let Some(groups) = matches.get_one::<usize>("carrier-groups") {
        config.benchmark.carrier_groups = *groups;
    }
    if let Some(cycles) = matches.get_one::<usize>("cycles") {
        config.benchmark.cycles = *cycles;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.benchmark.timeout_seconds = *timeout;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.parse().map_err(anyhow::Error::msg)?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.parse().map_err(anyhow::Error::msg)?;
    }

    config
        .validate()
        .context("invalid configuration after command line overrides")?;
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig> {
    let path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.unwrap_or("default paths")))?;
    apply_overrides(&mut config, matches)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_observability(&config.observability)?;

    info!(
        strategies = ?config.strategies.enabled,
        robots = config.benchmark.robots,
        transfers = config.benchmark.total_transfers(),
        timeout_s = config.benchmark.timeout_seconds,
        "starting wafer transfer benchmark"
    );

    let shutdown = ShutdownSignal::new();
    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            shutdown.trigger();
        })
    };

    let harness = BenchmarkHarness::new(config).with_shutdown(shutdown.clone());
    let summary = harness.run_all().await;
    signal_task.abort();

    match matches.get_one::<String>("report-format").map(String::as_str) {
        Some("json") => println!("{}", summary.to_json()?),
        _ => println!("{summary}"),
    }

    if shutdown.is_triggered() {
        warn!("benchmark interrupted");
    }
    if summary.all_passed() {
        info!(runs = summary.runs.len(), "all strategies passed");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            runs = summary.runs.len(),
            failed = summary.failed_runs(),
            "benchmark failed"
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
