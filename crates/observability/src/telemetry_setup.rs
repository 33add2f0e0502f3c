use std::net::SocketAddr;

use anyhow::{Context, Result};
use scheduler_config::{LogFormat, ObservabilityConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let level = config.log_level.to_string();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_thread_names(true);

            registry
                .with(fmt_layer)
                .try_init()
                .context("failed to initialize JSON logging")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(config.include_location)
                .with_line_number(config.include_location);

            registry
                .with(fmt_layer)
                .try_init()
                .context("failed to initialize pretty logging")?;
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_file(config.include_location)
                .with_line_number(config.include_location);

            registry
                .with(fmt_layer)
                .try_init()
                .context("failed to initialize compact logging")?;
        }
    }

    info!(
        logging.format = ?config.log_format,
        logging.level = %level,
        "Logging initialized"
    );

    Ok(())
}

/// Install the Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid metrics listen address: {listen}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!(listen = %addr, "Prometheus metrics exporter installed");
    Ok(())
}

pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    if config.metrics_enabled {
        init_metrics(&config.metrics_listen)?;
    }
    Ok(())
}
