// Heapster Chart Collector - cluster resource usage charts
//
// Pulls cluster, node and pod metrics from a Heapster service for a recent
// window, lines the samples up on a fixed time grid and writes one gochart
// description file per metric type.
//
// # Features
// - Cluster, node and pod metric series
// - Timeline anchored on the backend's own newest sample
// - Explicit gap markers where the backend reported nothing
// - Optional JSON settings file, overridable from the command line
// - Single pass per invocation, meant to be run from a timer or by hand
//
// # Usage
// heapster-chart-collector [--config <file>] [--backend <url>] [--resolution <s>]
//                          [--interval <m>] [--chart-type <type>] [--prefix <p>]
//
// Example:
// heapster-chart-collector --backend "http://localhost:8080/api/v1/proxy/namespaces/kube-system/services/heapster" --interval 5 --resolution 60

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Module declarations
mod align;
mod assemble;
mod backend;
mod catalog;
mod chart;
mod collector;
mod config;
mod error;
mod extract;
mod timeline;

#[cfg(test)]
mod testing;

use backend::heapster::HeapsterClient;
use backend::mask_credentials;
use collector::ChartCollector;
use config::CollectorSettings;

/// Application entry point
///
/// This function:
/// 1. Initializes logging
/// 2. Builds settings from defaults, the settings file and flags
/// 3. Creates the Heapster client
/// 4. Runs one collection pass and writes the chart files
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("=== Heapster Chart Collector ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = env::args().collect();
    let settings = build_settings(&args)?;

    info!("Backend: {}", mask_credentials(&settings.backend_url));
    settings.log_summary();

    let client = HeapsterClient::new(
        &settings.backend_url,
        &settings.namespace,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .context("Failed to create Heapster client")?;

    let collector = ChartCollector::new(settings, Arc::new(client));

    match collector.run_once(Utc::now()).await {
        Ok(summary) => {
            for path in &summary.files {
                info!("  wrote {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("Collection run failed: {}", e);
            Err(e).context("Collection run aborted")
        }
    }
}

/// Builds the run settings from defaults, the optional settings file and flags
///
/// # Flags
/// * `--config <file>` - JSON settings file
/// * `--backend <url>` - Heapster service URL
/// * `--namespace <ns>` - Namespace for pod metrics
/// * `--resolution <seconds>` - Timeline spacing
/// * `--interval <minutes>` - Charted window
/// * `--chart-type <type>` - spline, line, bar, column or area
/// * `--prefix <prefix>` - Chart file name prefix
/// * `--output-dir <dir>` - Where chart files are written
/// * `--concurrency <n>` - Maximum in-flight series queries
fn build_settings(args: &[String]) -> Result<CollectorSettings> {
    // Helper function to find argument value
    let find_arg = |flag: &str| -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .map(|s| s.to_string())
    };

    let mut settings = match find_arg("--config") {
        Some(path) => CollectorSettings::from_file(&PathBuf::from(path))
            .context("Failed to load settings file")?,
        None => CollectorSettings::default(),
    };

    if let Some(url) = find_arg("--backend") {
        settings.backend_url = url;
    }
    if let Some(namespace) = find_arg("--namespace") {
        settings.namespace = namespace;
    }
    if let Some(value) = find_arg("--resolution") {
        settings.resolution_seconds = parse_number("--resolution", &value)?;
    }
    if let Some(value) = find_arg("--interval") {
        settings.interval_minutes = parse_number("--interval", &value)?;
    }
    if let Some(value) = find_arg("--chart-type") {
        settings.chart_type = match value.parse() {
            Ok(chart_type) => chart_type,
            Err(e) => bail!("Invalid --chart-type: {}", e),
        };
    }
    if let Some(prefix) = find_arg("--prefix") {
        settings.file_prefix = prefix;
    }
    if let Some(dir) = find_arg("--output-dir") {
        settings.output_dir = PathBuf::from(dir);
    }
    if let Some(value) = find_arg("--concurrency") {
        settings.max_concurrent_queries = parse_number("--concurrency", &value)?;
    }

    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("{} expects a number, got '{}'", flag, value))
}

/// Initializes the logging subsystem
///
/// Human-readable output on a terminal, JSON lines under systemd
/// (detected through INVOCATION_ID). Default level is INFO and can be
/// overridden with RUST_LOG.
fn init_logging() {
    // Systemd sets INVOCATION_ID for every unit it starts, timers included
    let is_systemd = env::var("INVOCATION_ID").is_ok();

    // INFO unless RUST_LOG says otherwise (e.g. RUST_LOG=debug shows every GET)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if is_systemd {
        // One JSON object per line for the journal
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Colored, human-readable output for interactive runs
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartType;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("heapster-chart-collector")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = build_settings(&args(&[
            "--backend",
            "http://heapster:8082",
            "--interval",
            "10",
            "--resolution",
            "30",
            "--chart-type",
            "spline",
            "--prefix",
            "nightly-",
        ]))
        .unwrap();

        assert_eq!(settings.backend_url, "http://heapster:8082");
        assert_eq!(settings.interval_minutes, 10);
        assert_eq!(settings.resolution_seconds, 30);
        assert_eq!(settings.chart_type, ChartType::Spline);
        assert_eq!(settings.file_prefix, "nightly-");
        assert_eq!(settings.namespace, "default");
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        assert!(build_settings(&args(&["--interval", "five"])).is_err());
        assert!(build_settings(&args(&["--chart-type", "pie"])).is_err());
        assert!(build_settings(&args(&["--resolution", "0"])).is_err());
        assert!(build_settings(&args(&["--interval", "60"])).is_err());
    }
}
