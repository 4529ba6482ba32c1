// Configuration module - run parameters for a collection pass
//
// Settings come from three layers, later ones winning:
// 1. Built-in defaults (a local kubectl proxy in front of Heapster)
// 2. An optional JSON settings file (--config)
// 3. Command-line flags
// The result is validated once before any request is issued.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::backend::Domain;
use crate::chart::ChartType;

/// Longest window whose slots stay distinct under minute:second labels
pub const MAX_INTERVAL_MINUTES: u32 = 59;

/// Errors that can occur while loading settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read settings file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// All parameters of a collection run
///
/// # Example settings file
/// ```json
/// {
///   "backend_url": "http://localhost:8080/api/v1/proxy/namespaces/kube-system/services/heapster",
///   "interval_minutes": 10,
///   "resolution_seconds": 60,
///   "chart_type": "spline",
///   "metrics": {
///     "cluster": ["cpu/usage_rate"],
///     "node": ["cpu/node_utilization"],
///     "pod": ["memory/working_set"]
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// Heapster service URL (usually through the API server proxy)
    pub backend_url: String,

    /// Namespace whose pods are charted
    pub namespace: String,

    /// Width of the charted window, in minutes
    pub interval_minutes: u32,

    /// Spacing between timeline slots, in seconds
    pub resolution_seconds: u32,

    /// Chart style passed to the renderer
    pub chart_type: ChartType,

    /// Prepended to every chart file name and title
    pub file_prefix: String,

    /// Directory chart files are written to
    pub output_dir: PathBuf,

    /// Cluster metric whose newest sample anchors the timeline
    pub anchor_metric: String,

    /// Upper bound on in-flight series queries (1 = sequential)
    pub max_concurrent_queries: usize,

    /// Transport timeout for a single request, in seconds
    pub request_timeout_secs: u64,

    /// Metric types collected per domain
    pub metrics: MetricSets,
}

/// Metric types per entity domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSets {
    pub cluster: Vec<String>,
    pub node: Vec<String>,
    pub pod: Vec<String>,
}

impl MetricSets {
    pub fn for_domain(&self, domain: Domain) -> &[String] {
        match domain {
            Domain::Cluster => &self.cluster,
            Domain::Node => &self.node,
            Domain::Pod => &self.pod,
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for MetricSets {
    fn default() -> Self {
        MetricSets {
            cluster: owned(&["cpu/usage_rate", "memory/usage"]),
            node: owned(&[
                "cpu/node_utilization",
                "memory/node_utilization",
                "memory/working_set",
                "network/tx_rate",
            ]),
            pod: owned(&[
                "cpu/usage_rate",
                "memory/usage",
                "memory/working_set",
                "network/tx_rate",
            ]),
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            backend_url:
                "http://localhost:8080/api/v1/proxy/namespaces/kube-system/services/heapster"
                    .to_string(),
            namespace: "default".to_string(),
            interval_minutes: 5,
            resolution_seconds: 60,
            chart_type: ChartType::Line,
            file_prefix: String::new(),
            output_dir: PathBuf::from("."),
            anchor_metric: "cpu/usage_rate".to_string(),
            max_concurrent_queries: 1,
            request_timeout_secs: 30,
            metrics: MetricSets::default(),
        }
    }
}

impl CollectorSettings {
    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading settings from {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the settings before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend_url is empty".to_string()));
        }
        if self.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "interval_minutes must be greater than 0".to_string(),
            ));
        }
        if self.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "interval_minutes must be at most {} (timeline labels repeat every hour), got {}",
                MAX_INTERVAL_MINUTES, self.interval_minutes
            )));
        }
        if self.resolution_seconds == 0 {
            return Err(ConfigError::Invalid(
                "resolution_seconds must be greater than 0".to_string(),
            ));
        }
        if u64::from(self.resolution_seconds) > u64::from(self.interval_minutes) * 60 {
            return Err(ConfigError::Invalid(format!(
                "resolution of {}s is wider than the {}m interval",
                self.resolution_seconds, self.interval_minutes
            )));
        }
        if self.anchor_metric.trim().is_empty() {
            return Err(ConfigError::Invalid("anchor_metric is empty".to_string()));
        }
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_queries must be at least 1".to_string(),
            ));
        }
        for domain in Domain::ALL {
            if let Some(bad) = self
                .metrics
                .for_domain(domain)
                .iter()
                .find(|m| m.trim().is_empty())
            {
                return Err(ConfigError::Invalid(format!(
                    "empty metric type '{}' in {} metrics",
                    bad, domain
                )));
            }
        }
        Ok(())
    }

    /// Logs the effective settings
    pub fn log_summary(&self) {
        info!(
            "Window: {}m at {}s resolution, chart type '{}'",
            self.interval_minutes, self.resolution_seconds, self.chart_type
        );
        for domain in Domain::ALL {
            info!(
                "  {} metrics: {}",
                domain,
                self.metrics.for_domain(domain).join(", ")
            );
        }
    }
}
