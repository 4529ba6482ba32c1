// Chart module - writes aligned series as gochart description files
//
// gochart (https://github.com/zieckey/gochart) reads one chart per file:
//
//   ChartType = line
//   Title = pod-cpu/usage_rate
//   SubTitle =
//
//   XAxisNumbers = 25:00, 26:00, 27:00
//
//   YAxisText = cpu/usage_rate
//
//   Data|web-0 = 12, -100, 14
//
// Gaps are written as MISSING_SENTINEL; drawing them is the renderer's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::assemble::SeriesMatrix;
use crate::error::CollectError;
use crate::timeline::GridLabel;

/// Value written for timeline slots that have no sample
pub const MISSING_SENTINEL: i64 = -100;

/// Chart styles supported by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Spline,
    #[default]
    Line,
    Bar,
    Column,
    Area,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Spline => "spline",
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Column => "column",
            ChartType::Area => "area",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spline" => Ok(ChartType::Spline),
            "line" => Ok(ChartType::Line),
            "bar" => Ok(ChartType::Bar),
            "column" => Ok(ChartType::Column),
            "area" => Ok(ChartType::Area),
            other => Err(format!(
                "unknown chart type '{}' (expected spline, line, bar, column or area)",
                other
            )),
        }
    }
}

/// File name for a chart: `<prefix><metric>.chart` with every `/` in the
/// metric replaced by `-`.
pub fn chart_file_name(prefix: &str, metric: &str) -> String {
    format!("{}{}.chart", prefix, metric.replace('/', "-"))
}

/// Hidden name a chart is written under before it is published.
pub fn staging_name(file_name: &str) -> String {
    format!(".{}.partial", file_name)
}

/// Renders one metric type's series matrix.
///
/// # Arguments
/// * `title` - Chart title
/// * `chart_type` - Renderer chart style
/// * `labels` - X axis labels, one per timeline slot
/// * `matrix` - Aligned series, one Data line per entity
pub fn render(
    title: &str,
    chart_type: ChartType,
    labels: &[GridLabel],
    matrix: &SeriesMatrix,
) -> String {
    let x_axis = labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "ChartType = {}\nTitle = {}\nSubTitle = \n\nXAxisNumbers = {}\n\nYAxisText = {}\n\n",
        chart_type, title, x_axis, matrix.metric
    );

    for (entity, series) in &matrix.series {
        let values = series
            .iter()
            .map(|v| v.unwrap_or(MISSING_SENTINEL).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("Data|{} = {}\n", entity, values));
    }

    out
}

/// Writes a rendered chart into `dir` and returns the file path.
pub async fn write_chart(
    dir: &Path,
    file_name: &str,
    contents: &str,
) -> Result<PathBuf, CollectError> {
    let path = dir.join(file_name);
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| CollectError::FileWriteFailure {
            path: path.clone(),
            source,
        })?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(path)
}

/// Moves a staged chart to its final name and returns the final path.
pub async fn publish_chart(
    dir: &Path,
    staged_name: &str,
    file_name: &str,
) -> Result<PathBuf, CollectError> {
    let path = dir.join(file_name);
    tokio::fs::rename(dir.join(staged_name), &path)
        .await
        .map_err(|source| CollectError::FileWriteFailure {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Removes staged charts after a failed write. Removal errors are only logged.
pub async fn discard_staged(dir: &Path, staged_names: &[String]) {
    for name in staged_names {
        let path = dir.join(name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Could not remove staged chart {}: {}", path.display(), e);
        }
    }
}
