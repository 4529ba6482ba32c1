// Timeline module - the canonical grid of sample instants
//
// Heapster aggregates and publishes on its own cadence, so its newest sample
// is usually a little behind the client's clock. The grid is anchored at the
// newest instant the backend actually reports for a reference metric, which
// makes the right edge of every chart line up with real data.
//
// Grid slots are compared at minute:second granularity only. Instants that
// differ by whole hours collide; the collector targets sub-hour windows.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::fmt;
use tracing::{debug, info};

use crate::backend::{rfc3339, MetricsBackend, Query, Scope};
use crate::error::CollectError;
use crate::extract;

/// Minute:second key used to match samples against grid slots
/// and printed as the chart's X axis label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridLabel {
    pub minute: u32,
    pub second: u32,
}

impl GridLabel {
    pub fn of(instant: &DateTime<Utc>) -> Self {
        GridLabel {
            minute: instant.minute(),
            second: instant.second(),
        }
    }
}

impl fmt::Display for GridLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minute, self.second)
    }
}

/// Ordered, evenly spaced instants a chart is drawn over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    instants: Vec<DateTime<Utc>>,
    resolution_seconds: u32,
}

impl Timeline {
    /// Builds the grid that ends exactly at `end`.
    ///
    /// The grid has `floor(interval_minutes * 60 / resolution_seconds) + 1`
    /// instants. Each one is the previous plus the resolution, so spacing is
    /// exact. When the interval is not a whole multiple of the resolution the
    /// first slot lies slightly after `end - interval`.
    pub fn ending_at(end: DateTime<Utc>, interval_minutes: u32, resolution_seconds: u32) -> Self {
        let interval_secs = i64::from(interval_minutes) * 60;
        let step = i64::from(resolution_seconds.max(1));
        let steps = interval_secs / step;

        let resolution = Duration::seconds(step);
        let mut current = end - Duration::seconds(steps * step);
        let mut instants = Vec::with_capacity(steps as usize + 1);
        for _ in 0..=steps {
            instants.push(current);
            current += resolution;
        }

        Timeline {
            instants,
            resolution_seconds: step as u32,
        }
    }

    pub fn instants(&self) -> &[DateTime<Utc>] {
        &self.instants
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn resolution_seconds(&self) -> u32 {
        self.resolution_seconds
    }

    /// First instant of the grid
    pub fn start(&self) -> DateTime<Utc> {
        self.instants[0]
    }

    /// Last instant of the grid (the corrected end time)
    pub fn end(&self) -> DateTime<Utc> {
        self.instants[self.instants.len() - 1]
    }

    /// Minute:second keys for every slot, in order
    pub fn labels(&self) -> Vec<GridLabel> {
        self.instants.iter().map(GridLabel::of).collect()
    }
}

/// Queries the anchor metric and builds the corrected timeline.
///
/// # Arguments
/// * `backend` - Metrics backend to query
/// * `anchor_metric` - Cluster-level metric used as the reference clock
/// * `now` - Client wall-clock time
/// * `interval_minutes` - Width of the charted window
/// * `resolution_seconds` - Spacing of the grid
///
/// # Errors
/// * `CollectError::AnchorUnavailable` - the reference metric has no samples
/// * Backend or extraction errors from the reference query
pub async fn build_timeline(
    backend: &dyn MetricsBackend,
    anchor_metric: &str,
    now: DateTime<Utc>,
    interval_minutes: u32,
    resolution_seconds: u32,
) -> Result<Timeline, CollectError> {
    let start = now - Duration::minutes(i64::from(interval_minutes));
    let end = now;

    debug!(
        "Querying anchor metric '{}' between {} and {}",
        anchor_metric,
        rfc3339(&start),
        rfc3339(&end)
    );

    let body = backend
        .fetch(&Query::Series {
            scope: Scope::Cluster,
            metric: anchor_metric,
            start,
            end,
        })
        .await?;

    let anchor = extract::last_timestamp(&body)
        .map_err(|source| CollectError::MalformedSeriesBody {
            metric: anchor_metric.to_string(),
            entity: "cluster".to_string(),
            source,
        })?
        .ok_or_else(|| CollectError::AnchorUnavailable {
            metric: anchor_metric.to_string(),
            start: rfc3339(&start),
            end: rfc3339(&end),
        })?;

    let timeline = Timeline::ending_at(anchor, interval_minutes, resolution_seconds);

    info!(
        "Timeline anchored at {} ({}s behind local clock), {} slots every {}s",
        rfc3339(&anchor),
        (now - anchor).num_seconds(),
        timeline.len(),
        timeline.resolution_seconds()
    );

    Ok(timeline)
}
