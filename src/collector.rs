// Collector module - one complete collection run
//
// The run is a single pass:
//   catalog -> anchored timeline -> series matrices -> chart files
// Nothing is written until every series has been collected, so a failing
// query never leaves charts behind. Charts are first written under hidden
// staging names and only renamed into place once every write succeeded; a
// failed write removes the staged files. A rename failing midway removes the
// staged files still pending but keeps the charts already renamed.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::assemble::{Assembler, SeriesMatrix};
use crate::backend::MetricsBackend;
use crate::catalog::load_catalog;
use crate::chart::{
    chart_file_name, discard_staged, publish_chart, render, staging_name, write_chart,
};
use crate::config::CollectorSettings;
use crate::error::CollectError;
use crate::timeline::{build_timeline, Timeline};

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Chart files written, in write order
    pub files: Vec<PathBuf>,

    /// Total number of aligned series across all charts
    pub series: usize,

    /// Timeline slots per series
    pub slots: usize,
}

/// Drives a collection run against a metrics backend
pub struct ChartCollector {
    settings: Arc<CollectorSettings>,
    backend: Arc<dyn MetricsBackend>,
}

impl ChartCollector {
    /// Creates a new ChartCollector
    ///
    /// # Arguments
    /// * `settings` - Validated run settings
    /// * `backend` - Source of catalog and series bodies
    pub fn new(settings: CollectorSettings, backend: Arc<dyn MetricsBackend>) -> Self {
        ChartCollector {
            settings: Arc::new(settings),
            backend,
        }
    }

    /// Runs the full pipeline once.
    ///
    /// # Arguments
    /// * `now` - Client wall-clock time the window is measured back from
    ///
    /// # Returns
    /// * `Ok(RunSummary)` - every chart was written
    /// * `Err(CollectError)` - the first failure; the run is abandoned
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunSummary, CollectError> {
        let settings = &self.settings;
        let backend = self.backend.as_ref();

        let catalog = load_catalog(backend).await?;

        let timeline = build_timeline(
            backend,
            &settings.anchor_metric,
            now,
            settings.interval_minutes,
            settings.resolution_seconds,
        )
        .await?;

        let matrices = Assembler::new(backend, settings.max_concurrent_queries)
            .assemble(&settings.metrics, &catalog, &timeline)
            .await?;

        self.write_charts(&timeline, &matrices).await
    }

    async fn write_charts(
        &self,
        timeline: &Timeline,
        matrices: &[SeriesMatrix],
    ) -> Result<RunSummary, CollectError> {
        let labels = timeline.labels();
        let mut summary = RunSummary {
            slots: timeline.len(),
            ..RunSummary::default()
        };

        let dir = &self.settings.output_dir;
        let mut staged: Vec<(String, String)> = Vec::with_capacity(matrices.len());

        for matrix in matrices {
            let prefix = format!("{}{}-", self.settings.file_prefix, matrix.domain);
            let title = format!("{}{}", prefix, matrix.metric);
            let contents = render(&title, self.settings.chart_type, &labels, matrix);
            let file_name = chart_file_name(&prefix, &matrix.metric);
            let staged_name = staging_name(&file_name);

            if let Err(e) = write_chart(dir, &staged_name, &contents).await {
                let names: Vec<String> = staged.into_iter().map(|(s, _)| s).collect();
                discard_staged(dir, &names).await;
                return Err(e);
            }

            summary.series += matrix.series.len();
            staged.push((staged_name, file_name));
        }

        for (i, (staged_name, file_name)) in staged.iter().enumerate() {
            match publish_chart(dir, staged_name, file_name).await {
                Ok(path) => summary.files.push(path),
                Err(e) => {
                    let rest: Vec<String> = staged[i..].iter().map(|(s, _)| s.clone()).collect();
                    discard_staged(dir, &rest).await;
                    return Err(e);
                }
            }
        }

        info!(
            "Run complete: {} chart(s), {} series of {} slot(s)",
            summary.files.len(),
            summary.series,
            summary.slots
        );

        Ok(summary)
    }
}
