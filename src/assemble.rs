// Assemble module - builds one series matrix per (domain, metric type)
//
// For every entity of a domain the series is fetched over the timeline
// window, scanned, and aligned. Queries for one metric type may run
// concurrently up to the configured limit; results keep catalog order.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::align::{align, AlignedSeries};
use crate::backend::{Domain, MetricsBackend, Query, Scope};
use crate::catalog::EntityCatalog;
use crate::config::MetricSets;
use crate::error::CollectError;
use crate::extract;
use crate::timeline::Timeline;

/// Aligned series of one metric type for every entity of one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMatrix {
    pub domain: Domain,
    pub metric: String,
    /// `(entity name, series)` in catalog order
    pub series: Vec<(String, AlignedSeries)>,
}

/// Fans series queries out over domains, metric types and entities
pub struct Assembler<'a> {
    backend: &'a dyn MetricsBackend,
    max_concurrent: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(backend: &'a dyn MetricsBackend, max_concurrent: usize) -> Self {
        Assembler {
            backend,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Collects every declared metric type for every domain.
    ///
    /// Domains without entities contribute no matrices. The first failure
    /// aborts the whole assembly.
    pub async fn assemble(
        &self,
        metrics: &MetricSets,
        catalog: &EntityCatalog,
        timeline: &Timeline,
    ) -> Result<Vec<SeriesMatrix>, CollectError> {
        let mut matrices = Vec::new();

        for domain in Domain::ALL {
            let entities = catalog.entities(domain);
            if entities.is_empty() {
                continue;
            }
            for metric in metrics.for_domain(domain) {
                let matrix = self.matrix(domain, metric, &entities, timeline).await?;
                matrices.push(matrix);
            }
        }

        Ok(matrices)
    }

    /// Builds the matrix for one metric type across the given entities.
    pub async fn matrix(
        &self,
        domain: Domain,
        metric: &str,
        entities: &[String],
        timeline: &Timeline,
    ) -> Result<SeriesMatrix, CollectError> {
        let series: Vec<(String, AlignedSeries)> = stream::iter(entities)
            .map(|entity| async move {
                let scope = match domain {
                    Domain::Cluster => Scope::Cluster,
                    Domain::Node => Scope::Node(entity),
                    Domain::Pod => Scope::Pod(entity),
                };
                let aligned = self.series(scope, entity, metric, timeline).await?;
                Ok::<_, CollectError>((entity.clone(), aligned))
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await?;

        Ok(SeriesMatrix {
            domain,
            metric: metric.to_string(),
            series,
        })
    }

    async fn series(
        &self,
        scope: Scope<'_>,
        entity: &str,
        metric: &str,
        timeline: &Timeline,
    ) -> Result<AlignedSeries, CollectError> {
        let body = self
            .backend
            .fetch(&Query::Series {
                scope,
                metric,
                start: timeline.start(),
                end: timeline.end(),
            })
            .await?;

        let observations =
            extract::observations(&body).map_err(|source| CollectError::MalformedSeriesBody {
                metric: metric.to_string(),
                entity: entity.to_string(),
                source,
            })?;

        debug!(
            "{} sample(s) of '{}' for {}",
            observations.len(),
            metric,
            entity
        );

        align(timeline, &observations).map_err(|source| CollectError::AlignmentPrecondition {
            metric: metric.to_string(),
            entity: entity.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignError;
    use crate::testing::FakeBackend;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, 20, 18, min, sec).unwrap()
    }

    fn timeline() -> Timeline {
        // 18:28, 18:29, 18:30
        Timeline::ending_at(at(30, 0), 2, 60)
    }

    fn pods(names: &[&str]) -> EntityCatalog {
        EntityCatalog {
            nodes: Vec::new(),
            pods: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn only_pod_metric(metric: &str) -> MetricSets {
        MetricSets {
            cluster: Vec::new(),
            node: Vec::new(),
            pod: vec![metric.to_string()],
        }
    }

    #[tokio::test]
    async fn test_matrix_keeps_catalog_order() {
        let t = timeline();
        let backend = FakeBackend::new()
            .with_series(
                Scope::Pod("web-1"),
                "memory/usage",
                t.start(),
                t.end(),
                r#"[{"timestamp":"2016-07-20T18:29:00Z","value":10}]"#,
            )
            .with_series(
                Scope::Pod("web-0"),
                "memory/usage",
                t.start(),
                t.end(),
                r#"[{"timestamp":"2016-07-20T18:28:00Z","value":7},{"timestamp":"2016-07-20T18:30:00Z","value":9}]"#,
            );

        for concurrency in [1, 4] {
            let assembler = Assembler::new(&backend, concurrency);
            let matrices = assembler
                .assemble(&only_pod_metric("memory/usage"), &pods(&["web-0", "web-1"]), &t)
                .await
                .unwrap();

            assert_eq!(
                matrices,
                vec![SeriesMatrix {
                    domain: Domain::Pod,
                    metric: "memory/usage".to_string(),
                    series: vec![
                        ("web-0".to_string(), vec![Some(7), None, Some(9)]),
                        ("web-1".to_string(), vec![None, Some(10), None]),
                    ],
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_cluster_domain_has_single_entity() {
        let t = timeline();
        let backend = FakeBackend::new().with_series(
            Scope::Cluster,
            "cpu/usage_rate",
            t.start(),
            t.end(),
            r#"[{"timestamp":"2016-07-20T18:30:00Z","value":250}]"#,
        );
        let metrics = MetricSets {
            cluster: vec!["cpu/usage_rate".to_string()],
            node: vec!["cpu/node_utilization".to_string()],
            pod: Vec::new(),
        };

        let matrices = Assembler::new(&backend, 1)
            .assemble(&metrics, &EntityCatalog::default(), &t)
            .await
            .unwrap();

        // No nodes in the catalog: only the cluster matrix is produced.
        assert_eq!(matrices.len(), 1);
        assert_eq!(matrices[0].domain, Domain::Cluster);
        assert_eq!(
            matrices[0].series,
            vec![("cluster".to_string(), vec![None, None, Some(250)])]
        );
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_series_names_metric_and_entity() {
        let t = timeline();
        let backend = FakeBackend::new().with_series(
            Scope::Pod("web-0"),
            "cpu/usage_rate",
            t.start(),
            t.end(),
            r#"[{"timestamp":"2016-07-20T18:29:00Z"}]"#,
        );

        let err = Assembler::new(&backend, 1)
            .assemble(&only_pod_metric("cpu/usage_rate"), &pods(&["web-0"]), &t)
            .await
            .unwrap_err();

        match err {
            CollectError::MalformedSeriesBody { metric, entity, .. } => {
                assert_eq!(metric, "cpu/usage_rate");
                assert_eq!(entity, "web-0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_off_grid_sample_is_alignment_error() {
        let t = timeline();
        let backend = FakeBackend::new().with_series(
            Scope::Pod("web-0"),
            "cpu/usage_rate",
            t.start(),
            t.end(),
            r#"[{"timestamp":"2016-07-20T18:29:30Z","value":1}]"#,
        );

        let err = Assembler::new(&backend, 1)
            .assemble(&only_pod_metric("cpu/usage_rate"), &pods(&["web-0"]), &t)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CollectError::AlignmentPrecondition {
                source: AlignError::Unmatched { .. },
                ..
            }
        ));
    }
}
