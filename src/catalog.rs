// Catalog module - lists the nodes and pods to collect metrics for

use tracing::{info, warn};

use crate::backend::{Domain, Listing, MetricsBackend, Query};
use crate::error::CollectError;
use crate::extract;

/// Entity names known to the backend for this run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCatalog {
    pub nodes: Vec<String>,
    pub pods: Vec<String>,
}

impl EntityCatalog {
    /// Entity names of a domain. The cluster is its own single entity.
    pub fn entities(&self, domain: Domain) -> Vec<String> {
        match domain {
            Domain::Cluster => vec![Domain::Cluster.to_string()],
            Domain::Node => self.nodes.clone(),
            Domain::Pod => self.pods.clone(),
        }
    }
}

/// Fetches the node and pod listings.
///
/// An empty listing is allowed and only logged; a listing that cannot be
/// scanned fails the run.
pub async fn load_catalog(backend: &dyn MetricsBackend) -> Result<EntityCatalog, CollectError> {
    let nodes = load_domain(backend, Listing::Nodes).await?;
    let pods = load_domain(backend, Listing::Pods).await?;

    info!("Catalog loaded: {} node(s), {} pod(s)", nodes.len(), pods.len());
    Ok(EntityCatalog { nodes, pods })
}

async fn load_domain(
    backend: &dyn MetricsBackend,
    listing: Listing,
) -> Result<Vec<String>, CollectError> {
    let domain = listing.domain();
    let body = backend.fetch(&Query::EntityList(listing)).await?;
    let names = extract::entity_names(&body)
        .map_err(|source| CollectError::MalformedCatalogBody { domain, source })?;

    if names.is_empty() {
        warn!("Backend lists no {} entities; {} charts will be skipped", domain, domain);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_load_catalog() {
        let backend = FakeBackend::new()
            .with_list(Listing::Nodes, r#"["node-1","node-2"]"#)
            .with_list(Listing::Pods, "[\n  \"web-0\"\n]");

        let catalog = load_catalog(&backend).await.unwrap();
        assert_eq!(catalog.nodes, vec!["node-1", "node-2"]);
        assert_eq!(catalog.pods, vec!["web-0"]);
        assert_eq!(catalog.entities(Domain::Cluster), vec!["cluster"]);
    }

    #[tokio::test]
    async fn test_empty_domain_is_not_an_error() {
        let backend = FakeBackend::new()
            .with_list(Listing::Nodes, "[]")
            .with_list(Listing::Pods, "[ ]");

        let catalog = load_catalog(&backend).await.unwrap();
        assert!(catalog.entities(Domain::Node).is_empty());
        assert!(catalog.entities(Domain::Pod).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_listing_is_fatal() {
        let backend = FakeBackend::new()
            .with_list(Listing::Nodes, r#"["node-1"]"#)
            .with_list(Listing::Pods, "pods: web-0");

        let err = load_catalog(&backend).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::MalformedCatalogBody {
                domain: Domain::Pod,
                ..
            }
        ));
    }
}
