// In-memory backend for tests
//
// Replays canned bodies keyed by request path and records every request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::backend::{Listing, MetricsBackend, Query, Scope};
use crate::error::CollectError;

const NAMESPACE: &str = "default";

#[derive(Default)]
pub struct FakeBackend {
    bodies: HashMap<String, String>,
    unreadable: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, listing: Listing, body: &str) -> Self {
        self.bodies
            .insert(Query::EntityList(listing).path(NAMESPACE), body.to_string());
        self
    }

    pub fn with_series(
        mut self,
        scope: Scope<'_>,
        metric: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        body: &str,
    ) -> Self {
        let query = Query::Series {
            scope,
            metric,
            start,
            end,
        };
        self.bodies.insert(query.path(NAMESPACE), body.to_string());
        self
    }

    /// Answers the series query, then fails while reading its body
    pub fn with_unreadable_series(
        mut self,
        scope: Scope<'_>,
        metric: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let query = Query::Series {
            scope,
            metric,
            start,
            end,
        };
        self.unreadable.insert(query.path(NAMESPACE));
        self
    }

    /// Paths requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsBackend for FakeBackend {
    async fn fetch(&self, query: &Query<'_>) -> Result<String, CollectError> {
        let path = query.path(NAMESPACE);
        self.requests.lock().unwrap().push(path.clone());
        if self.unreadable.contains(&path) {
            return Err(CollectError::BackendBodyUnreadable {
                url: path,
                reason: "connection closed before message completed".to_string(),
            });
        }
        self.bodies
            .get(&path)
            .cloned()
            .ok_or_else(|| CollectError::BackendUnreachable {
                url: path,
                reason: "unexpected status 404 Not Found".to_string(),
            })
    }
}
