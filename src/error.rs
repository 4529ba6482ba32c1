// Error module - the failure kinds of a collection run
//
// Every variant is fatal for the run. Each one carries enough context
// (URL, metric type, entity) for an operator to find the offending request.

use std::path::PathBuf;
use thiserror::Error;

use crate::align::AlignError;
use crate::backend::Domain;
use crate::extract::ExtractError;

/// Errors that abort a collection run
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("backend unreachable at {url}: {reason}")]
    BackendUnreachable { url: String, reason: String },

    #[error("could not read response body from {url}: {reason}")]
    BackendBodyUnreadable { url: String, reason: String },

    #[error("malformed {domain} catalog body: {source}")]
    MalformedCatalogBody {
        domain: Domain,
        #[source]
        source: ExtractError,
    },

    #[error("malformed series body for '{metric}' on {entity}: {source}")]
    MalformedSeriesBody {
        metric: String,
        entity: String,
        #[source]
        source: ExtractError,
    },

    #[error("anchor metric '{metric}' reported no samples between {start} and {end}")]
    AnchorUnavailable {
        metric: String,
        start: String,
        end: String,
    },

    #[error("cannot align '{metric}' on {entity}: {source}")]
    AlignmentPrecondition {
        metric: String,
        entity: String,
        #[source]
        source: AlignError,
    },

    #[error("failed to write chart file {}: {source}", .path.display())]
    FileWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
