// Extract module - anchor-based scanner for Heapster response bodies
//
// The model API returns a narrow, fixed shape of quasi-JSON:
//   ["name-a","name-b"]                                    (entity listings)
//   {"metrics":[{"timestamp":"..","value":12},..],..}      (metric series)
// Rather than parsing arbitrary JSON, the scanner strips whitespace, cuts out
// the first bracketed list and reads each record through literal anchors.
// A body that cannot be read completely is rejected as a whole.

use chrono::{DateTime, Utc};
use thiserror::Error;

const VALUE_ANCHOR: &str = "\"value\":";
const TIMESTAMP_ANCHOR: &str = "\"timestamp\":";

/// Reasons a response body could not be scanned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no bracketed list found in body")]
    MissingList,

    #[error("record {record} has no {field} field")]
    MissingField { record: usize, field: &'static str },

    #[error("record {record} has a non-numeric value '{token}'")]
    InvalidValue { record: usize, token: String },

    #[error("record {record} has an unreadable timestamp '{token}'")]
    InvalidTimestamp { record: usize, token: String },

    #[error("list entry {position} is not a quoted name: '{token}'")]
    UnquotedName { position: usize, token: String },
}

/// One sample reported by the backend for a single metric type and entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: i64,
}

/// Removes every whitespace character, including those inside quotes.
fn strip_whitespace(body: &str) -> String {
    body.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Returns the text between the first `[` and the first `]` after it.
fn bracketed(body: &str) -> Result<&str, ExtractError> {
    let open = body.find('[').ok_or(ExtractError::MissingList)?;
    let close = body[open..]
        .find(']')
        .map(|i| open + i)
        .ok_or(ExtractError::MissingList)?;
    Ok(&body[open + 1..close])
}

/// Parses an entity listing such as `["node-1","node-2"]`.
///
/// An empty list (`[]`) yields an empty vector. Names are returned in listed
/// order.
///
/// # Errors
/// * `ExtractError::MissingList` - no bracket pair in the body
/// * `ExtractError::UnquotedName` - an entry is not a non-empty quoted string
pub fn entity_names(body: &str) -> Result<Vec<String>, ExtractError> {
    let compact = strip_whitespace(body);
    let content = bracketed(&compact)?;
    if content.is_empty() {
        return Ok(Vec::new());
    }

    content
        .split(',')
        .enumerate()
        .map(|(position, token)| {
            let name = token
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .filter(|name| !name.is_empty() && !name.contains('"'));
            match name {
                Some(name) => Ok(name.to_string()),
                None => Err(ExtractError::UnquotedName {
                    position,
                    token: token.to_string(),
                }),
            }
        })
        .collect()
}

/// Parses a metric series body into observations.
///
/// Records are returned in the order they appear in the body; the backend
/// reports them chronologically and no re-sorting is done here.
///
/// # Errors
/// Any record without a readable `timestamp` and `value` rejects the whole body.
pub fn observations(body: &str) -> Result<Vec<Observation>, ExtractError> {
    let compact = strip_whitespace(body);
    let content = bracketed(&compact)?;

    let mut fragments: Vec<&str> = content.split('}').collect();
    // A terminal '}' leaves one empty fragment behind.
    if fragments.last().is_some_and(|f| f.is_empty()) {
        fragments.pop();
    }

    fragments
        .into_iter()
        .enumerate()
        .map(|(record, fragment)| parse_record(record, fragment))
        .collect()
}

/// Returns the timestamp of the last record in a series body.
///
/// Used to find the backend's most recent sample without keeping the rest.
pub fn last_timestamp(body: &str) -> Result<Option<DateTime<Utc>>, ExtractError> {
    Ok(observations(body)?.last().map(|o| o.timestamp))
}

fn parse_record(record: usize, fragment: &str) -> Result<Observation, ExtractError> {
    let value = read_value(record, fragment)?;
    let timestamp = read_timestamp(record, fragment)?;
    Ok(Observation { timestamp, value })
}

fn read_value(record: usize, fragment: &str) -> Result<i64, ExtractError> {
    let start = fragment
        .find(VALUE_ANCHOR)
        .map(|i| i + VALUE_ANCHOR.len())
        .ok_or(ExtractError::MissingField {
            record,
            field: "value",
        })?;
    let rest = &fragment[start..];
    let token = &rest[..rest.find(',').unwrap_or(rest.len())];

    token.parse::<i64>().map_err(|_| ExtractError::InvalidValue {
        record,
        token: token.to_string(),
    })
}

fn read_timestamp(record: usize, fragment: &str) -> Result<DateTime<Utc>, ExtractError> {
    let start = fragment
        .find(TIMESTAMP_ANCHOR)
        .map(|i| i + TIMESTAMP_ANCHOR.len())
        .ok_or(ExtractError::MissingField {
            record,
            field: "timestamp",
        })?;
    let rest = &fragment[start..];

    let invalid = |token: &str| ExtractError::InvalidTimestamp {
        record,
        token: token.to_string(),
    };

    let quoted = rest.strip_prefix('"').ok_or_else(|| invalid(rest))?;
    let end = quoted.find('"').ok_or_else(|| invalid(rest))?;
    let token = &quoted[..end];

    DateTime::parse_from_rfc3339(token)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| invalid(token))
}
