// Align module - merges sparse samples onto the canonical timeline
//
// A single forward pass over both sequences. Slots without a sample stay
// `None`; the chart writer turns those into the renderer's gap marker.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::extract::Observation;
use crate::timeline::{GridLabel, Timeline};

/// Dense series, one slot per timeline instant
pub type AlignedSeries = Vec<Option<i64>>;

/// Violated preconditions of the merge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignError {
    #[error("sample at {timestamp} does not fall on any remaining timeline slot")]
    Unmatched { timestamp: DateTime<Utc> },

    #[error("sample at {timestamp} is earlier than the preceding sample at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("timeline is not strictly increasing at slot {index}")]
    TimelineNotIncreasing { index: usize },
}

/// Places each observation in the timeline slot with the same minute:second key.
///
/// Observations must be in non-decreasing time order. Several observations on
/// the same slot overwrite each other, the last one wins.
///
/// # Errors
/// * `AlignError::OutOfOrder` - observations go backwards in time
/// * `AlignError::Unmatched` - an observation has no slot at or after the
///   current position
/// * `AlignError::TimelineNotIncreasing` - the grid itself is not ordered
pub fn align(timeline: &Timeline, observations: &[Observation]) -> Result<AlignedSeries, AlignError> {
    if let Some(index) = timeline
        .instants()
        .windows(2)
        .position(|pair| pair[1] <= pair[0])
    {
        return Err(AlignError::TimelineNotIncreasing { index: index + 1 });
    }

    let slots: Vec<GridLabel> = timeline.labels();
    let mut series: AlignedSeries = vec![None; slots.len()];

    let mut l = 0;
    let mut previous: Option<DateTime<Utc>> = None;
    for observation in observations {
        if let Some(previous) = previous {
            if observation.timestamp < previous {
                return Err(AlignError::OutOfOrder {
                    previous,
                    timestamp: observation.timestamp,
                });
            }
        }
        previous = Some(observation.timestamp);

        let key = GridLabel::of(&observation.timestamp);
        while l < slots.len() && slots[l] != key {
            l += 1;
        }
        if l == slots.len() {
            return Err(AlignError::Unmatched {
                timestamp: observation.timestamp,
            });
        }
        series[l] = Some(observation.value);
    }

    Ok(series)
}
