use thiserror::Error;

use crate::model::Minutes;

/// Failures that abort one day's layout. A partial layout is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("malformed time {0:?}: expected HH:MM")]
    MalformedTime(String),
    #[error("invalid interval [{start}, {end})")]
    InvalidInterval { start: Minutes, end: Minutes },
    #[error("slot duration must be positive")]
    ZeroDuration,
    #[error("too many events in one day: {0}")]
    TooManyEvents(usize),
}
