//! Static schedule loading errors.

use crate::domain::{FeedScopedId, InvalidFeedScopedId, PatternError, TimeError, TimesError};

/// Errors that can occur when building or loading a static schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Failed to read the schedule file
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    /// Failed to parse the schedule JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// An identifier could not be scoped to the feed
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] InvalidFeedScopedId),

    /// A time string was malformed
    #[error(transparent)]
    Time(#[from] TimeError),

    /// A trip's scheduled times run backwards
    #[error("invalid trip times for {trip_id}: {source}")]
    Times {
        trip_id: FeedScopedId,
        source: TimesError,
    },

    /// A trip's times do not fit its pattern
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// Something refers to an entity that was never defined
    #[error("unknown {kind} {id}")]
    UnknownReference { kind: &'static str, id: FeedScopedId },

    /// A trip is listed on more than one pattern
    #[error("trip {0} appears in more than one pattern")]
    DuplicateTrip(FeedScopedId),

    /// The time zone is not a known IANA zone
    #[error("invalid time zone: {0}")]
    TimeZone(String),
}
