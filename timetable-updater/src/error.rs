//! Update failures and batch results.
//!
//! Every expected failure is a value of the closed [`UpdateErrorKind`]
//! taxonomy; nothing in the pipeline panics on bad input. A batch of updates
//! produces an [`UpdateResult`] counting successes and failures by kind.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::{FeedScopedId, TimesError};

/// Why an update could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateErrorKind {
    // Reference resolution
    TripNotFound,
    TripNotFoundInPattern,
    NoTripId,
    NoStartDate,
    NoServiceOnDate,
    // Fuzzy matching
    NoFuzzyTripMatch,
    MultipleFuzzyTripMatches,
    NoValidStops,
    // Stop pattern validation
    UnknownStop,
    StopMismatch,
    InvalidStopSequence,
    TooFewStops,
    TooManyStops,
    MixedCallOrderAndVisitNumber,
    MissingCallOrder,
    EmptyStopPointRef,
    // Creation
    TripAlreadyExists,
    CannotResolveAgency,
    // Removal
    NoTripForCancellationFound,
    // Time consistency
    NegativeDwellTime,
    NegativeHopTime,
    InvalidInputStructure,
    /// Unexpected failure inside the pipeline.
    Unknown,
}

impl UpdateErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateErrorKind::TripNotFound => "TRIP_NOT_FOUND",
            UpdateErrorKind::TripNotFoundInPattern => "TRIP_NOT_FOUND_IN_PATTERN",
            UpdateErrorKind::NoTripId => "NO_TRIP_ID",
            UpdateErrorKind::NoStartDate => "NO_START_DATE",
            UpdateErrorKind::NoServiceOnDate => "NO_SERVICE_ON_DATE",
            UpdateErrorKind::NoFuzzyTripMatch => "NO_FUZZY_TRIP_MATCH",
            UpdateErrorKind::MultipleFuzzyTripMatches => "MULTIPLE_FUZZY_TRIP_MATCHES",
            UpdateErrorKind::NoValidStops => "NO_VALID_STOPS",
            UpdateErrorKind::UnknownStop => "UNKNOWN_STOP",
            UpdateErrorKind::StopMismatch => "STOP_MISMATCH",
            UpdateErrorKind::InvalidStopSequence => "INVALID_STOP_SEQUENCE",
            UpdateErrorKind::TooFewStops => "TOO_FEW_STOPS",
            UpdateErrorKind::TooManyStops => "TOO_MANY_STOPS",
            UpdateErrorKind::MixedCallOrderAndVisitNumber => "MIXED_CALL_ORDER_AND_VISIT_NUMBER",
            UpdateErrorKind::MissingCallOrder => "MISSING_CALL_ORDER",
            UpdateErrorKind::EmptyStopPointRef => "EMPTY_STOP_POINT_REF",
            UpdateErrorKind::TripAlreadyExists => "TRIP_ALREADY_EXISTS",
            UpdateErrorKind::CannotResolveAgency => "CANNOT_RESOLVE_AGENCY",
            UpdateErrorKind::NoTripForCancellationFound => "NO_TRIP_FOR_CANCELLATION_FOUND",
            UpdateErrorKind::NegativeDwellTime => "NEGATIVE_DWELL_TIME",
            UpdateErrorKind::NegativeHopTime => "NEGATIVE_HOP_TIME",
            UpdateErrorKind::InvalidInputStructure => "INVALID_INPUT_STRUCTURE",
            UpdateErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for UpdateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed update: what went wrong, for which trip, from which source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateError {
    trip_id: Option<FeedScopedId>,
    kind: UpdateErrorKind,
    stop_index: Option<usize>,
    data_source: Option<String>,
}

impl UpdateError {
    pub fn new(trip_id: Option<FeedScopedId>, kind: UpdateErrorKind) -> Self {
        Self {
            trip_id,
            kind,
            stop_index: None,
            data_source: None,
        }
    }

    /// A failure for a known trip.
    pub fn for_trip(trip_id: &FeedScopedId, kind: UpdateErrorKind) -> Self {
        Self::new(Some(trip_id.clone()), kind)
    }

    /// A failure pinned to one stop of the update.
    pub fn at_stop(
        trip_id: Option<&FeedScopedId>,
        kind: UpdateErrorKind,
        stop_index: usize,
    ) -> Self {
        Self {
            stop_index: Some(stop_index),
            ..Self::new(trip_id.cloned(), kind)
        }
    }

    /// A time-consistency failure from building trip times.
    pub fn from_times(trip_id: &FeedScopedId, err: TimesError) -> Self {
        let kind = match &err {
            TimesError::NegativeDwellTime { .. } => UpdateErrorKind::NegativeDwellTime,
            TimesError::NegativeHopTime { .. } => UpdateErrorKind::NegativeHopTime,
            TimesError::MissingTime { .. }
            | TimesError::LengthMismatch { .. }
            | TimesError::Empty => UpdateErrorKind::InvalidInputStructure,
        };
        Self {
            stop_index: err.stop_index(),
            ..Self::for_trip(trip_id, kind)
        }
    }

    /// Tag the error with the producer it came from.
    pub fn with_data_source(mut self, source: Option<&str>) -> Self {
        self.data_source = source.map(str::to_string);
        self
    }

    /// Fill in the trip id if the failing stage did not know it.
    pub fn with_trip_id_if_missing(mut self, trip_id: Option<&FeedScopedId>) -> Self {
        if self.trip_id.is_none() {
            self.trip_id = trip_id.cloned();
        }
        self
    }

    pub fn kind(&self) -> UpdateErrorKind {
        self.kind
    }

    pub fn trip_id(&self) -> Option<&FeedScopedId> {
        self.trip_id.as_ref()
    }

    pub fn stop_index(&self) -> Option<usize> {
        self.stop_index
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(trip_id) = &self.trip_id {
            write!(f, " for trip {trip_id}")?;
        }
        if let Some(index) = self.stop_index {
            write!(f, " at stop {index}")?;
        }
        if let Some(source) = &self.data_source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for UpdateError {}

/// Something worth reporting about an update that was still applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateWarning {
    /// Stops missing from the schedule were dropped from an added trip.
    UnknownStopsRemovedFromAddedTrip,
    /// A stop update pointed past the end of the pattern and was ignored.
    StopSequenceOutOfBounds,
}

/// Outcome counts for a batch of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    successful: usize,
    failures: BTreeMap<UpdateErrorKind, usize>,
    errors: Vec<UpdateError>,
    warnings: Vec<UpdateWarning>,
}

impl UpdateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, warnings: &[UpdateWarning]) {
        self.successful += 1;
        self.warnings.extend_from_slice(warnings);
    }

    pub fn record_failure(&mut self, error: UpdateError) {
        *self.failures.entry(error.kind()).or_default() += 1;
        self.errors.push(error);
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Number of failures of one kind.
    pub fn failures_of(&self, kind: UpdateErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    /// Failure counts by kind, in a stable order.
    pub fn failures_by_kind(&self) -> &BTreeMap<UpdateErrorKind, usize> {
        &self.failures
    }

    pub fn errors(&self) -> &[UpdateError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[UpdateWarning] {
        &self.warnings
    }

    /// Fold another batch's counts into this one.
    pub fn merge(&mut self, other: UpdateResult) {
        self.successful += other.successful;
        for (kind, count) in other.failures {
            *self.failures.entry(kind).or_default() += count;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> FeedScopedId {
        FeedScopedId::new("F", s).unwrap()
    }

    #[test]
    fn error_display() {
        let err = UpdateError::for_trip(&id("T1"), UpdateErrorKind::TripNotFound);
        assert_eq!(err.to_string(), "TRIP_NOT_FOUND for trip F:T1");

        let err = UpdateError::at_stop(Some(&id("T1")), UpdateErrorKind::UnknownStop, 2)
            .with_data_source(Some("siri-et"));
        assert_eq!(err.to_string(), "UNKNOWN_STOP for trip F:T1 at stop 2 (siri-et)");

        let err = UpdateError::new(None, UpdateErrorKind::NoStartDate);
        assert_eq!(err.to_string(), "NO_START_DATE");
    }

    #[test]
    fn times_errors_map_to_kinds() {
        let err = UpdateError::from_times(&id("T1"), TimesError::NegativeHopTime { stop_index: 3 });
        assert_eq!(err.kind(), UpdateErrorKind::NegativeHopTime);
        assert_eq!(err.stop_index(), Some(3));

        let err = UpdateError::from_times(&id("T1"), TimesError::NegativeDwellTime { stop_index: 0 });
        assert_eq!(err.kind(), UpdateErrorKind::NegativeDwellTime);

        let err = UpdateError::from_times(&id("T1"), TimesError::MissingTime { stop_index: 1 });
        assert_eq!(err.kind(), UpdateErrorKind::InvalidInputStructure);
    }

    #[test]
    fn trip_id_filled_only_when_missing() {
        let err = UpdateError::new(None, UpdateErrorKind::NoStartDate)
            .with_trip_id_if_missing(Some(&id("T1")));
        assert_eq!(err.trip_id(), Some(&id("T1")));

        let err = err.with_trip_id_if_missing(Some(&id("T2")));
        assert_eq!(err.trip_id(), Some(&id("T1")));
    }

    #[test]
    fn result_counts() {
        let mut result = UpdateResult::new();
        result.record_success(&[]);
        result.record_success(&[UpdateWarning::UnknownStopsRemovedFromAddedTrip]);
        result.record_failure(UpdateError::new(None, UpdateErrorKind::TripNotFound));
        result.record_failure(UpdateError::new(None, UpdateErrorKind::TripNotFound));
        result.record_failure(UpdateError::new(None, UpdateErrorKind::TooFewStops));

        assert_eq!(result.successful(), 2);
        assert_eq!(result.failed(), 3);
        assert_eq!(result.failures_of(UpdateErrorKind::TripNotFound), 2);
        assert_eq!(result.failures_of(UpdateErrorKind::NoStartDate), 0);
        assert_eq!(result.warnings(), &[UpdateWarning::UnknownStopsRemovedFromAddedTrip]);

        let mut total = UpdateResult::new();
        total.merge(result.clone());
        total.merge(result);
        assert_eq!(total.successful(), 4);
        assert_eq!(total.failures_of(UpdateErrorKind::TripNotFound), 4);
    }

    #[test]
    fn kind_names() {
        assert_eq!(
            UpdateErrorKind::NoTripForCancellationFound.to_string(),
            "NO_TRIP_FOR_CANCELLATION_FOUND"
        );
        assert_eq!(
            serde_json::to_string(&UpdateErrorKind::MultipleFuzzyTripMatches).unwrap(),
            "\"MULTIPLE_FUZZY_TRIP_MATCHES\""
        );
    }
}
