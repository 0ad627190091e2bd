//! References from an update to schedule entities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Direction, FeedScopedId};

/// Whether a trip may be found by fuzzy matching when its id is missing or
/// unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuzzyMatchingHint {
    #[default]
    ExactMatchRequired,
    FuzzyMatchAllowed,
}

/// Everything an update says about which trip it refers to.
///
/// Producers fill in whatever their protocol provides, so any field may be
/// missing. Resolution prefers `trip_id`, then `trip_on_service_date_id`,
/// then fuzzy matching on the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripReference {
    pub trip_id: Option<FeedScopedId>,
    /// Dated trip (trip bound to a service date).
    pub trip_on_service_date_id: Option<FeedScopedId>,
    pub route_id: Option<FeedScopedId>,
    /// Scheduled first departure, `HH:MM:SS` since start of service.
    pub start_time: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub direction: Option<Direction>,
    pub vehicle_ref: Option<String>,
    pub line_ref: Option<String>,
    pub internal_planning_code: Option<String>,
    pub fuzzy_matching: FuzzyMatchingHint,
}

impl TripReference {
    /// Reference a trip by id only.
    pub fn by_trip_id(trip_id: FeedScopedId) -> Self {
        Self {
            trip_id: Some(trip_id),
            ..Self::default()
        }
    }

    /// True if fuzzy matching may be attempted.
    pub fn allows_fuzzy_matching(&self) -> bool {
        self.fuzzy_matching == FuzzyMatchingHint::FuzzyMatchAllowed
    }

    /// Planning code for rail matching: the explicit code, else the
    /// vehicle reference.
    pub fn planning_code(&self) -> Option<&str> {
        self.internal_planning_code
            .as_deref()
            .or(self.vehicle_ref.as_deref())
    }
}

/// How a stop reference's id is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopResolutionStrategy {
    /// The id is a stop id.
    #[default]
    Direct,
    /// The id is tried as a scheduled stop point first, then as a stop id.
    ScheduledStopPointFirst,
}

/// A reference to a stop.
///
/// `assigned_stop_id` is the platform or quay actually used, where the
/// producer distinguishes it from the planned stop; it takes precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopReference {
    pub stop_id: Option<FeedScopedId>,
    pub assigned_stop_id: Option<FeedScopedId>,
    pub resolution: StopResolutionStrategy,
}

impl StopReference {
    pub fn of_stop(stop_id: FeedScopedId) -> Self {
        Self {
            stop_id: Some(stop_id),
            ..Self::default()
        }
    }

    /// The id to resolve: assigned stop if present, else the stop.
    pub fn primary_id(&self) -> Option<&FeedScopedId> {
        self.assigned_stop_id.as_ref().or(self.stop_id.as_ref())
    }

    /// True if the reference names no stop at all.
    pub fn is_empty(&self) -> bool {
        self.primary_id().is_none()
    }
}
