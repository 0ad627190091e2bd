//! Trip resolution for updates without a usable trip id.
//!
//! Two strategies exist. [`LastStopArrivalMatcher`] indexes every trip by
//! its last stop and scheduled arrival there, which suits producers that
//! describe a journey by its calls. [`RouteDirectionTimeMatcher`] finds a
//! trip by route, direction and start time, which suits producers that
//! identify trips that way.
//!
//! A matcher either finds exactly one trip or fails. Several equally good
//! candidates are an error, never an arbitrary pick.

mod last_stop;
mod route_direction;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{Trip, TripPattern};
use crate::error::UpdateError;
use crate::update::ParsedTripUpdate;

pub use last_stop::LastStopArrivalMatcher;
pub use route_direction::RouteDirectionTimeMatcher;

/// A matched trip, the scheduled pattern it runs on, and the service date
/// the match was made for.
#[derive(Debug, Clone)]
pub struct TripAndPattern {
    pub trip: Arc<Trip>,
    pub pattern: Arc<TripPattern>,
    pub service_date: NaiveDate,
}

/// A strategy for finding the trip an update is about.
pub trait FuzzyTripMatcher: Send + Sync {
    /// Find the single trip matching `update` on or around `service_date`.
    fn match_trip(
        &self,
        update: &ParsedTripUpdate,
        service_date: NaiveDate,
    ) -> Result<TripAndPattern, UpdateError>;
}
