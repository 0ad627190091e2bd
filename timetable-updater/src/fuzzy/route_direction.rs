use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::domain::{SECONDS_PER_DAY, parse_service_time};
use crate::error::{UpdateError, UpdateErrorKind};
use crate::schedule::StaticSchedule;
use crate::update::{ParsedTripUpdate, TripReference};

use super::{FuzzyTripMatcher, TripAndPattern};

/// Matches a trip by route, direction and scheduled start time.
///
/// A start time past midnight may belong to a trip of the previous
/// service day, so a miss is retried with the time shifted by 24 hours
/// against the previous date.
pub struct RouteDirectionTimeMatcher {
    schedule: Arc<StaticSchedule>,
}

impl RouteDirectionTimeMatcher {
    pub fn new(schedule: Arc<StaticSchedule>) -> Self {
        Self { schedule }
    }

    fn find_trip(&self, reference: &TripReference, start_time: i32, date: NaiveDate) -> Option<TripAndPattern> {
        let route_id = reference.route_id.as_ref()?;
        for pattern in self.schedule.patterns_for_route(route_id) {
            if reference.direction.is_some() && pattern.direction() != reference.direction {
                continue;
            }
            for times in pattern.scheduled_times() {
                if times.scheduled_first_departure() != start_time {
                    continue;
                }
                let Some(trip) = self.schedule.trip(times.trip_id()) else {
                    continue;
                };
                if self.schedule.is_trip_active(trip, date) {
                    return Some(TripAndPattern {
                        trip: Arc::clone(trip),
                        pattern: Arc::clone(pattern),
                        service_date: date,
                    });
                }
            }
        }
        None
    }
}

impl FuzzyTripMatcher for RouteDirectionTimeMatcher {
    fn match_trip(
        &self,
        update: &ParsedTripUpdate,
        service_date: NaiveDate,
    ) -> Result<TripAndPattern, UpdateError> {
        let reference = update.reference();
        let no_match = || UpdateError::new(reference.trip_id.clone(), UpdateErrorKind::NoFuzzyTripMatch);

        let Some(route_id) = &reference.route_id else {
            debug!("Cannot fuzzy match without route id");
            return Err(no_match());
        };
        if self.schedule.route(route_id).is_none() {
            debug!(route = %route_id, "Route not found");
            return Err(no_match());
        }
        let Some(start_time) = reference
            .start_time
            .as_deref()
            .and_then(|s| parse_service_time(s).ok())
        else {
            debug!("Cannot fuzzy match without start time");
            return Err(no_match());
        };

        let date = reference.start_date.unwrap_or(service_date);
        let found = self.find_trip(reference, start_time, date).or_else(|| {
            let previous = date.checked_sub_days(Days::new(1))?;
            self.find_trip(reference, start_time + SECONDS_PER_DAY, previous)
        });

        match found {
            Some(found) => {
                debug!(trip = %found.trip.id, pattern = %found.pattern.id(), "Fuzzy matched by route and start time");
                Ok(found)
            }
            None => {
                debug!(route = %route_id, start_time, %date, "No fuzzy match");
                Err(no_match())
            }
        }
    }
}
