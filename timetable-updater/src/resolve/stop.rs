use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::domain::{FeedScopedId, Stop};
use crate::schedule::StaticSchedule;
use crate::update::{ParsedStopTimeUpdate, StopReference, StopResolutionStrategy, TimeUpdate};

/// Look up the stop a reference names.
///
/// An assigned stop is looked up directly. Otherwise the stop id is looked
/// up directly, or first as a scheduled stop point when the reference asks
/// for that.
pub fn resolve_stop<'a>(reference: &StopReference, schedule: &'a StaticSchedule) -> Option<&'a Stop> {
    if let Some(assigned) = &reference.assigned_stop_id {
        return schedule.stop(assigned);
    }
    let stop_id = reference.stop_id.as_ref()?;
    match reference.resolution {
        StopResolutionStrategy::Direct => schedule.stop(stop_id),
        StopResolutionStrategy::ScheduledStopPointFirst => schedule
            .stop_for_scheduled_stop_point(stop_id)
            .or_else(|| schedule.stop(stop_id)),
    }
}

/// A stop update with its stop looked up and its times in seconds since
/// start of service.
#[derive(Debug, Clone)]
pub struct ResolvedStopTimeUpdate<'u> {
    pub parsed: &'u ParsedStopTimeUpdate,
    /// `None` if the stop is unknown.
    pub stop: Option<Stop>,
    pub arrival: Option<TimeUpdate>,
    pub departure: Option<TimeUpdate>,
}

impl<'u> ResolvedStopTimeUpdate<'u> {
    pub fn resolve(
        parsed: &'u ParsedStopTimeUpdate,
        schedule: &StaticSchedule,
        service_date: NaiveDate,
        tz: Tz,
    ) -> Self {
        Self {
            parsed,
            stop: resolve_stop(&parsed.stop, schedule).cloned(),
            arrival: parsed.arrival.map(|t| t.resolve(service_date, tz)),
            departure: parsed.departure.map(|t| t.resolve(service_date, tz)),
        }
    }

    pub fn resolve_all(
        parsed: &'u [ParsedStopTimeUpdate],
        schedule: &StaticSchedule,
        service_date: NaiveDate,
        tz: Tz,
    ) -> Vec<Self> {
        parsed
            .iter()
            .map(|p| Self::resolve(p, schedule, service_date, tz))
            .collect()
    }

    pub fn stop_id(&self) -> Option<&FeedScopedId> {
        self.stop.as_ref().map(|s| &s.id)
    }

    pub fn is_skipped(&self) -> bool {
        self.parsed.is_skipped()
    }

    /// Planned arrival given by the producer, if any.
    pub fn aimed_arrival(&self) -> Option<i32> {
        self.arrival.and_then(|t| t.scheduled_time)
    }

    /// Planned departure given by the producer, if any.
    pub fn aimed_departure(&self) -> Option<i32> {
        self.departure.and_then(|t| t.scheduled_time)
    }
}
