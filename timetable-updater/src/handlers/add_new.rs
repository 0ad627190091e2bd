use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::context::UpdateContext;
use crate::domain::{Agency, FeedScopedId, RealTimeState, Route, TransitMode, Trip, TripOnServiceDate};
use crate::error::{UpdateError, UpdateErrorKind, UpdateWarning};
use crate::pattern_cache::PatternRequest;
use crate::resolve::ResolvedNewTrip;
use crate::snapshot::{AddedTrip, RealTimeTripUpdate};
use crate::update::{
    AddedTripUpdateState, RouteCreation, ScheduledDataInclusion, TripCreationInfo,
    TripUpdateOptions,
};

use super::AppliedUpdate;
use super::stop_times::{Baseline, Call, build_calls, complete_times};

/// Id of the agency given to routes created without one.
pub const FALLBACK_AGENCY_ID: &str = "autogenerated-gtfs-rt-added-route";

/// GTFS route type for bus.
const GTFS_BUS: i32 = 3;

/// A trip that is not in the schedule, or a further update to one added
/// earlier.
pub fn handle_add_new(
    resolved: ResolvedNewTrip<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<AppliedUpdate, UpdateError> {
    let update = resolved.update;
    let options = update.options();
    let creation = resolved.creation;
    let trip_id = &creation.trip_id;
    let date = resolved.service_date;

    let mut warnings = Vec::new();
    let mut calls: Vec<Call<'_, '_>> = resolved
        .stop_updates
        .iter()
        .filter_map(|u| {
            Some(Call {
                update: u,
                stop: u.stop_id()?,
                baseline_index: None,
            })
        })
        .collect();
    if calls.len() < resolved.stop_updates.len() {
        debug!(trip = %trip_id, dropped = resolved.stop_updates.len() - calls.len(), "Removed unknown stops from added trip");
        warnings.push(UpdateWarning::UnknownStopsRemovedFromAddedTrip);
    }

    let (trip, route_created, baseline) = match &resolved.existing {
        Some(previous) => {
            let pattern = &previous.added.pattern;
            let same_stops = pattern.num_stops() == calls.len()
                && calls.iter().enumerate().all(|(k, c)| pattern.stop(k) == c.stop);
            if same_stops {
                for (k, call) in calls.iter_mut().enumerate() {
                    call.baseline_index = Some(k);
                }
            }
            let baseline = same_stops.then_some(Baseline {
                pattern,
                times: &previous.scheduled_times,
            });
            (Arc::clone(&previous.added.trip), false, baseline)
        }
        None => {
            let (route, created) = resolve_route(creation, ctx, options)?;
            (Arc::new(build_trip(creation, route, date)), created, None)
        }
    };

    let mut built = build_calls(trip_id, &calls, baseline)?;
    built.builder.set_headsign(trip.headsign.clone());
    complete_times(&mut built.builder, options, built.first_updated);
    let state = match (&resolved.existing, options.added_trip_update_state) {
        (Some(_), AddedTripUpdateState::SetUpdated) => RealTimeState::Updated,
        _ => RealTimeState::Added,
    };
    built.builder.set_state(state);
    let times = built
        .builder
        .build()
        .map_err(|e| UpdateError::from_times(trip_id, e))?;

    let lookup = ctx.pattern_cache.get_or_create(
        ctx.schedule,
        PatternRequest {
            route: &trip.route,
            mode: trip.mode,
            direction: trip.direction,
            stop_pattern: built.stop_pattern,
            original: None,
        },
    );

    let scheduled_times = match options.scheduled_data_inclusion {
        ScheduledDataInclusion::Include => Some(times.scheduled_copy()),
        ScheduledDataInclusion::Exclude => None,
    };
    let dated_trip = match &resolved.existing {
        Some(previous) => previous.added.dated_trip.clone(),
        None => TripOnServiceDate {
            id: trip_id.with_suffix(&format!(":{date}")),
            trip: Arc::clone(&trip),
            service_date: date,
            replacement_for: creation.replaced_trips.clone(),
        },
    };
    debug!(trip = %trip_id, %date, pattern = %lookup.pattern.id(), %state, "Added trip");

    let added = AddedTrip {
        trip,
        pattern: Arc::clone(&lookup.pattern),
        dated_trip,
        scheduled_times,
        route_created,
    };
    let mut real_time_update = RealTimeTripUpdate::new(lookup.pattern, times, date)
        .with_added_trip(added)
        .with_producer(update.data_source());
    if resolved.existing.is_some() {
        real_time_update = real_time_update.with_revert_previous();
    }
    Ok(AppliedUpdate::new(real_time_update).with_warnings(warnings))
}

/// Find or create the route of an added trip. The flag is true if the
/// route must be registered with the trip.
fn resolve_route(
    creation: &TripCreationInfo,
    ctx: &UpdateContext<'_>,
    options: &TripUpdateOptions,
) -> Result<(Arc<Route>, bool), UpdateError> {
    if let Some(route_id) = &creation.route_id {
        if let Some(route) = ctx.schedule.route(route_id) {
            return Ok((Arc::clone(route), false));
        }
        if let Some(route) = ctx.buffer.added_route(route_id) {
            // Added routes are registered again so every snapshot carries them
            let reregister = options.route_creation == RouteCreation::FallbackAgency;
            return Ok((Arc::clone(route), reregister));
        }
    }

    let route_id = creation
        .route_id
        .clone()
        .unwrap_or_else(|| creation.trip_id.clone());
    let info = creation.route.as_ref();
    let known_agency = info
        .and_then(|i| i.agency_id.as_ref())
        .and_then(|id| ctx.schedule.agency(id))
        .cloned();

    let agency = match options.route_creation {
        RouteCreation::RequireAgency => known_agency
            .or_else(|| operator_agency(creation, ctx))
            .or_else(|| {
                creation
                    .replaced_route_id
                    .as_ref()
                    .and_then(|id| ctx.schedule.route(id))
                    .map(|r| Arc::clone(&r.agency))
            })
            .ok_or_else(|| {
                debug!(trip = %creation.trip_id, "No agency for added route");
                UpdateError::for_trip(&creation.trip_id, UpdateErrorKind::CannotResolveAgency)
            })?,
        RouteCreation::FallbackAgency => match known_agency {
            Some(agency) => agency,
            None => Arc::new(fallback_agency(ctx, &creation.trip_id)?),
        },
    };

    let mode = info
        .and_then(|i| i.mode)
        .or(creation.mode)
        .unwrap_or(TransitMode::Bus);
    let mut route = Route::new(route_id, agency, mode);
    route.operator_id = creation.operator_id.clone();
    route.submode = creation.submode.clone();
    match info {
        Some(info) => {
            route.long_name = info.name.clone();
            route.url = info.url.clone();
            route.gtfs_type = info.gtfs_type;
        }
        None => route.gtfs_type = Some(GTFS_BUS),
    }
    debug!(route = %route.id, agency = %route.agency.id, "Created route for added trip");
    Ok((Arc::new(route), true))
}

/// The agency of any scheduled route run by the trip's operator.
fn operator_agency(creation: &TripCreationInfo, ctx: &UpdateContext<'_>) -> Option<Arc<Agency>> {
    let operator = creation.operator_id.as_ref()?;
    ctx.schedule
        .routes()
        .find(|r| r.operator_id.as_ref() == Some(operator))
        .map(|r| Arc::clone(&r.agency))
}

fn fallback_agency(ctx: &UpdateContext<'_>, trip_id: &FeedScopedId) -> Result<Agency, UpdateError> {
    let id = FeedScopedId::new(trip_id.feed_id(), FALLBACK_AGENCY_ID)
        .map_err(|_| UpdateError::for_trip(trip_id, UpdateErrorKind::InvalidInputStructure))?;
    Ok(Agency {
        id,
        name: FALLBACK_AGENCY_ID.to_string(),
        timezone: ctx.schedule.time_zone().name().to_string(),
    })
}

fn build_trip(creation: &TripCreationInfo, route: Arc<Route>, date: NaiveDate) -> Trip {
    let service_id = creation
        .service_id
        .clone()
        .unwrap_or_else(|| creation.trip_id.with_suffix(&format!(":service:{date}")));
    let mut trip = Trip::new(creation.trip_id.clone(), route, service_id);
    trip.headsign = creation.headsign.clone();
    trip.short_name = creation.short_name.clone();
    if let Some(mode) = creation.mode {
        trip.mode = mode;
    }
    trip.submode = creation.submode.clone();
    trip
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PatternOrigin;
    use crate::pattern_cache::PatternCache;
    use crate::resolve::resolve_new_trip;
    use crate::snapshot::TimetableBuffer;
    use crate::test_support::{Network, at, date, hms, id, times_at};
    use crate::update::{
        ParsedStopTimeUpdate, ParsedTripUpdate, RouteCreationInfo, TripReference, UpdateType,
    };

    struct Fixture {
        network: Network,
        buffer: TimetableBuffer,
        cache: PatternCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                network: Network::abc(),
                buffer: TimetableBuffer::new(),
                cache: PatternCache::default(),
            }
        }

        fn handle(&self, u: &ParsedTripUpdate) -> Result<AppliedUpdate, UpdateError> {
            let ctx = UpdateContext {
                schedule: &self.network.schedule,
                buffer: &self.buffer,
                fuzzy_matcher: None,
                pattern_cache: &self.cache,
            };
            let resolved = resolve_new_trip(u, &ctx)?;
            handle_add_new(resolved, &ctx)
        }

        fn apply(&mut self, u: &ParsedTripUpdate) -> AppliedUpdate {
            let applied = self.handle(u).unwrap();
            self.buffer.apply(applied.update.clone()).unwrap();
            applied
        }
    }

    fn new_trip(
        creation: TripCreationInfo,
        options: TripUpdateOptions,
        stops: Vec<ParsedStopTimeUpdate>,
    ) -> ParsedTripUpdate {
        ParsedTripUpdate::builder(UpdateType::AddNewTrip, TripReference::by_trip_id(creation.trip_id.clone()))
            .service_date(date())
            .trip_creation(creation)
            .stop_time_updates(stops)
            .options(options)
            .data_source("test")
            .build()
    }

    fn stops() -> Vec<ParsedStopTimeUpdate> {
        vec![
            times_at("A", hms(15, 0, 0), hms(15, 0, 0)),
            times_at("C", hms(15, 20, 0), hms(15, 21, 0)),
            times_at("E", hms(15, 40, 0), hms(15, 40, 0)),
        ]
    }

    #[test]
    fn fallback_route_and_agency() {
        let f = Fixture::new();
        let applied = f
            .handle(&new_trip(TripCreationInfo::new(id("N1")), TripUpdateOptions::default(), stops()))
            .unwrap();
        let added = applied.update.added_trip().unwrap();
        let route = added.route();
        assert_eq!(route.id, id("N1"));
        assert_eq!(route.mode, TransitMode::Bus);
        assert_eq!(route.gtfs_type, Some(3));
        assert_eq!(route.agency.id, id(FALLBACK_AGENCY_ID));
        assert!(added.route_created);
        assert!(added.scheduled_times.is_none());
        assert_eq!(added.dated_trip.service_date, date());

        let times = applied.update.trip_times();
        assert_eq!(times.state(), RealTimeState::Added);
        assert_eq!(times.arrival(1), hms(15, 20, 0));
        assert_eq!(applied.update.pattern().origin(), PatternOrigin::Added);
        assert_eq!(applied.update.pattern().stop_pattern().entry(0).dropoff, crate::domain::PickDrop::None);
        assert!(!applied.update.revert_previous());
    }

    #[test]
    fn existing_route_is_reused() {
        let f = Fixture::new();
        let creation = TripCreationInfo {
            route_id: Some(id("R1")),
            ..TripCreationInfo::new(id("N1"))
        };
        let applied = f
            .handle(&new_trip(creation, TripUpdateOptions::default(), stops()))
            .unwrap();
        let added = applied.update.added_trip().unwrap();
        assert_eq!(added.route().id, id("R1"));
        assert!(!added.route_created);
    }

    #[test]
    fn route_from_creation_info() {
        let f = Fixture::new();
        let creation = TripCreationInfo {
            route_id: Some(id("NR")),
            route: Some(RouteCreationInfo {
                name: Some("Night line".to_string()),
                mode: Some(TransitMode::Tram),
                gtfs_type: Some(0),
                agency_id: Some(id("AG1")),
                url: None,
            }),
            ..TripCreationInfo::new(id("N1"))
        };
        let applied = f
            .handle(&new_trip(creation, TripUpdateOptions::default(), stops()))
            .unwrap();
        let route = applied.update.added_trip().unwrap().route();
        assert_eq!(route.mode, TransitMode::Tram);
        assert_eq!(route.long_name.as_deref(), Some("Night line"));
        assert_eq!(route.agency.id, id("AG1"));
    }

    #[test]
    fn required_agency() {
        let f = Fixture::new();
        let siri = TripUpdateOptions::siri();
        let err = f
            .handle(&new_trip(TripCreationInfo::new(id("N1")), siri, stops()))
            .unwrap_err();
        assert_eq!(err.kind(), UpdateErrorKind::CannotResolveAgency);

        let by_operator = TripCreationInfo {
            operator_id: Some(id("OP1")),
            ..TripCreationInfo::new(id("N1"))
        };
        let applied = f.handle(&new_trip(by_operator, siri, stops())).unwrap();
        let added = applied.update.added_trip().unwrap();
        assert_eq!(added.route().agency.id, id("AG1"));
        assert!(added.scheduled_times.is_some());

        let by_replaced_route = TripCreationInfo {
            replaced_route_id: Some(id("R2")),
            replaced_trips: vec![id("DT1")],
            ..TripCreationInfo::new(id("N2"))
        };
        let applied = f.handle(&new_trip(by_replaced_route, siri, stops())).unwrap();
        let added = applied.update.added_trip().unwrap();
        assert_eq!(added.route().agency.id, id("AG1"));
        assert_eq!(added.dated_trip.replacement_for, vec![id("DT1")]);
    }

    #[test]
    fn unknown_stops_are_dropped_with_warning() {
        let f = Fixture::new();
        let mut with_unknown = stops();
        with_unknown.insert(1, at("NOPE"));
        let applied = f
            .handle(&new_trip(TripCreationInfo::new(id("N1")), TripUpdateOptions::default(), with_unknown))
            .unwrap();
        assert_eq!(applied.warnings, vec![UpdateWarning::UnknownStopsRemovedFromAddedTrip]);
        assert_eq!(applied.update.pattern().num_stops(), 3);
    }

    #[test]
    fn updating_an_added_trip() {
        let mut f = Fixture::new();
        let creation = TripCreationInfo::new(id("N1"));
        let first = f.apply(&new_trip(creation.clone(), TripUpdateOptions::default(), stops()));

        let mut later = stops();
        later[2] = times_at("E", hms(15, 45, 0), hms(15, 45, 0));
        let second = f.apply(&new_trip(creation.clone(), TripUpdateOptions::default(), later.clone()));
        assert!(Arc::ptr_eq(first.update.pattern(), second.update.pattern()));
        assert!(second.update.revert_previous());
        assert!(!second.update.added_trip().unwrap().route_created);
        // Retained as added under the GTFS-RT policy
        assert_eq!(second.update.trip_times().state(), RealTimeState::Added);
        assert_eq!(second.update.trip_times().arrival(2), hms(15, 45, 0));

        let siri = new_trip(creation, TripUpdateOptions::siri(), later);
        let third = f.handle(&siri).unwrap();
        assert_eq!(third.update.trip_times().state(), RealTimeState::Updated);
    }

    #[test]
    fn scheduled_trip_id_is_rejected() {
        let f = Fixture::new();
        let err = f
            .handle(&new_trip(TripCreationInfo::new(id("T1")), TripUpdateOptions::default(), stops()))
            .unwrap_err();
        assert_eq!(err.kind(), UpdateErrorKind::TripAlreadyExists);
    }
}
