//! The canonical parsed trip update.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{FeedScopedId, TransitMode};

use super::{ParsedStopTimeUpdate, TripReference, TripUpdateOptions};

/// What an update does to its trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    /// New times for a scheduled trip.
    UpdateExisting,
    CancelTrip,
    DeleteTrip,
    /// A trip not in the schedule.
    AddNewTrip,
    /// A scheduled trip with a different stop pattern.
    ModifyTrip,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateType::UpdateExisting => "UPDATE_EXISTING",
            UpdateType::CancelTrip => "CANCEL_TRIP",
            UpdateType::DeleteTrip => "DELETE_TRIP",
            UpdateType::AddNewTrip => "ADD_NEW_TRIP",
            UpdateType::ModifyTrip => "MODIFY_TRIP",
        };
        f.write_str(s)
    }
}

/// Route metadata for a route created along with an added trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteCreationInfo {
    pub name: Option<String>,
    pub mode: Option<TransitMode>,
    pub gtfs_type: Option<i32>,
    pub agency_id: Option<FeedScopedId>,
    pub url: Option<String>,
}

/// Everything needed to create a trip that is not in the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripCreationInfo {
    pub trip_id: FeedScopedId,
    #[serde(default)]
    pub route_id: Option<FeedScopedId>,
    #[serde(default)]
    pub route: Option<RouteCreationInfo>,
    #[serde(default)]
    pub service_id: Option<FeedScopedId>,
    #[serde(default)]
    pub headsign: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub mode: Option<TransitMode>,
    #[serde(default)]
    pub submode: Option<String>,
    #[serde(default)]
    pub operator_id: Option<FeedScopedId>,
    /// Dated trips this one replaces.
    #[serde(default)]
    pub replaced_trips: Vec<FeedScopedId>,
    #[serde(default)]
    pub replaced_route_id: Option<FeedScopedId>,
}

impl TripCreationInfo {
    pub fn new(trip_id: FeedScopedId) -> Self {
        Self {
            trip_id,
            route_id: None,
            route: None,
            service_id: None,
            headsign: None,
            short_name: None,
            mode: None,
            submode: None,
            operator_id: None,
            replaced_trips: Vec::new(),
            replaced_route_id: None,
        }
    }
}

/// Changes to a trip's stop pattern described apart from the stop updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopPatternModification {
    /// Positions in the scheduled pattern the trip will not serve.
    pub skipped_stop_indices: BTreeSet<usize>,
}

/// One inbound update, as produced by a protocol parser.
///
/// The service date may be missing when it can be inferred from a dated
/// trip or from the aimed departure time; that inference happens during
/// resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTripUpdate {
    update_type: UpdateType,
    reference: TripReference,
    #[serde(default)]
    service_date: Option<NaiveDate>,
    #[serde(default)]
    aimed_departure_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    stop_time_updates: Vec<ParsedStopTimeUpdate>,
    #[serde(default)]
    trip_creation: Option<TripCreationInfo>,
    #[serde(default)]
    stop_pattern_modification: Option<StopPatternModification>,
    #[serde(default)]
    options: TripUpdateOptions,
    #[serde(default)]
    data_source: Option<String>,
}

impl ParsedTripUpdate {
    /// Start building an update.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use timetable_updater::domain::FeedScopedId;
    /// use timetable_updater::update::{ParsedTripUpdate, TripReference, UpdateType};
    ///
    /// let trip = FeedScopedId::new("F", "T1").unwrap();
    /// let update = ParsedTripUpdate::builder(UpdateType::CancelTrip, TripReference::by_trip_id(trip))
    ///     .service_date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    ///     .data_source("feed-a")
    ///     .build();
    /// assert_eq!(update.update_type(), UpdateType::CancelTrip);
    /// assert_eq!(update.data_source(), Some("feed-a"));
    /// ```
    pub fn builder(update_type: UpdateType, reference: TripReference) -> ParsedTripUpdateBuilder {
        ParsedTripUpdateBuilder {
            update: ParsedTripUpdate {
                update_type,
                reference,
                service_date: None,
                aimed_departure_time: None,
                stop_time_updates: Vec::new(),
                trip_creation: None,
                stop_pattern_modification: None,
                options: TripUpdateOptions::default(),
                data_source: None,
            },
        }
    }

    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    pub fn reference(&self) -> &TripReference {
        &self.reference
    }

    pub fn service_date(&self) -> Option<NaiveDate> {
        self.service_date
    }

    /// Aimed departure from the first stop: the explicit value, else the
    /// first stop update's aimed departure.
    pub fn aimed_departure_time(&self) -> Option<DateTime<FixedOffset>> {
        self.aimed_departure_time.or_else(|| {
            self.stop_time_updates
                .first()
                .and_then(|u| u.departure.as_ref())
                .and_then(|d| d.aimed_instant())
        })
    }

    pub fn stop_time_updates(&self) -> &[ParsedStopTimeUpdate] {
        &self.stop_time_updates
    }

    /// Creation details; only meaningful for [`UpdateType::AddNewTrip`].
    pub fn trip_creation(&self) -> Option<&TripCreationInfo> {
        match self.update_type {
            UpdateType::AddNewTrip => self.trip_creation.as_ref(),
            _ => None,
        }
    }

    pub fn stop_pattern_modification(&self) -> Option<&StopPatternModification> {
        self.stop_pattern_modification.as_ref()
    }

    pub fn options(&self) -> &TripUpdateOptions {
        &self.options
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    /// The trip id this update is about, for error reporting.
    pub fn trip_id(&self) -> Option<&FeedScopedId> {
        self.reference
            .trip_id
            .as_ref()
            .or_else(|| self.trip_creation().map(|c| &c.trip_id))
            .or(self.reference.trip_on_service_date_id.as_ref())
    }

    /// The same update processed with different options.
    pub fn with_options(self, options: TripUpdateOptions) -> Self {
        Self { options, ..self }
    }

    /// True if any stop update is flagged as an extra call.
    pub fn has_extra_calls(&self) -> bool {
        self.stop_time_updates.iter().any(|u| u.extra_call)
    }
}

/// Builder for [`ParsedTripUpdate`].
#[derive(Debug, Clone)]
pub struct ParsedTripUpdateBuilder {
    update: ParsedTripUpdate,
}

impl ParsedTripUpdateBuilder {
    pub fn service_date(mut self, date: NaiveDate) -> Self {
        self.update.service_date = Some(date);
        self
    }

    pub fn aimed_departure_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.update.aimed_departure_time = Some(time);
        self
    }

    pub fn stop_time_updates(mut self, updates: Vec<ParsedStopTimeUpdate>) -> Self {
        self.update.stop_time_updates = updates;
        self
    }

    pub fn stop_time_update(mut self, update: ParsedStopTimeUpdate) -> Self {
        self.update.stop_time_updates.push(update);
        self
    }

    pub fn trip_creation(mut self, info: TripCreationInfo) -> Self {
        self.update.trip_creation = Some(info);
        self
    }

    pub fn stop_pattern_modification(mut self, modification: StopPatternModification) -> Self {
        self.update.stop_pattern_modification = Some(modification);
        self
    }

    pub fn options(mut self, options: TripUpdateOptions) -> Self {
        self.update.options = options;
        self
    }

    pub fn data_source(mut self, source: impl Into<String>) -> Self {
        self.update.data_source = Some(source.into());
        self
    }

    pub fn build(self) -> ParsedTripUpdate {
        self.update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::{DeferredTimeUpdate, ParsedTimeUpdate, StopReference};

    fn id(s: &str) -> FeedScopedId {
        FeedScopedId::new("F", s).unwrap()
    }

    #[test]
    fn creation_info_only_for_added_trips() {
        let info = TripCreationInfo::new(id("NEW"));
        let added = ParsedTripUpdate::builder(UpdateType::AddNewTrip, TripReference::default())
            .trip_creation(info.clone())
            .build();
        assert_eq!(added.trip_creation(), Some(&info));
        assert_eq!(added.trip_id(), Some(&id("NEW")));

        let cancel = ParsedTripUpdate::builder(UpdateType::CancelTrip, TripReference::default())
            .trip_creation(info)
            .build();
        assert_eq!(cancel.trip_creation(), None);
        assert_eq!(cancel.trip_id(), None);
    }

    #[test]
    fn trip_id_prefers_reference() {
        let mut reference = TripReference::by_trip_id(id("T1"));
        reference.trip_on_service_date_id = Some(id("DT1"));
        let update = ParsedTripUpdate::builder(UpdateType::UpdateExisting, reference).build();
        assert_eq!(update.trip_id(), Some(&id("T1")));
    }

    #[test]
    fn aimed_departure_falls_back_to_first_stop() {
        let aimed = DateTime::parse_from_rfc3339("2024-03-15T10:00:00+01:00").unwrap();
        let mut first = ParsedStopTimeUpdate::for_stop(StopReference::of_stop(id("A")));
        first.departure = Some(ParsedTimeUpdate::Deferred(DeferredTimeUpdate {
            actual: None,
            aimed: Some(aimed),
        }));
        let update = ParsedTripUpdate::builder(UpdateType::UpdateExisting, TripReference::default())
            .stop_time_update(first)
            .build();
        assert_eq!(update.aimed_departure_time(), Some(aimed));
    }

    #[test]
    fn extra_calls() {
        let mut extra = ParsedStopTimeUpdate::for_stop(StopReference::of_stop(id("D")));
        extra.extra_call = true;
        let update = ParsedTripUpdate::builder(UpdateType::ModifyTrip, TripReference::default())
            .stop_time_updates(vec![ParsedStopTimeUpdate::default(), extra])
            .build();
        assert!(update.has_extra_calls());
    }

    #[test]
    fn deserialize_minimal_update() {
        let update: ParsedTripUpdate = serde_json::from_str(
            r#"{
                "updateType": "CANCEL_TRIP",
                "reference": { "tripId": "F:T1" },
                "serviceDate": "2024-03-15"
            }"#,
        )
        .unwrap();
        assert_eq!(update.update_type(), UpdateType::CancelTrip);
        assert_eq!(update.options(), &TripUpdateOptions::default());
        assert!(update.stop_time_updates().is_empty());
        assert_eq!(UpdateType::CancelTrip.to_string(), "CANCEL_TRIP");
    }
}
