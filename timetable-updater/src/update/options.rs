//! Processing options for trip updates.
//!
//! The two wire protocols disagree on almost every policy decision, so each
//! decision is a separate knob and each protocol is a preset.

use serde::{Deserialize, Serialize};

/// Whether delays are carried forward to stops without updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardsDelayPropagation {
    #[default]
    None,
    /// Carry the last known delay to later stops.
    Default,
}

/// How stops before the first update are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackwardsDelayPropagation {
    #[default]
    None,
    /// Adjust earlier stops only where needed to keep times ordered, and
    /// mark them as having no data.
    RequiredNoData,
    /// Adjust earlier stops only where needed to keep times ordered.
    Required,
    /// Apply the first delay to every earlier stop.
    Always,
}

/// Which stop may replace a scheduled one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReplacementConstraint {
    AnyStop,
    SameParentStation,
    NotAllowed,
}

/// How stop updates are matched to pattern stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopUpdateStrategy {
    /// One update per pattern stop, matched by position.
    Full,
    /// Any subset of stops, matched by sequence or stop identity.
    Partial,
}

/// Which state an updated trip gets when stops are cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopCancellationTracking {
    /// MODIFIED if the stop pattern changed, UPDATED otherwise.
    MarkModifiedOnPatternChange,
    /// Always UPDATED; the pattern change is recorded but not the state.
    AlwaysUpdated,
}

/// Whether first-stop arrival and last-stop departure are aligned with the
/// other time at that stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstLastStopTimeAdjustment {
    Adjust,
    Preserve,
}

/// What to do with stops missing from the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownStopBehavior {
    Fail,
    /// Drop the stop and report a warning.
    Ignore,
}

/// Whether an added trip's times also form a scheduled baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduledDataInclusion {
    Include,
    Exclude,
}

/// State of an added trip after a further update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddedTripUpdateState {
    RetainAdded,
    SetUpdated,
}

/// How a route is found or created for an added trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteCreation {
    /// A new route needs an agency found through its operator or the
    /// replaced route.
    RequireAgency,
    /// A new route falls back to a synthetic agency.
    FallbackAgency,
}

/// A named protocol preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    Siri,
    GtfsRt,
}

/// Options controlling how updates are interpreted.
///
/// # Examples
///
/// ```
/// use timetable_updater::update::{Preset, StopUpdateStrategy, TripUpdateOptions};
///
/// let siri = TripUpdateOptions::preset(Preset::Siri);
/// assert_eq!(siri.stop_update_strategy, StopUpdateStrategy::Full);
///
/// // Any knob can be overridden
/// let custom = TripUpdateOptions {
///     stop_update_strategy: StopUpdateStrategy::Partial,
///     ..siri
/// };
/// assert_eq!(custom.stop_update_strategy, StopUpdateStrategy::Partial);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripUpdateOptions {
    pub forwards_propagation: ForwardsDelayPropagation,
    pub backwards_propagation: BackwardsDelayPropagation,
    pub allow_stop_pattern_modification: bool,
    pub stop_replacement_constraint: StopReplacementConstraint,
    pub stop_update_strategy: StopUpdateStrategy,
    pub stop_cancellation_tracking: StopCancellationTracking,
    pub first_last_stop_time_adjustment: FirstLastStopTimeAdjustment,
    pub unknown_stop_behavior: UnknownStopBehavior,
    pub scheduled_data_inclusion: ScheduledDataInclusion,
    pub added_trip_update_state: AddedTripUpdateState,
    pub route_creation: RouteCreation,
}

impl TripUpdateOptions {
    /// Options for SIRI estimated timetables.
    pub const fn siri() -> Self {
        Self {
            forwards_propagation: ForwardsDelayPropagation::None,
            backwards_propagation: BackwardsDelayPropagation::None,
            allow_stop_pattern_modification: true,
            stop_replacement_constraint: StopReplacementConstraint::SameParentStation,
            stop_update_strategy: StopUpdateStrategy::Full,
            stop_cancellation_tracking: StopCancellationTracking::MarkModifiedOnPatternChange,
            first_last_stop_time_adjustment: FirstLastStopTimeAdjustment::Adjust,
            unknown_stop_behavior: UnknownStopBehavior::Fail,
            scheduled_data_inclusion: ScheduledDataInclusion::Include,
            added_trip_update_state: AddedTripUpdateState::SetUpdated,
            route_creation: RouteCreation::RequireAgency,
        }
    }

    /// Options for GTFS-RT trip updates with the given delay propagation.
    pub const fn gtfs_rt(
        forwards: ForwardsDelayPropagation,
        backwards: BackwardsDelayPropagation,
    ) -> Self {
        Self {
            forwards_propagation: forwards,
            backwards_propagation: backwards,
            allow_stop_pattern_modification: true,
            stop_replacement_constraint: StopReplacementConstraint::AnyStop,
            stop_update_strategy: StopUpdateStrategy::Partial,
            stop_cancellation_tracking: StopCancellationTracking::AlwaysUpdated,
            first_last_stop_time_adjustment: FirstLastStopTimeAdjustment::Preserve,
            unknown_stop_behavior: UnknownStopBehavior::Ignore,
            scheduled_data_inclusion: ScheduledDataInclusion::Exclude,
            added_trip_update_state: AddedTripUpdateState::RetainAdded,
            route_creation: RouteCreation::FallbackAgency,
        }
    }

    pub const fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Siri => Self::siri(),
            Preset::GtfsRt => Self::gtfs_rt(
                ForwardsDelayPropagation::None,
                BackwardsDelayPropagation::None,
            ),
        }
    }

    /// True if either propagation direction is enabled.
    pub fn propagates_delays(&self) -> bool {
        self.forwards_propagation != ForwardsDelayPropagation::None
            || self.backwards_propagation != BackwardsDelayPropagation::None
    }
}

impl Default for TripUpdateOptions {
    fn default() -> Self {
        Self::preset(Preset::GtfsRt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siri_preset() {
        let o = TripUpdateOptions::siri();
        assert_eq!(o.forwards_propagation, ForwardsDelayPropagation::None);
        assert_eq!(o.backwards_propagation, BackwardsDelayPropagation::None);
        assert!(o.allow_stop_pattern_modification);
        assert_eq!(o.stop_replacement_constraint, StopReplacementConstraint::SameParentStation);
        assert_eq!(o.stop_update_strategy, StopUpdateStrategy::Full);
        assert_eq!(
            o.stop_cancellation_tracking,
            StopCancellationTracking::MarkModifiedOnPatternChange
        );
        assert_eq!(o.first_last_stop_time_adjustment, FirstLastStopTimeAdjustment::Adjust);
        assert_eq!(o.unknown_stop_behavior, UnknownStopBehavior::Fail);
        assert_eq!(o.scheduled_data_inclusion, ScheduledDataInclusion::Include);
        assert_eq!(o.added_trip_update_state, AddedTripUpdateState::SetUpdated);
        assert_eq!(o.route_creation, RouteCreation::RequireAgency);
        assert!(!o.propagates_delays());
    }

    #[test]
    fn gtfs_rt_preset() {
        let o = TripUpdateOptions::gtfs_rt(
            ForwardsDelayPropagation::Default,
            BackwardsDelayPropagation::RequiredNoData,
        );
        assert_eq!(o.forwards_propagation, ForwardsDelayPropagation::Default);
        assert_eq!(o.backwards_propagation, BackwardsDelayPropagation::RequiredNoData);
        assert!(o.allow_stop_pattern_modification);
        assert_eq!(o.stop_replacement_constraint, StopReplacementConstraint::AnyStop);
        assert_eq!(o.stop_update_strategy, StopUpdateStrategy::Partial);
        assert_eq!(o.stop_cancellation_tracking, StopCancellationTracking::AlwaysUpdated);
        assert_eq!(o.first_last_stop_time_adjustment, FirstLastStopTimeAdjustment::Preserve);
        assert_eq!(o.unknown_stop_behavior, UnknownStopBehavior::Ignore);
        assert_eq!(o.scheduled_data_inclusion, ScheduledDataInclusion::Exclude);
        assert_eq!(o.added_trip_update_state, AddedTripUpdateState::RetainAdded);
        assert_eq!(o.route_creation, RouteCreation::FallbackAgency);
        assert!(o.propagates_delays());
    }

    #[test]
    fn default_is_gtfs_rt_without_propagation() {
        let o = TripUpdateOptions::default();
        assert_eq!(o, TripUpdateOptions::preset(Preset::GtfsRt));
        assert!(!o.propagates_delays());
    }

    #[test]
    fn deserialize_overrides_on_default() {
        let o: TripUpdateOptions = serde_json::from_str(
            r#"{ "forwardsPropagation": "default", "stopUpdateStrategy": "full" }"#,
        )
        .unwrap();
        assert_eq!(o.forwards_propagation, ForwardsDelayPropagation::Default);
        assert_eq!(o.stop_update_strategy, StopUpdateStrategy::Full);
        assert_eq!(o.unknown_stop_behavior, UnknownStopBehavior::Ignore);
    }
}
