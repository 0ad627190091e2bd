//! The protocol-neutral update model.
//!
//! Parsers for the wire protocols produce a [`ParsedTripUpdate`] per
//! message. Everything downstream works only with these types.

mod options;
mod reference;
mod stop_update;
mod time_update;
mod trip_update;

pub use options::{
    AddedTripUpdateState, BackwardsDelayPropagation, FirstLastStopTimeAdjustment,
    ForwardsDelayPropagation, Preset, RouteCreation, ScheduledDataInclusion,
    StopCancellationTracking, StopReplacementConstraint, StopUpdateStrategy, TripUpdateOptions,
    UnknownStopBehavior,
};
pub use reference::{FuzzyMatchingHint, StopReference, StopResolutionStrategy, TripReference};
pub use stop_update::{ParsedStopTimeUpdate, StopSequence, StopUpdateStatus};
pub use time_update::{DeferredTimeUpdate, ParsedTimeUpdate, TimeUpdate};
pub use trip_update::{
    ParsedTripUpdate, ParsedTripUpdateBuilder, RouteCreationInfo, StopPatternModification,
    TripCreationInfo, UpdateType,
};
