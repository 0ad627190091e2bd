//! Updater configuration.
//!
//! Loaded from a JSON file. Every field has a default, so an empty object is
//! a valid configuration.

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::pattern_cache::PatternCacheConfig;
use crate::snapshot::SnapshotConfig;
use crate::update::{
    AddedTripUpdateState, BackwardsDelayPropagation, FirstLastStopTimeAdjustment,
    ForwardsDelayPropagation, Preset, RouteCreation, ScheduledDataInclusion,
    StopCancellationTracking, StopReplacementConstraint, StopUpdateStrategy, TripUpdateOptions,
    UnknownStopBehavior,
};

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-knob overrides applied on top of a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripUpdateOptionsOverrides {
    pub forwards_propagation: Option<ForwardsDelayPropagation>,
    pub backwards_propagation: Option<BackwardsDelayPropagation>,
    pub allow_stop_pattern_modification: Option<bool>,
    pub stop_replacement_constraint: Option<StopReplacementConstraint>,
    pub stop_update_strategy: Option<StopUpdateStrategy>,
    pub stop_cancellation_tracking: Option<StopCancellationTracking>,
    pub first_last_stop_time_adjustment: Option<FirstLastStopTimeAdjustment>,
    pub unknown_stop_behavior: Option<UnknownStopBehavior>,
    pub scheduled_data_inclusion: Option<ScheduledDataInclusion>,
    pub added_trip_update_state: Option<AddedTripUpdateState>,
    pub route_creation: Option<RouteCreation>,
}

impl TripUpdateOptionsOverrides {
    /// Replace each knob of `base` that has an override.
    pub fn apply(&self, base: TripUpdateOptions) -> TripUpdateOptions {
        TripUpdateOptions {
            forwards_propagation: self.forwards_propagation.unwrap_or(base.forwards_propagation),
            backwards_propagation: self
                .backwards_propagation
                .unwrap_or(base.backwards_propagation),
            allow_stop_pattern_modification: self
                .allow_stop_pattern_modification
                .unwrap_or(base.allow_stop_pattern_modification),
            stop_replacement_constraint: self
                .stop_replacement_constraint
                .unwrap_or(base.stop_replacement_constraint),
            stop_update_strategy: self.stop_update_strategy.unwrap_or(base.stop_update_strategy),
            stop_cancellation_tracking: self
                .stop_cancellation_tracking
                .unwrap_or(base.stop_cancellation_tracking),
            first_last_stop_time_adjustment: self
                .first_last_stop_time_adjustment
                .unwrap_or(base.first_last_stop_time_adjustment),
            unknown_stop_behavior: self.unknown_stop_behavior.unwrap_or(base.unknown_stop_behavior),
            scheduled_data_inclusion: self
                .scheduled_data_inclusion
                .unwrap_or(base.scheduled_data_inclusion),
            added_trip_update_state: self
                .added_trip_update_state
                .unwrap_or(base.added_trip_update_state),
            route_creation: self.route_creation.unwrap_or(base.route_creation),
        }
    }
}

/// Configuration for the updater binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdaterConfig {
    /// Feed the updates belong to. Must match the schedule's feed.
    pub feed_id: String,

    /// Time zone used to interpret wall-clock times.
    pub time_zone: Tz,

    /// Protocol preset the options start from.
    pub preset: Preset,

    /// Knobs that differ from the preset.
    pub overrides: TripUpdateOptionsOverrides,

    /// Drop service dates before yesterday on purge.
    pub purge_expired_data: bool,

    /// Minimum time between two unforced commits (milliseconds).
    pub max_snapshot_frequency_ms: u64,

    /// How often the background task purges and commits (milliseconds).
    pub commit_interval_ms: u64,

    /// Number of real-time patterns to reserve room for.
    pub pattern_cache_initial_capacity: usize,
}

impl UpdaterConfig {
    /// Create a configuration for a feed with default settings.
    pub fn new(feed_id: impl Into<String>, time_zone: Tz, preset: Preset) -> Self {
        Self {
            feed_id: feed_id.into(),
            time_zone,
            preset,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// The preset with all overrides applied.
    pub fn trip_update_options(&self) -> TripUpdateOptions {
        self.overrides.apply(TripUpdateOptions::preset(self.preset))
    }

    pub fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            purge_expired_data: self.purge_expired_data,
            max_snapshot_frequency: Duration::from_millis(self.max_snapshot_frequency_ms),
        }
    }

    pub fn pattern_cache_config(&self) -> PatternCacheConfig {
        PatternCacheConfig {
            initial_capacity: self.pattern_cache_initial_capacity,
        }
    }

    /// Returns the commit interval as a Duration.
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed_id: "F".to_string(),
            time_zone: Tz::UTC,
            preset: Preset::GtfsRt,
            overrides: TripUpdateOptionsOverrides::default(),
            purge_expired_data: true,
            max_snapshot_frequency_ms: 1_000,
            commit_interval_ms: 10_000,
            pattern_cache_initial_capacity: 1_024,
        }
    }
}
