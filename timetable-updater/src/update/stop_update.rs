//! Per-stop updates.

use serde::{Deserialize, Serialize};

use crate::domain::{OccupancyStatus, PickDrop};

use super::{ParsedTimeUpdate, StopReference};

/// What the producer says about a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopUpdateStatus {
    #[default]
    Scheduled,
    Skipped,
    Cancelled,
    /// No real-time data for this stop.
    NoData,
    /// Stop added to the trip.
    Added,
}

/// Explicit position of a stop update within the trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopSequence {
    /// Zero-based index into the trip's stop pattern.
    Position(usize),
    /// Which visit to the stop this is, starting at 1. Disambiguates loops.
    VisitNumber(u32),
}

/// An update for one stop of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedStopTimeUpdate {
    pub stop: StopReference,
    pub sequence: Option<StopSequence>,
    pub status: StopUpdateStatus,
    pub arrival: Option<ParsedTimeUpdate>,
    pub departure: Option<ParsedTimeUpdate>,
    pub pickup: Option<PickDrop>,
    pub dropoff: Option<PickDrop>,
    pub headsign: Option<String>,
    pub occupancy: Option<OccupancyStatus>,
    /// Stop not present in the original schedule of the trip.
    pub extra_call: bool,
    pub prediction_inaccurate: bool,
    /// Times are observed rather than predicted.
    pub recorded: bool,
}

impl ParsedStopTimeUpdate {
    /// An update for a stop, with everything else unset.
    pub fn for_stop(stop: StopReference) -> Self {
        Self {
            stop,
            ..Self::default()
        }
    }

    /// True if the vehicle will not serve the stop.
    pub fn is_skipped(&self) -> bool {
        matches!(
            self.status,
            StopUpdateStatus::Skipped | StopUpdateStatus::Cancelled
        )
    }

    /// The zero-based position, if one was given.
    pub fn position(&self) -> Option<usize> {
        match self.sequence {
            Some(StopSequence::Position(p)) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_statuses() {
        let mut update = ParsedStopTimeUpdate::default();
        assert!(!update.is_skipped());
        update.status = StopUpdateStatus::Skipped;
        assert!(update.is_skipped());
        update.status = StopUpdateStatus::Cancelled;
        assert!(update.is_skipped());
        update.status = StopUpdateStatus::NoData;
        assert!(!update.is_skipped());
    }

    #[test]
    fn position_only_for_positional_sequence() {
        let mut update = ParsedStopTimeUpdate::default();
        assert_eq!(update.position(), None);
        update.sequence = Some(StopSequence::VisitNumber(2));
        assert_eq!(update.position(), None);
        update.sequence = Some(StopSequence::Position(3));
        assert_eq!(update.position(), Some(3));
    }

    #[test]
    fn deserialize() {
        let update: ParsedStopTimeUpdate = serde_json::from_str(
            r#"{
                "stop": { "stopId": "F:B" },
                "sequence": { "position": 1 },
                "status": "SKIPPED",
                "arrival": { "resolved": { "delay": 60 } },
                "extraCall": true
            }"#,
        )
        .unwrap();
        assert!(update.is_skipped());
        assert!(update.extra_call);
        assert_eq!(update.position(), Some(1));
        assert!(update.departure.is_none());
    }
}
