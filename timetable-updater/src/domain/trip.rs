//! Trips and dated trips.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{FeedScopedId, Route, TransitMode};

/// Direction of travel along a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outbound,
    Inbound,
}

/// A scheduled journey of one vehicle along a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub id: FeedScopedId,
    pub route: Arc<Route>,
    /// Calendar service that decides which dates the trip runs on.
    pub service_id: FeedScopedId,
    pub direction: Option<Direction>,
    pub headsign: Option<String>,
    pub short_name: Option<String>,
    pub mode: TransitMode,
    pub submode: Option<String>,
    /// Operator-internal identifier, used for rail fuzzy matching.
    pub internal_planning_code: Option<String>,
}

impl Trip {
    /// Create a trip inheriting its mode from the route.
    pub fn new(id: FeedScopedId, route: Arc<Route>, service_id: FeedScopedId) -> Self {
        let mode = route.mode;
        Self {
            id,
            route,
            service_id,
            direction: None,
            headsign: None,
            short_name: None,
            mode,
            submode: None,
            internal_planning_code: None,
        }
    }
}

/// A trip bound to one service date, usable as an alternate reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripOnServiceDate {
    pub id: FeedScopedId,
    pub trip: Arc<Trip>,
    pub service_date: NaiveDate,
    /// Dated trips this one replaces.
    pub replacement_for: Vec<FeedScopedId>,
}
