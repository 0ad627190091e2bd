//! Agencies, routes and transit modes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::FeedScopedId;

/// Mode of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitMode {
    #[default]
    Bus,
    Coach,
    Rail,
    Tram,
    Subway,
    Ferry,
    Other,
}

impl fmt::Display for TransitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitMode::Bus => "bus",
            TransitMode::Coach => "coach",
            TransitMode::Rail => "rail",
            TransitMode::Tram => "tram",
            TransitMode::Subway => "subway",
            TransitMode::Ferry => "ferry",
            TransitMode::Other => "other",
        };
        f.write_str(s)
    }
}

/// A transit agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agency {
    pub id: FeedScopedId,
    pub name: String,
    /// IANA time zone name.
    pub timezone: String,
}

/// A route: a named line operated by an agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: FeedScopedId,
    pub agency: Arc<Agency>,
    pub mode: TransitMode,
    pub submode: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub url: Option<String>,
    /// Operating company, where it differs from the agency.
    pub operator_id: Option<FeedScopedId>,
    /// Numeric GTFS route type, if known.
    pub gtfs_type: Option<i32>,
}

impl Route {
    /// Create a route with only the required fields set.
    pub fn new(id: FeedScopedId, agency: Arc<Agency>, mode: TransitMode) -> Self {
        Self {
            id,
            agency,
            mode,
            submode: None,
            short_name: None,
            long_name: None,
            url: None,
            operator_id: None,
            gtfs_type: None,
        }
    }

    /// A name for display: short name if set, else long name, else the id.
    pub fn display_name(&self) -> String {
        self.short_name
            .clone()
            .or_else(|| self.long_name.clone())
            .unwrap_or_else(|| self.id.id().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agency() -> Arc<Agency> {
        Arc::new(Agency {
            id: FeedScopedId::new("F", "AG").unwrap(),
            name: "Agency".into(),
            timezone: "Europe/Oslo".into(),
        })
    }

    #[test]
    fn display_name_fallbacks() {
        let mut route = Route::new(FeedScopedId::new("F", "R1").unwrap(), agency(), TransitMode::Rail);
        assert_eq!(route.display_name(), "R1");

        route.long_name = Some("Oslo - Bergen".into());
        assert_eq!(route.display_name(), "Oslo - Bergen");

        route.short_name = Some("F4".into());
        assert_eq!(route.display_name(), "F4");
    }

    #[test]
    fn mode_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&TransitMode::Rail).unwrap(), "\"rail\"");
        let mode: TransitMode = serde_json::from_str("\"ferry\"").unwrap();
        assert_eq!(mode, TransitMode::Ferry);
        assert_eq!(TransitMode::default(), TransitMode::Bus);
        assert_eq!(TransitMode::Subway.to_string(), "subway");
    }
}
