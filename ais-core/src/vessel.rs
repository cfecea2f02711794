use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AisClass, Mmsi, NavigationStatus};

/// A measured value together with the unit string and timestamp the source
/// reported for it, when it reported any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampled<T> {
    pub value: T,
    pub units: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl<T> Sampled<T> {
    pub fn bare(value: T) -> Self {
        Self {
            value,
            units: None,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Source tag of the fix, used to derive the EPFD device type.
    pub source: Option<String>,
}

impl PositionFix {
    /// Latitude within [-90, 90] and longitude within [-180, 180]; anything
    /// else is encoded with the AIS "not available" coordinates.
    pub fn in_valid_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.timestamp.map(|t| now - t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Navigation {
    pub position: Option<PositionFix>,
    pub speed_over_ground: Option<Sampled<f64>>,
    pub course_over_ground: Option<Sampled<f64>>,
    pub heading: Option<Sampled<f64>>,
    pub rate_of_turn: Option<Sampled<f64>>,
    pub state: Option<NavigationStatus>,
    pub destination: Option<String>,
    pub eta: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Design {
    pub length_overall: Option<Sampled<f64>>,
    pub beam: Option<Sampled<f64>>,
    pub draught_maximum: Option<Sampled<f64>>,
    pub ship_type: Option<Sampled<u8>>,
}

/// Placement and class of the AIS transponder, from the vessel's sensor data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AisSensor {
    pub from_bow: Option<Sampled<f64>>,
    pub from_center: Option<Sampled<f64>>,
    pub class: Option<AisClass>,
}

/// One logical vessel, merged from all sources. Rebuilt from scratch every
/// poll cycle; nothing here survives across cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselRecord {
    pub mmsi: Mmsi,
    pub name: Option<String>,
    pub call_sign: Option<String>,
    pub imo: Option<String>,
    pub navigation: Navigation,
    pub design: Design,
    pub ais: AisSensor,
}

impl VesselRecord {
    pub fn new(mmsi: Mmsi) -> Self {
        Self {
            mmsi,
            name: None,
            call_sign: None,
            imo: None,
            navigation: Navigation::default(),
            design: Design::default(),
            ais: AisSensor::default(),
        }
    }

    pub fn ais_class(&self) -> AisClass {
        self.ais.class.unwrap_or_default()
    }

    /// Canonical serialization of the broadcast-relevant fields. Two records
    /// with equal fingerprints produce identical sentences, so the scheduler
    /// compares these across cycles to detect change.
    pub fn fingerprint(&self) -> String {
        serde_json::json!({
            "position": self.navigation.position,
            "sog": self.navigation.speed_over_ground,
            "cog": self.navigation.course_over_ground,
            "heading": self.navigation.heading,
            "state": self.navigation.state,
            "name": self.name,
            "callSign": self.call_sign,
        })
        .to_string()
    }
}
