use std::collections::HashMap;

use ais_core::{
    AisClass, Mmsi, NavigationStatus, PositionFix, Sampled, VesselRecord,
};
use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use serde::Deserialize;
use tracing::warn;

pub const VESSEL_URN_PREFIX: &str = "urn:mrn:imo:mmsi:";

const KNOTS_PER_MS: f64 = 1.94384;

/// The primary source's `GET /vessels` response: vessels keyed by URN plus a
/// literal `self` entry. Values stay raw until per-entry deserialization so a
/// single malformed vessel is skipped instead of failing the whole map.
pub type SkVesselMap = HashMap<String, serde_json::Value>;

/// A value as the primary source delivers it: either wrapped with timestamp,
/// source and unit metadata, or bare.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum SkValue<T> {
    Wrapped(SkWrapped<T>),
    Bare(T),
}

#[derive(Deserialize, Debug, Clone)]
pub struct SkWrapped<T> {
    pub value: T,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "$source")]
    pub source: Option<String>,
    #[serde(default)]
    pub meta: Option<SkMeta>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SkMeta {
    #[serde(default)]
    pub units: Option<String>,
}

impl<T> SkValue<T> {
    pub fn value(&self) -> &T {
        match self {
            SkValue::Wrapped(w) => &w.value,
            SkValue::Bare(v) => v,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SkValue::Wrapped(w) => w.timestamp,
            SkValue::Bare(_) => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            SkValue::Wrapped(w) => w.source.as_deref(),
            SkValue::Bare(_) => None,
        }
    }

    pub fn units(&self) -> Option<&str> {
        match self {
            SkValue::Wrapped(w) => w.meta.as_ref().and_then(|m| m.units.as_deref()),
            SkValue::Bare(_) => None,
        }
    }
}

impl SkValue<f64> {
    pub fn to_sampled(&self) -> Sampled<f64> {
        Sampled {
            value: *self.value(),
            units: self.units().map(Into::into),
            timestamp: self.timestamp(),
        }
    }
}

/// A numeric identifier that sources deliver either as a string or a number.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum NumericString {
    Text(String),
    Number(i64),
}

impl NumericString {
    pub fn as_string(&self) -> String {
        match self {
            NumericString::Text(s) => s.clone(),
            NumericString::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkVessel {
    pub mmsi: Option<NumericString>,
    pub name: Option<String>,
    pub callsign: Option<String>,
    pub call_sign: Option<String>,
    pub communication: Option<SkCommunication>,
    pub imo: Option<NumericString>,
    pub registrations: Option<SkRegistrations>,
    pub navigation: Option<SkNavigation>,
    pub design: Option<SkDesign>,
    pub sensors: Option<SkSensors>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkCommunication {
    pub callsign_vhf: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SkRegistrations {
    pub imo: Option<NumericString>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkNavigation {
    pub position: Option<SkValue<SkPosition>>,
    pub speed_over_ground: Option<SkValue<f64>>,
    pub course_over_ground_true: Option<SkValue<f64>>,
    pub heading_true: Option<SkValue<f64>>,
    pub rate_of_turn: Option<SkValue<f64>>,
    pub state: Option<SkValue<String>>,
    pub destination: Option<SkDestination>,
    pub course_great_circle: Option<SkCourseGreatCircle>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct SkPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkDestination {
    pub common_name: Option<SkValue<String>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkCourseGreatCircle {
    pub active_route: Option<SkActiveRoute>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkActiveRoute {
    pub estimated_time_of_arrival: Option<SkValue<String>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkDesign {
    pub length: Option<SkValue<SkLength>>,
    pub beam: Option<SkValue<f64>>,
    pub draft: Option<SkValue<SkDraft>>,
    pub ais_ship_type: Option<SkValue<SkShipType>>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct SkLength {
    pub overall: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct SkDraft {
    pub maximum: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(untagged)]
pub enum SkShipType {
    Object { id: u8 },
    Code(u8),
}

impl SkShipType {
    pub fn id(&self) -> u8 {
        match self {
            SkShipType::Object { id } => *id,
            SkShipType::Code(id) => *id,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SkSensors {
    pub ais: Option<SkAisSensor>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SkAisSensor {
    pub from_bow: Option<SkValue<f64>>,
    pub from_center: Option<SkValue<f64>>,
    pub class: Option<SkValue<String>>,
}

impl SkVessel {
    pub fn call_sign(&self) -> Option<&str> {
        self.callsign
            .as_deref()
            .or(self.call_sign.as_deref())
            .or_else(|| {
                self.communication
                    .as_ref()
                    .and_then(|c| c.callsign_vhf.as_deref())
            })
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn imo(&self) -> Option<String> {
        self.imo
            .as_ref()
            .or_else(|| self.registrations.as_ref().and_then(|r| r.imo.as_ref()))
            .map(NumericString::as_string)
    }

    pub fn position(&self) -> Option<PositionFix> {
        let position = self.navigation.as_ref()?.position.as_ref()?;
        let fix = position.value();
        Some(PositionFix {
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: position.timestamp(),
            source: position.source().map(Into::into),
        })
    }
}

/// Maps a navigational state string onto the AIS status code; numeric values
/// pass through. Unrecognized values are logged and default to "not defined".
pub fn parse_state(mmsi: Mmsi, raw: &str) -> NavigationStatus {
    let raw = raw.trim();
    if let Ok(status) = raw.parse::<NavigationStatus>() {
        return status;
    }
    if let Some(status) = raw.parse::<u8>().ok().and_then(NavigationStatus::from_u8) {
        return status;
    }
    warn!("unknown navigational state '{raw}' for {mmsi}, defaulting to 15");
    NavigationStatus::NotDefined
}

/// Normalizes one primary-source vessel onto the canonical record; all
/// downstream code operates only on [`VesselRecord`].
pub fn vessel_from_signalk(mmsi: Mmsi, sk: &SkVessel) -> VesselRecord {
    let mut v = VesselRecord::new(mmsi);
    v.name = sk
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(Into::into);
    v.call_sign = sk.call_sign().map(Into::into);
    v.imo = sk.imo();

    if let Some(nav) = sk.navigation.as_ref() {
        v.navigation.position = sk.position();
        v.navigation.speed_over_ground = nav.speed_over_ground.as_ref().map(SkValue::to_sampled);
        v.navigation.course_over_ground =
            nav.course_over_ground_true.as_ref().map(SkValue::to_sampled);
        v.navigation.heading = nav.heading_true.as_ref().map(SkValue::to_sampled);
        v.navigation.rate_of_turn = nav.rate_of_turn.as_ref().map(SkValue::to_sampled);
        v.navigation.state = nav
            .state
            .as_ref()
            .map(|s| parse_state(mmsi, s.value()));
        v.navigation.destination = nav
            .destination
            .as_ref()
            .and_then(|d| d.common_name.as_ref())
            .map(|n| n.value().clone());
        v.navigation.eta = nav
            .course_great_circle
            .as_ref()
            .and_then(|c| c.active_route.as_ref())
            .and_then(|r| r.estimated_time_of_arrival.as_ref())
            .map(|e| e.value().clone());
    }

    if let Some(design) = sk.design.as_ref() {
        v.design.length_overall = design.length.as_ref().and_then(|l| {
            l.value().overall.map(|overall| Sampled {
                value: overall,
                units: l.units().map(Into::into),
                timestamp: l.timestamp(),
            })
        });
        v.design.beam = design.beam.as_ref().map(SkValue::to_sampled);
        v.design.draught_maximum = design.draft.as_ref().and_then(|d| {
            d.value().maximum.map(|maximum| Sampled {
                value: maximum,
                units: d.units().map(Into::into),
                timestamp: d.timestamp(),
            })
        });
        v.design.ship_type = design.ais_ship_type.as_ref().map(|t| Sampled {
            value: t.value().id(),
            units: None,
            timestamp: t.timestamp(),
        });
    }

    if let Some(ais) = sk.sensors.as_ref().and_then(|s| s.ais.as_ref()) {
        v.ais.from_bow = ais.from_bow.as_ref().map(SkValue::to_sampled);
        v.ais.from_center = ais.from_center.as_ref().map(SkValue::to_sampled);
        v.ais.class = ais.class.as_ref().map(|c| AisClass::from_sensor(c.value()));
    }

    v
}

#[derive(Deserialize, Debug, Clone)]
pub struct CloudResponse {
    #[serde(default)]
    pub vessels: Vec<CloudVessel>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CloudVessel {
    pub mmsi: u32,
    pub name: Option<String>,
    pub call_sign: Option<String>,
    pub imo_number: Option<NumericString>,
    pub design_length: Option<f64>,
    pub design_beam: Option<f64>,
    pub design_draft: Option<f64>,
    pub ais_ship_type: Option<u8>,
    pub last_position: Option<CloudPosition>,
    pub latest_navigation: Option<CloudNavigation>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct CloudPosition {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CloudNavigation {
    /// Degrees.
    pub course_over_ground: Option<f64>,
    /// Knots.
    pub speed_over_ground: Option<f64>,
    /// Degrees.
    pub heading: Option<f64>,
    /// Degrees per second.
    pub rate_of_turn: Option<f64>,
    pub navigation_status: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Normalizes one cloud vessel onto the canonical record: knots become m/s
/// and degrees become radians so the record looks like a primary-source one.
/// Angles of 360 degrees or more are invalid in the cloud feed and map to 0.
pub fn vessel_from_cloud(cv: &CloudVessel) -> VesselRecord {
    let mmsi = Mmsi::new(cv.mmsi);
    let mut v = VesselRecord::new(mmsi);
    v.name = cv
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(Into::into);
    v.call_sign = cv
        .call_sign
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Into::into);
    v.imo = cv.imo_number.as_ref().map(NumericString::as_string);

    if let Some(pos) = cv.last_position.as_ref() {
        v.navigation.position = Some(PositionFix {
            latitude: pos.latitude,
            longitude: pos.longitude,
            timestamp: pos.timestamp,
            source: None,
        });
    }

    if let Some(nav) = cv.latest_navigation.as_ref() {
        let ts = nav.timestamp;
        v.navigation.speed_over_ground = nav.speed_over_ground.map(|kn| Sampled {
            value: kn / KNOTS_PER_MS,
            units: Some("m/s".into()),
            timestamp: ts,
        });
        v.navigation.course_over_ground = nav
            .course_over_ground
            .map(|deg| radians_sample(deg, ts));
        v.navigation.heading = nav.heading.map(|deg| radians_sample(deg, ts));
        v.navigation.rate_of_turn = nav.rate_of_turn.map(|rate| Sampled {
            value: rate,
            units: Some("deg/s".into()),
            timestamp: ts,
        });
        v.navigation.state = nav
            .navigation_status
            .as_deref()
            .map(|s| parse_state(mmsi, s));
    }

    v.design.length_overall = cv.design_length.map(Sampled::bare);
    v.design.beam = cv.design_beam.map(Sampled::bare);
    v.design.draught_maximum = cv.design_draft.map(Sampled::bare);
    v.design.ship_type = cv.ais_ship_type.map(Sampled::bare);

    v
}

fn radians_sample(deg: f64, timestamp: Option<DateTime<Utc>>) -> Sampled<f64> {
    let deg = if (0.0..360.0).contains(&deg) { deg } else { 0.0 };
    Sampled {
        value: deg.to_radians(),
        units: Some("rad".into()),
        timestamp,
    }
}

/// Extracts the MMSI from a vessel URN; `self` and malformed keys yield none.
pub fn mmsi_from_urn(urn: &str) -> Option<Mmsi> {
    urn.strip_prefix(VESSEL_URN_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_parsing() {
        assert_eq!(
            mmsi_from_urn("urn:mrn:imo:mmsi:244813000"),
            Some(Mmsi::new(244_813_000))
        );
        assert_eq!(mmsi_from_urn("self"), None);
        assert_eq!(mmsi_from_urn("urn:mrn:imo:mmsi:not-a-number"), None);
    }

    #[test]
    fn signalk_vessel_with_wrapped_values_normalizes() {
        let raw = serde_json::json!({
            "name": "TESTSHIP",
            "communication": {"callsignVhf": "PD1234"},
            "registrations": {"imo": "IMO 9074729"},
            "navigation": {
                "position": {
                    "value": {"latitude": 51.73784, "longitude": 3.85013},
                    "timestamp": "2024-06-01T12:00:00Z",
                    "$source": "gps.0"
                },
                "speedOverGround": {
                    "value": 3.2,
                    "timestamp": "2024-06-01T12:00:00Z",
                    "meta": {"units": "m/s"}
                },
                "state": {"value": "moored"}
            },
            "design": {
                "length": {"value": {"overall": 11.8}},
                "beam": {"value": 3.9},
                "draft": {"value": {"maximum": 1.7}},
                "aisShipType": {"value": {"id": 36}}
            },
            "sensors": {
                "ais": {
                    "fromBow": {"value": 4.0},
                    "class": {"value": "B"}
                }
            }
        });
        let sk: SkVessel = serde_json::from_value(raw).unwrap();
        let v = vessel_from_signalk(Mmsi::new(244_813_000), &sk);

        assert_eq!(v.name.as_deref(), Some("TESTSHIP"));
        assert_eq!(v.call_sign.as_deref(), Some("PD1234"));
        assert_eq!(v.imo.as_deref(), Some("IMO 9074729"));
        let pos = v.navigation.position.unwrap();
        assert_eq!(pos.source.as_deref(), Some("gps.0"));
        assert!(pos.timestamp.is_some());
        let sog = v.navigation.speed_over_ground.unwrap();
        assert_eq!(sog.units.as_deref(), Some("m/s"));
        assert_eq!(v.navigation.state, Some(NavigationStatus::Moored));
        assert_eq!(v.design.length_overall.unwrap().value, 11.8);
        assert_eq!(v.design.ship_type.unwrap().value, 36);
        assert_eq!(v.ais.class, Some(AisClass::B));
    }

    #[test]
    fn signalk_vessel_with_bare_values_normalizes() {
        let raw = serde_json::json!({
            "navigation": {
                "position": {"latitude": 51.0, "longitude": 3.0},
                "speedOverGround": 2.5,
                "state": "5"
            }
        });
        let sk: SkVessel = serde_json::from_value(raw).unwrap();
        let v = vessel_from_signalk(Mmsi::new(244_813_000), &sk);

        let pos = v.navigation.position.unwrap();
        assert_eq!(pos.latitude, 51.0);
        assert!(pos.timestamp.is_none());
        assert_eq!(v.navigation.speed_over_ground.unwrap().value, 2.5);
        // Numeric state codes pass through.
        assert_eq!(v.navigation.state, Some(NavigationStatus::Moored));
        assert!(v.name.is_none());
        assert!(v.call_sign.is_none());
    }

    #[test]
    fn cloud_vessel_converts_units() {
        let cv = CloudVessel {
            mmsi: 244_813_000,
            name: Some("CLOUDSHIP".into()),
            call_sign: Some("XY9999".into()),
            ais_ship_type: Some(70),
            last_position: Some(CloudPosition {
                latitude: 51.7,
                longitude: 3.8,
                timestamp: None,
            }),
            latest_navigation: Some(CloudNavigation {
                course_over_ground: Some(90.0),
                speed_over_ground: Some(1.94384),
                heading: Some(370.0),
                rate_of_turn: Some(0.5),
                navigation_status: Some("motoring".into()),
                timestamp: None,
            }),
            ..Default::default()
        };
        let v = vessel_from_cloud(&cv);

        let sog = v.navigation.speed_over_ground.unwrap();
        assert!((sog.value - 1.0).abs() < 1e-9);
        assert_eq!(sog.units.as_deref(), Some("m/s"));

        let cog = v.navigation.course_over_ground.unwrap();
        assert!((cog.value - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(cog.units.as_deref(), Some("rad"));

        // 370 degrees is invalid in the cloud feed and collapses to 0.
        assert_eq!(v.navigation.heading.unwrap().value, 0.0);

        let rot = v.navigation.rate_of_turn.unwrap();
        assert_eq!(rot.units.as_deref(), Some("deg/s"));
        assert_eq!(
            v.navigation.state,
            Some(NavigationStatus::UnderWayUsingEngine)
        );
    }

    #[test]
    fn unknown_state_defaults_to_not_defined() {
        assert_eq!(
            parse_state(Mmsi::new(123_456_789), "warping"),
            NavigationStatus::NotDefined
        );
        assert_eq!(
            parse_state(Mmsi::new(123_456_789), "15"),
            NavigationStatus::NotDefined
        );
    }
}
