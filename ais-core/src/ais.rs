use std::{fmt::Display, str::FromStr};

use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use strum::{AsRefStr, EnumString};

use crate::error::{Error, InvalidMmsiSnafu};

/// Maritime Mobile Service Identity. Any numeric identifier parses; only
/// exactly-nine-digit values are considered broadcastable, see [`Mmsi::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Mmsi(u32);

impl Mmsi {
    pub fn new(mmsi: u32) -> Self {
        Self(mmsi)
    }

    pub fn into_inner(self) -> u32 {
        self.0
    }

    /// Exactly nine digits and non-zero.
    pub fn is_valid(&self) -> bool {
        (100_000_000..=999_999_999).contains(&self.0)
    }
}

impl FromStr for Mmsi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return InvalidMmsiSnafu { value: s }.fail();
        }
        match s.parse() {
            Ok(v) => Ok(Self(v)),
            Err(_) => InvalidMmsiSnafu { value: s }.fail(),
        }
    }
}

impl From<Mmsi> for u32 {
    fn from(value: Mmsi) -> Self {
        value.0
    }
}

impl Display for Mmsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// AIS navigational status, field value 0-15. The textual variants accepted by
/// [`FromStr`] are the status strings the primary vessel source emits.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    FromPrimitive,
    Serialize_repr,
    Deserialize_repr,
    strum::Display,
    AsRefStr,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum NavigationStatus {
    #[strum(serialize = "motoring")]
    UnderWayUsingEngine = 0,
    #[strum(serialize = "anchored")]
    AtAnchor = 1,
    #[strum(serialize = "not under command")]
    NotUnderCommand = 2,
    #[strum(serialize = "restricted manouverability", serialize = "restricted maneuverability")]
    RestrictedManoeuverability = 3,
    #[strum(serialize = "constrained by draft")]
    ConstrainedByDraught = 4,
    #[strum(serialize = "moored")]
    Moored = 5,
    #[strum(serialize = "aground")]
    Aground = 6,
    #[strum(serialize = "fishing")]
    EngagedInFishing = 7,
    #[strum(serialize = "sailing")]
    UnderWaySailing = 8,
    #[strum(serialize = "hazardous material high speed")]
    HazardousMaterialHighSpeed = 9,
    #[strum(serialize = "hazardous material wing in ground")]
    HazardousMaterialWingInGround = 10,
    #[strum(serialize = "power-driven vessel towing astern")]
    TowingAstern = 11,
    #[strum(serialize = "power-driven vessel pushing ahead")]
    PushingAhead = 12,
    #[strum(serialize = "reserved")]
    Reserved13 = 13,
    #[strum(serialize = "ais-sart")]
    AisSartIsActive = 14,
    #[strum(serialize = "undefined", serialize = "default")]
    NotDefined = 15,
}

/// Transponder class reported by the AIS sensor. Base stations are filtered
/// out before encoding; absent or unrecognized values default to class A.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AisClass {
    #[default]
    A,
    B,
    Base,
}

impl AisClass {
    pub fn from_sensor(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "B" => AisClass::B,
            "BASE" => AisClass::Base,
            _ => AisClass::A,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmsi_requires_exactly_nine_digits() {
        assert!("123456789".parse::<Mmsi>().unwrap().is_valid());
        assert!(!"12345678".parse::<Mmsi>().unwrap().is_valid());
        assert!("12345678a".parse::<Mmsi>().is_err());
        assert!("".parse::<Mmsi>().is_err());
        assert!(!Mmsi::new(0).is_valid());
    }

    #[test]
    fn navigation_status_maps_source_strings() {
        assert_eq!(
            "moored".parse::<NavigationStatus>().unwrap(),
            NavigationStatus::Moored
        );
        assert_eq!(
            "Motoring".parse::<NavigationStatus>().unwrap(),
            NavigationStatus::UnderWayUsingEngine
        );
        assert_eq!(
            "hazardous material wing in ground"
                .parse::<NavigationStatus>()
                .unwrap(),
            NavigationStatus::HazardousMaterialWingInGround
        );
        assert!("warping".parse::<NavigationStatus>().is_err());
    }

    #[test]
    fn ais_class_defaults_to_a() {
        assert_eq!(AisClass::from_sensor("b"), AisClass::B);
        assert_eq!(AisClass::from_sensor("BASE"), AisClass::Base);
        assert_eq!(AisClass::from_sensor(""), AisClass::A);
        assert_eq!(AisClass::from_sensor("A"), AisClass::A);
    }
}
