use ais_core::{Navigation, NavigationStatus, PositionFix, Sampled, VesselRecord};
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::Deserialize;

use crate::{
    BitBuf, TextFill,
    error::{LengthMismatchSnafu, MissingPositionSnafu, Result},
};

pub const SOG_NOT_AVAILABLE: u32 = 1023;
pub const COG_NOT_AVAILABLE: u32 = 3600;
pub const HEADING_NOT_AVAILABLE: u32 = 511;
pub const ROT_NOT_AVAILABLE: i32 = -128;
/// 181 degrees in 1/10000 minutes, the AIS "longitude not available" value.
pub const LON_NOT_AVAILABLE: i32 = 0x679_1AC0;
/// 91 degrees in 1/10000 minutes, the AIS "latitude not available" value.
pub const LAT_NOT_AVAILABLE: i32 = 0x341_2140;

const MS_TO_KNOTS: f64 = 1.94384;
/// Rate-of-turn sentinel some sources emit instead of omitting the field.
const ROT_SENTINEL_RAD_S: f64 = -2.234_021_443_062_84;
const MAX_ROT_DEG_PER_MIN: f64 = 708.0;

/// How to interpret an angular value that arrives without unit metadata.
/// `Heuristic` guesses radians when the magnitude is at most 2*pi.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnglePolicy {
    #[default]
    Heuristic,
    AssumeRadians,
    AssumeDegrees,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncoderConfig {
    /// Speeds below this many knots are treated as stationary noise: SOG
    /// encodes as unavailable and COG/heading are suppressed.
    pub min_alarm_sog_knots: f64,
    /// Unitless-angle interpretation for class A reports (type 1).
    pub class_a_angles: AnglePolicy,
    /// Unitless-angle interpretation for class B reports (type 19).
    pub class_b_angles: AnglePolicy,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            min_alarm_sog_knots: 0.2,
            class_a_angles: AnglePolicy::default(),
            class_b_angles: AnglePolicy::default(),
        }
    }
}

/// SOG/COG/heading in their AIS field representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Motion {
    sog10: u32,
    cog10: u32,
    heading: u32,
}

#[derive(Debug, Clone, Copy)]
struct Dimensions {
    to_bow: u32,
    to_stern: u32,
    to_port: u32,
    to_starboard: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Eta {
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
}

const ETA_NOT_AVAILABLE: Eta = Eta {
    month: 0,
    day: 0,
    hour: 24,
    minute: 60,
};

/// Assembles the armored payload of each supported message type from a merged
/// vessel record. Every builder validates the assembled bit length against
/// the fixed length of its type.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    config: EncoderConfig,
}

impl MessageBuilder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Type 1, Position Report Class A. 168 bits.
    pub fn position_report(&self, vessel: &VesselRecord, now: DateTime<Utc>) -> Result<String> {
        let pos = vessel
            .navigation
            .position
            .as_ref()
            .ok_or_else(|| MissingPositionSnafu { mmsi: vessel.mmsi }.build())?;
        let motion = self.motion(&vessel.navigation, self.config.class_a_angles);
        let rot = rate_of_turn(vessel.navigation.rate_of_turn.as_ref());
        let (lon, lat) = encode_coordinates(pos);
        let timestamp =
            seconds_of_minute(pos, vessel.navigation.speed_over_ground.is_some(), now);
        let status = vessel
            .navigation
            .state
            .unwrap_or(NavigationStatus::NotDefined);

        let mut bits = BitBuf::new();
        bits.put_u32(1, 6)?;
        bits.put_u32(0, 2)?;
        bits.put_u32(vessel.mmsi.into_inner(), 30)?;
        bits.put_u32(status as u32, 4)?;
        bits.put_i32(rot, 8)?;
        bits.put_u32(motion.sog10, 10)?;
        bits.put_u32(0, 1)?; // position accuracy
        bits.put_i32(lon, 28)?;
        bits.put_i32(lat, 27)?;
        bits.put_u32(motion.cog10, 12)?;
        bits.put_u32(motion.heading, 9)?;
        bits.put_u32(timestamp, 6)?;
        bits.put_u32(0, 2)?; // maneuver indicator
        bits.put_u32(0, 3)?; // spare
        bits.put_u32(0, 1)?; // raim
        bits.put_u32(0, 19)?; // radio status
        ensure_len(&bits, 168)?;
        bits.to_payload()
    }

    /// Type 19, Extended Class B Position Report. Exactly 312 bits; a length
    /// mismatch is an error, never a truncation.
    pub fn extended_position_report(
        &self,
        vessel: &VesselRecord,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let pos = vessel
            .navigation
            .position
            .as_ref()
            .ok_or_else(|| MissingPositionSnafu { mmsi: vessel.mmsi }.build())?;
        let motion = self.motion(&vessel.navigation, self.config.class_b_angles);
        let (lon, lat) = encode_coordinates(pos);
        let timestamp =
            seconds_of_minute(pos, vessel.navigation.speed_over_ground.is_some(), now);
        let dim = dimensions(vessel);
        let ship_type = ship_type(vessel);
        let epfd = epfd_from_source(pos.source.as_deref(), 0);

        let mut bits = BitBuf::new();
        bits.put_u32(19, 6)?;
        bits.put_u32(0, 2)?;
        bits.put_u32(vessel.mmsi.into_inner(), 30)?;
        bits.put_u32(0, 8)?; // regional reserved
        bits.put_u32(motion.sog10, 10)?;
        bits.put_u32(0, 1)?; // position accuracy
        bits.put_i32(lon, 28)?;
        bits.put_i32(lat, 27)?;
        bits.put_u32(motion.cog10, 12)?;
        bits.put_u32(motion.heading, 9)?;
        bits.put_u32(timestamp, 6)?;
        bits.put_u32(0, 4)?; // regional reserved
        bits.put_text(vessel.name.as_deref().unwrap_or(""), 20, TextFill::Space);
        bits.put_u32(ship_type, 8)?;
        bits.put_u32(dim.to_bow, 9)?;
        bits.put_u32(dim.to_stern, 9)?;
        bits.put_u32(dim.to_port, 6)?;
        bits.put_u32(dim.to_starboard, 6)?;
        bits.put_u32(epfd, 4)?;
        bits.put_u32(0, 1)?; // raim
        bits.put_u32(0, 1)?; // dte
        bits.put_u32(0, 1)?; // assigned mode
        bits.put_u32(0, 4)?; // spare
        ensure_len(&bits, 312)?;
        bits.to_payload()
    }

    /// Type 5, Static and Voyage Related Data. 424 bits.
    pub fn static_and_voyage(&self, vessel: &VesselRecord, now: DateTime<Utc>) -> Result<String> {
        let dim = dimensions(vessel);
        let imo = parse_imo(vessel.imo.as_deref());
        let eta = parse_eta(vessel.navigation.eta.as_deref(), now);
        let draught_dm = vessel
            .design
            .draught_maximum
            .as_ref()
            .map(|d| (d.value * 10.0).round().clamp(0.0, 255.0) as u32)
            .unwrap_or(0);
        let source = vessel
            .navigation
            .position
            .as_ref()
            .and_then(|p| p.source.as_deref());
        let epfd = epfd_from_source(source, 1);

        let mut bits = BitBuf::new();
        bits.put_u32(5, 6)?;
        bits.put_u32(0, 2)?;
        bits.put_u32(vessel.mmsi.into_inner(), 30)?;
        bits.put_u32(0, 2)?; // ais version
        bits.put_u32(imo, 30)?;
        bits.put_text(
            vessel.call_sign.as_deref().unwrap_or("").trim(),
            7,
            TextFill::At,
        );
        bits.put_text(vessel.name.as_deref().unwrap_or(""), 20, TextFill::Space);
        bits.put_u32(ship_type(vessel), 8)?;
        bits.put_u32(dim.to_bow, 9)?;
        bits.put_u32(dim.to_stern, 9)?;
        bits.put_u32(dim.to_port, 6)?;
        bits.put_u32(dim.to_starboard, 6)?;
        bits.put_u32(epfd, 4)?;
        bits.put_u32(eta.month, 4)?;
        bits.put_u32(eta.day, 5)?;
        bits.put_u32(eta.hour, 5)?;
        bits.put_u32(eta.minute, 6)?;
        bits.put_u32(draught_dm, 8)?;
        bits.put_text(
            vessel.navigation.destination.as_deref().unwrap_or(""),
            20,
            TextFill::Space,
        );
        bits.put_u32(0, 1)?; // dte
        bits.put_u32(0, 1)?; // spare
        ensure_len(&bits, 424)?;
        bits.to_payload()
    }

    /// Type 24 parts A and B, Static Data Report for class B vessels. Both
    /// parts are zero-padded to 168 bits.
    pub fn static_data_class_b(&self, vessel: &VesselRecord) -> Result<(String, String)> {
        let mut part_a = BitBuf::new();
        part_a.put_u32(24, 6)?;
        part_a.put_u32(0, 2)?;
        part_a.put_u32(vessel.mmsi.into_inner(), 30)?;
        part_a.put_u32(0, 2)?; // part number A
        part_a.put_text(vessel.name.as_deref().unwrap_or(""), 20, TextFill::Space);
        part_a.pad_to(168);
        ensure_len(&part_a, 168)?;

        let dim = dimensions(vessel);
        let mut part_b = BitBuf::new();
        part_b.put_u32(24, 6)?;
        part_b.put_u32(0, 2)?;
        part_b.put_u32(vessel.mmsi.into_inner(), 30)?;
        part_b.put_u32(1, 2)?; // part number B
        part_b.put_u32(ship_type(vessel), 8)?;
        part_b.put_text("", 3, TextFill::At); // vendor id
        part_b.put_u32(0, 4)?; // unit model code
        part_b.put_u32(0, 20)?; // serial number
        part_b.put_text(
            vessel.call_sign.as_deref().unwrap_or("").trim(),
            7,
            TextFill::At,
        );
        part_b.put_u32(dim.to_bow, 9)?;
        part_b.put_u32(dim.to_stern, 9)?;
        part_b.put_u32(dim.to_port, 6)?;
        part_b.put_u32(dim.to_starboard, 6)?;
        part_b.put_u32(0, 6)?; // spare
        ensure_len(&part_b, 168)?;

        Ok((part_a.to_payload()?, part_b.to_payload()?))
    }

    fn motion(&self, nav: &Navigation, policy: AnglePolicy) -> Motion {
        let min_alarm = self.config.min_alarm_sog_knots;

        let mut sog_kn = nav
            .speed_over_ground
            .as_ref()
            .map(|s| s.value)
            .unwrap_or(0.0);
        if !units_contain(nav.speed_over_ground.as_ref(), "kn") {
            sog_kn *= MS_TO_KNOTS;
        }
        if !sog_kn.is_finite() {
            sog_kn = 0.0;
        }
        if sog_kn < min_alarm {
            sog_kn = 0.0;
        }
        let sog10 = if sog_kn <= 0.0 {
            SOG_NOT_AVAILABLE
        } else {
            ((sog_kn * 10.0).round() as u32).min(1022)
        };

        let mut cog10 = COG_NOT_AVAILABLE;
        if sog_kn >= min_alarm
            && let Some(cog) = nav.course_over_ground.as_ref()
            && cog.value.is_finite()
        {
            let deg = angle_to_degrees(cog.value, cog.units.as_deref(), policy)
                .rem_euclid(360.0);
            cog10 = ((deg * 10.0).round() as u32).min(3599);
        }

        let mut heading = HEADING_NOT_AVAILABLE;
        if sog_kn >= min_alarm
            && cog10 != COG_NOT_AVAILABLE
            && let Some(hdg) = nav.heading.as_ref()
            && hdg.value.is_finite()
        {
            let explicit_radians = hdg
                .units
                .as_deref()
                .is_some_and(|u| u.to_lowercase().contains("rad"));
            if explicit_radians && hdg.value > std::f64::consts::TAU {
                // Cannot be a plausible radian heading.
                heading = HEADING_NOT_AVAILABLE;
            } else {
                let deg = angle_to_degrees(hdg.value, hdg.units.as_deref(), policy);
                if (360.0..=511.0).contains(&deg) {
                    heading = HEADING_NOT_AVAILABLE;
                } else {
                    heading = (deg.rem_euclid(360.0).round() as u32).min(359);
                }
            }
        }

        Motion {
            sog10,
            cog10,
            heading,
        }
    }
}

fn units_contain(sample: Option<&Sampled<f64>>, needle: &str) -> bool {
    sample
        .and_then(|s| s.units.as_deref())
        .is_some_and(|u| u.to_lowercase().contains(needle))
}

fn angle_to_degrees(value: f64, units: Option<&str>, policy: AnglePolicy) -> f64 {
    if let Some(units) = units {
        let units = units.to_lowercase();
        if units.contains("rad") {
            return value.to_degrees();
        }
        if units.contains("deg") {
            return value;
        }
    }
    match policy {
        AnglePolicy::AssumeRadians => value.to_degrees(),
        AnglePolicy::AssumeDegrees => value,
        AnglePolicy::Heuristic => {
            if value.abs() <= std::f64::consts::TAU {
                value.to_degrees()
            } else {
                value
            }
        }
    }
}

/// ITU-R M.1371 rate-of-turn encoding: convert to degrees/minute, clamp to
/// +-708, then `round(sign * 4.733 * sqrt(|rate|))` clamped to +-126. Zero or
/// absent rates encode as the -128 "not available" code.
pub fn rate_of_turn(sample: Option<&Sampled<f64>>) -> i32 {
    let Some(sample) = sample else {
        return ROT_NOT_AVAILABLE;
    };
    if !sample.value.is_finite() {
        return ROT_NOT_AVAILABLE;
    }

    let mut rate = sample.value;
    let units = sample.units.as_deref().map(str::to_lowercase);
    match units.as_deref() {
        Some(u) if u.contains("rad/s") => {
            if (rate - ROT_SENTINEL_RAD_S).abs() < 1e-6 {
                return ROT_NOT_AVAILABLE;
            }
            rate = rate.to_degrees() * 60.0;
        }
        Some(u) if u.contains("deg/s") => rate *= 60.0,
        Some(u) if u.contains("deg/min") => {}
        _ => {
            // No usable units; small magnitudes are taken to be rad/s.
            if rate.abs() < 10.0 {
                rate = rate.to_degrees() * 60.0;
            }
        }
    }

    rate = rate.clamp(-MAX_ROT_DEG_PER_MIN, MAX_ROT_DEG_PER_MIN);
    if rate == 0.0 {
        return ROT_NOT_AVAILABLE;
    }
    let encoded = (rate.signum() * 4.733 * rate.abs().sqrt()).round() as i32;
    encoded.clamp(-126, 126)
}

/// Position in 1/10000-minute units. Out-of-range or non-finite coordinates
/// are replaced with the AIS "not available" constants, never wrapped.
fn encode_coordinates(pos: &PositionFix) -> (i32, i32) {
    let lon = (pos.longitude * 600_000.0).round();
    let lat = (pos.latitude * 600_000.0).round();
    let lon = if lon.is_finite() && (-108_000_000.0..=108_000_000.0).contains(&lon) {
        lon as i32
    } else {
        LON_NOT_AVAILABLE
    };
    let lat = if lat.is_finite() && (-54_000_000.0..=54_000_000.0).contains(&lat) {
        lat as i32
    } else {
        LAT_NOT_AVAILABLE
    };
    (lon, lat)
}

/// UTC second-of-minute of the fix when it is at most 60 seconds old and a
/// speed value accompanies it, otherwise 60 ("not available"). Downstream
/// plotters compute closest-point-of-approach from reports carrying a live
/// second, so stale fixes must not claim one.
fn seconds_of_minute(pos: &PositionFix, has_sog: bool, now: DateTime<Utc>) -> u32 {
    match pos.timestamp {
        Some(ts) if has_sog && (now - ts).num_seconds() <= 60 => ts.second(),
        _ => 60,
    }
}

fn dimensions(vessel: &VesselRecord) -> Dimensions {
    let length = sample_or_zero(&vessel.design.length_overall);
    let beam = sample_or_zero(&vessel.design.beam);
    let from_bow = sample_or_zero(&vessel.ais.from_bow);
    let from_center = sample_or_zero(&vessel.ais.from_center);

    Dimensions {
        to_bow: field_meters(from_bow, 511),
        to_stern: field_meters(length - from_bow, 511),
        to_port: field_meters(beam / 2.0 - from_center, 63),
        to_starboard: field_meters(beam / 2.0 + from_center, 63),
    }
}

fn field_meters(value: f64, max: u32) -> u32 {
    (value.max(0.0).round() as u32).min(max)
}

fn sample_or_zero(sample: &Option<Sampled<f64>>) -> f64 {
    sample.as_ref().map(|s| s.value).unwrap_or(0.0)
}

fn ship_type(vessel: &VesselRecord) -> u32 {
    vessel
        .design
        .ship_type
        .as_ref()
        .map(|t| u32::from(t.value))
        .unwrap_or(0)
}

/// Digits-only parse of whatever the source stored as an IMO number; absent
/// or unparseable values encode as 0.
fn parse_imo(raw: Option<&str>) -> u32 {
    let digits: String = raw
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn epfd_from_source(source: Option<&str>, fallback: u32) -> u32 {
    let source = source.unwrap_or("").to_lowercase();
    if source.contains("gps") {
        1
    } else if source.contains("glonass") {
        2
    } else if source.contains("galileo") {
        3
    } else if fallback == 1 && source.contains("gnss") {
        1
    } else {
        fallback
    }
}

/// Parses an ETA string into the type 5 month/day/hour/minute fields.
/// Accepts full ISO-8601, the AIS short form `MM-DDTHH:mmZ` (projected onto
/// its next future occurrence), and the bare `MMDDHHmm` digit form. Anything
/// else yields the "not available" ETA.
fn parse_eta(raw: Option<&str>, now: DateTime<Utc>) -> Eta {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ETA_NOT_AVAILABLE;
    };
    if raw.starts_with("00-00") || raw.starts_with("0000-00-00") {
        return ETA_NOT_AVAILABLE;
    }

    if is_iso_date_lead(raw) {
        return match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => eta_fields(dt.with_timezone(&Utc)),
            Err(_) => ETA_NOT_AVAILABLE,
        };
    }

    if let Some(eta) = parse_short_eta(raw, now) {
        return eta;
    }
    if let Some(eta) = parse_digit_eta(raw) {
        return eta;
    }
    ETA_NOT_AVAILABLE
}

fn eta_fields(dt: DateTime<Utc>) -> Eta {
    Eta {
        month: dt.month(),
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
    }
}

fn is_iso_date_lead(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() > 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
        && b[10] == b'T'
}

/// `MM-DDTHH:mmZ`: an ETA is always in the future, so a month/day already
/// past this year resolves to next year.
fn parse_short_eta(s: &str, now: DateTime<Utc>) -> Option<Eta> {
    let b = s.as_bytes();
    if b.len() != 12 || b[2] != b'-' || b[5] != b'T' || b[8] != b':' || b[11] != b'Z' {
        return None;
    }
    let month: u32 = s[0..2].parse().ok()?;
    let day: u32 = s[3..5].parse().ok()?;
    let hour: u32 = s[6..8].parse().ok()?;
    let minute: u32 = s[9..11].parse().ok()?;

    let candidate = Utc
        .with_ymd_and_hms(now.year(), month, day, hour, minute, 0)
        .single()?;
    let resolved = if candidate < now {
        Utc.with_ymd_and_hms(now.year() + 1, month, day, hour, minute, 0)
            .single()?
    } else {
        candidate
    };
    Some(eta_fields(resolved))
}

/// Bare `MMDDHHmm` digits, as seen on the raw AIS wire.
fn parse_digit_eta(s: &str) -> Option<Eta> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let eta = Eta {
        month: s[0..2].parse().ok()?,
        day: s[2..4].parse().ok()?,
        hour: s[4..6].parse().ok()?,
        minute: s[6..8].parse().ok()?,
    };
    let plausible =
        (1..=12).contains(&eta.month) && (1..=31).contains(&eta.day) && eta.hour <= 23 && eta.minute <= 59;
    plausible.then_some(eta)
}

fn ensure_len(bits: &BitBuf, expected: usize) -> Result<()> {
    if bits.len() != expected {
        return LengthMismatchSnafu {
            expected,
            actual: bits.len(),
        }
        .fail();
    }
    Ok(())
}
