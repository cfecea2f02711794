use std::collections::HashMap;

use ais_core::{AisClass, Mmsi, Sampled, VesselRecord};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::settings::FilterSettings;

/// Name values that count as "no real name" during merging.
const NAME_PLACEHOLDER: &str = "Unknown";

/// Display names never exceed the 20 characters the AIS name field holds.
const MAX_NAME_CHARS: usize = 20;

/// Merges the cloud record for a vessel into its primary record. The primary
/// record is authoritative; cloud fields only win when strictly newer or when
/// the primary has nothing.
pub fn merge(mut primary: VesselRecord, cloud: VesselRecord) -> VesselRecord {
    primary.name = prefer_named(primary.name, cloud.name);
    primary.call_sign = prefer_named(primary.call_sign, cloud.call_sign);
    primary.imo = primary.imo.or(cloud.imo);

    primary.navigation.position = newest_position(
        primary.navigation.position,
        cloud.navigation.position,
    );
    primary.navigation.speed_over_ground = newest(
        primary.navigation.speed_over_ground,
        cloud.navigation.speed_over_ground,
    );
    primary.navigation.course_over_ground = newest(
        primary.navigation.course_over_ground,
        cloud.navigation.course_over_ground,
    );
    primary.navigation.heading = newest(primary.navigation.heading, cloud.navigation.heading);
    primary.navigation.rate_of_turn = newest(
        primary.navigation.rate_of_turn,
        cloud.navigation.rate_of_turn,
    );
    primary.navigation.state = primary.navigation.state.or(cloud.navigation.state);
    primary.navigation.destination = primary.navigation.destination.or(cloud.navigation.destination);
    primary.navigation.eta = primary.navigation.eta.or(cloud.navigation.eta);

    primary.design.length_overall = newest(
        primary.design.length_overall,
        cloud.design.length_overall,
    );
    primary.design.beam = newest(primary.design.beam, cloud.design.beam);
    primary.design.draught_maximum = newest(
        primary.design.draught_maximum,
        cloud.design.draught_maximum,
    );
    primary.design.ship_type = primary.design.ship_type.or(cloud.design.ship_type);

    primary.ais.from_bow = newest(primary.ais.from_bow, cloud.ais.from_bow);
    primary.ais.from_center = newest(primary.ais.from_center, cloud.ais.from_center);
    primary.ais.class = primary.ais.class.or(cloud.ais.class);

    primary
}

/// Merges all cloud records into the primary set, keyed by MMSI. Cloud-only
/// vessels enter the set as-is.
pub fn merge_sources(
    primary: HashMap<Mmsi, VesselRecord>,
    cloud: Vec<VesselRecord>,
) -> Vec<VesselRecord> {
    let mut merged = primary;
    for record in cloud {
        match merged.remove(&record.mmsi) {
            Some(existing) => {
                merged.insert(record.mmsi, merge(existing, record));
            }
            None => {
                merged.insert(record.mmsi, record);
            }
        }
    }
    merged.into_values().collect()
}

/// A placeholder or empty target loses to a real value; a real target never
/// loses, regardless of timestamps.
fn prefer_named(target: Option<String>, source: Option<String>) -> Option<String> {
    let target_usable = target
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty() && t.trim() != NAME_PLACEHOLDER);
    if target_usable {
        return target;
    }
    let source_usable = source
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty() && s.trim() != NAME_PLACEHOLDER);
    if source_usable { source } else { target }
}

/// Strictly newer timestamp wins; a timestamped value beats an untimestamped
/// one; an absent target is filled unconditionally.
fn newest<T>(target: Option<Sampled<T>>, source: Option<Sampled<T>>) -> Option<Sampled<T>> {
    match (target, source) {
        (None, source) => source,
        (target, None) => target,
        (Some(t), Some(s)) => match (t.timestamp, s.timestamp) {
            (Some(tt), Some(st)) if st > tt => Some(s),
            (None, Some(_)) => Some(s),
            _ => Some(t),
        },
    }
}

fn newest_position(
    target: Option<ais_core::PositionFix>,
    source: Option<ais_core::PositionFix>,
) -> Option<ais_core::PositionFix> {
    match (target, source) {
        (None, source) => source,
        (target, None) => target,
        (Some(t), Some(s)) => match (t.timestamp, s.timestamp) {
            (Some(tt), Some(st)) if st > tt => Some(s),
            (None, Some(_)) => Some(s),
            _ => Some(t),
        },
    }
}

/// Appends a position-age suffix to the display name once the fix is older
/// than the threshold, so chart plotters show how stale the target is. The
/// suffix feeds only the name field, nothing downstream.
pub fn annotate_stale_name(vessel: &mut VesselRecord, threshold: Duration, now: DateTime<Utc>) {
    let Some(age) = vessel
        .navigation
        .position
        .as_ref()
        .and_then(|p| p.age(now))
    else {
        return;
    };
    if age <= threshold {
        return;
    }

    let seconds = age.num_seconds().max(0) as u64;
    let suffix = if seconds < 3600 {
        format!(" MIN{}", seconds.div_ceil(60))
    } else if seconds < 86_400 {
        format!(" HOUR{}", seconds.div_ceil(3600))
    } else {
        format!(" DAY{}", seconds.div_ceil(86_400))
    };

    let base = vessel.name.as_deref().unwrap_or(NAME_PLACEHOLDER);
    let keep = MAX_NAME_CHARS.saturating_sub(suffix.len());
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(&suffix);
    vessel.name = Some(name);
}

/// Per-cycle skip counters, one per filter stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub base_stations: usize,
    pub own_vessel: usize,
    pub invalid_mmsi: usize,
    pub stale: usize,
    pub sog_zeroed: usize,
    pub no_identity: usize,
    pub no_callsign: usize,
    pub kept: usize,
}

/// Applies the filter chain in order, counting every skip independently.
/// SOG-zeroing is a correction, not a drop.
pub fn filter(
    vessels: Vec<VesselRecord>,
    own_mmsi: Option<Mmsi>,
    settings: &FilterSettings,
    now: DateTime<Utc>,
) -> (Vec<VesselRecord>, FilterStats) {
    let mut stats = FilterStats::default();
    let stale_threshold = Duration::from_std(settings.stale_data_threshold)
        .unwrap_or_else(|_| Duration::minutes(30));
    let sog_zero_after =
        Duration::from_std(settings.sog_zero_after).unwrap_or_else(|_| Duration::minutes(10));

    let mut kept = Vec::with_capacity(vessels.len());
    for mut vessel in vessels {
        if vessel.ais.class == Some(AisClass::Base) {
            stats.base_stations += 1;
            continue;
        }
        if own_mmsi.is_some_and(|own| own == vessel.mmsi) {
            stats.own_vessel += 1;
            continue;
        }
        if !vessel.mmsi.is_valid() {
            debug!("skipped invalid mmsi {}", vessel.mmsi);
            stats.invalid_mmsi += 1;
            continue;
        }

        let position_age = vessel
            .navigation
            .position
            .as_ref()
            .and_then(|p| p.age(now));

        if settings.skip_stale_data
            && position_age.is_some_and(|age| age > stale_threshold)
        {
            debug!("skipped stale {}", vessel.mmsi);
            stats.stale += 1;
            continue;
        }

        if position_age.is_some_and(|age| age > sog_zero_after)
            && vessel
                .navigation
                .speed_over_ground
                .as_ref()
                .is_some_and(|s| s.value != 0.0)
        {
            if let Some(sog) = vessel.navigation.speed_over_ground.as_mut() {
                sog.value = 0.0;
            }
            stats.sog_zeroed += 1;
        }

        let has_name = vessel
            .name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty());
        let has_callsign = vessel
            .call_sign
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_name && !has_callsign {
            stats.no_identity += 1;
            continue;
        }
        if settings.skip_without_callsign && !has_callsign {
            debug!("skipped (no callsign) {}", vessel.mmsi);
            stats.no_callsign += 1;
            continue;
        }

        kept.push(vessel);
    }

    stats.kept = kept.len();
    (kept, stats)
}
