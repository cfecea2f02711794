use std::collections::{HashMap, HashSet};

use ais_core::{Mmsi, VesselRecord};
use chrono::{DateTime, Duration, Utc};

/// Forwarded positions older than this are never sent to the UDP collaborator.
const FORWARD_MAX_POSITION_AGE: Duration = Duration::minutes(5);

/// Per-vessel bookkeeping deciding whether a broadcast is due. The maps are
/// the only state that survives across update cycles.
#[derive(Debug)]
pub struct ChangeScheduler {
    fingerprints: HashMap<Mmsi, String>,
    last_broadcast: HashMap<Mmsi, DateTime<Utc>>,
    last_forwarded: Option<DateTime<Utc>>,
    resend_interval: Duration,
    forward_interval: Duration,
}

impl ChangeScheduler {
    pub fn new(resend_interval: std::time::Duration, forward_interval: std::time::Duration) -> Self {
        Self {
            fingerprints: HashMap::new(),
            last_broadcast: HashMap::new(),
            last_forwarded: None,
            resend_interval: Duration::from_std(resend_interval)
                .unwrap_or_else(|_| Duration::minutes(15)),
            forward_interval: Duration::from_std(forward_interval)
                .unwrap_or_else(|_| Duration::minutes(5)),
        }
    }

    /// A send is due when the vessel changed, a client newly attached, or the
    /// resend interval elapsed since the vessel's last broadcast.
    pub fn is_due(&self, vessel: &VesselRecord, new_client: bool, now: DateTime<Utc>) -> bool {
        if new_client {
            return true;
        }
        match self.fingerprints.get(&vessel.mmsi) {
            None => true,
            Some(previous) if *previous != vessel.fingerprint() => true,
            Some(_) => match self.last_broadcast.get(&vessel.mmsi) {
                None => true,
                Some(last) => now - *last > self.resend_interval,
            },
        }
    }

    pub fn mark_sent(&mut self, vessel: &VesselRecord, now: DateTime<Utc>) {
        self.fingerprints.insert(vessel.mmsi, vessel.fingerprint());
        self.last_broadcast.insert(vessel.mmsi, now);
    }

    /// The UDP forwarder runs on one shared interval. When it elapses, every
    /// vessel with a fresh enough fix goes out in a single burst.
    pub fn forward_cycle_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_forwarded {
            None => true,
            Some(last) => now - last >= self.forward_interval,
        }
    }

    /// Forwardable this cycle: the shared interval elapsed and the fix is
    /// fresh enough to be worth relaying.
    pub fn forward_due(&self, vessel: &VesselRecord, now: DateTime<Utc>) -> bool {
        if !self.forward_cycle_due(now) {
            return false;
        }
        vessel
            .navigation
            .position
            .as_ref()
            .and_then(|p| p.age(now))
            .is_some_and(|age| age <= FORWARD_MAX_POSITION_AGE)
    }

    pub fn mark_forwarded(&mut self, now: DateTime<Utc>) {
        self.last_forwarded = Some(now);
    }

    /// Drops bookkeeping for vessels no longer in the filtered set, keeping
    /// the maps bounded as transient vessels drop off.
    pub fn purge(&mut self, live: &HashSet<Mmsi>) {
        self.fingerprints.retain(|mmsi, _| live.contains(mmsi));
        self.last_broadcast.retain(|mmsi, _| live.contains(mmsi));
    }

    pub fn tracked(&self) -> usize {
        self.fingerprints.len()
    }
}
