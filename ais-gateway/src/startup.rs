use std::{
    collections::{HashMap, HashSet},
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use ais_codec::{MessageBuilder, frame_all};
use ais_core::{AisClass, Mmsi, VesselRecord};
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tokio::{net::TcpListener, time::MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    aggregator,
    broadcaster::Broadcaster,
    cloud::CloudClient,
    error::{CodecSnafu, Result},
    models::{self, SkVessel, SkVesselMap},
    scheduler::ChangeScheduler,
    settings::Settings,
    signalk::SignalkClient,
};

pub struct App {
    settings: Settings,
    broadcaster: Arc<Broadcaster>,
    scheduler: ChangeScheduler,
    builder: MessageBuilder,
    signalk: SignalkClient,
    cloud: Option<CloudClient>,
    tcp_listener: Option<TcpListener>,
    ws_listener: Option<TcpListener>,
    own_mmsi: Option<Mmsi>,
    own_position: Option<(f64, f64)>,
    message_id: u8,
}

impl App {
    pub async fn build(settings: Settings) -> App {
        let broadcaster = Arc::new(Broadcaster::new(settings.forwarder.as_ref()).await);
        let signalk = SignalkClient::new(&settings.signalk);
        let cloud = settings.cloud.as_ref().map(CloudClient::new);

        let tcp_listener = bind(settings.broadcast.tcp_port, "tcp").await;
        let ws_listener = if settings.broadcast.websocket_port == 0 {
            None
        } else {
            bind(settings.broadcast.websocket_port, "websocket").await
        };

        let forward_interval = settings
            .forwarder
            .as_ref()
            .map(|f| f.interval)
            .unwrap_or(Duration::from_secs(300));
        let scheduler = ChangeScheduler::new(settings.resend_interval, forward_interval);

        let (own_mmsi, own_position) = match signalk.own_vessel().await {
            Ok(own) => own_identity(&own),
            Err(e) => {
                warn!("could not resolve own vessel yet: {e}");
                (None, None)
            }
        };

        let mut settings = settings;
        if let (Some(debug_mmsi), Some(own)) = (settings.debug_mmsi, own_mmsi)
            && debug_mmsi == own.into_inner()
        {
            warn!("debug_mmsi {debug_mmsi} is the local vessel, ignoring it");
            settings.debug_mmsi = None;
        }

        App {
            builder: MessageBuilder::new(settings.encoder.clone()),
            settings,
            broadcaster,
            scheduler,
            signalk,
            cloud,
            tcp_listener,
            ws_listener,
            own_mmsi,
            own_position,
            message_id: 0,
        }
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn ws_addr(&self) -> Option<SocketAddr> {
        self.ws_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub async fn run(self) {
        self.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    }

    /// Runs the service until `shutdown` resolves, then closes the listening
    /// sockets and drops all clients.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        let mut accept_tasks = Vec::new();
        if let Some(listener) = self.tcp_listener.take() {
            let broadcaster = self.broadcaster.clone();
            accept_tasks.push(tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => broadcaster.register_tcp(stream, addr).await,
                        Err(e) => {
                            warn!("tcp accept failed: {e}");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }));
        }
        if let Some(listener) = self.ws_listener.take() {
            let broadcaster = self.broadcaster.clone();
            accept_tasks.push(tokio::spawn(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, addr)) => {
                            // The handshake awaits the client, keep accepting
                            // meanwhile.
                            let broadcaster = broadcaster.clone();
                            tokio::spawn(
                                async move { broadcaster.register_ws(stream, addr).await },
                            );
                        }
                        Err(e) => {
                            warn!("websocket accept failed: {e}");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }));
        }

        let mut interval = tokio::time::interval(self.settings.update_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = interval.tick() => self.process_cycle().await,
                _ = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
            }
        }

        // Aborting the accept tasks closes the listening sockets.
        for task in &accept_tasks {
            task.abort();
        }
        self.broadcaster.shutdown().await;
    }

    #[instrument(skip_all)]
    pub async fn process_cycle(&mut self) {
        if let Err(e) = self.run_cycle().await {
            error!("update cycle failed: {e:?}");
        }
    }

    async fn run_cycle(&mut self) -> Result<()> {
        let now = Utc::now();

        let anchor = self.own_mmsi.zip(self.own_position);
        let (primary, cloud_vessels) = match (self.cloud.as_ref(), anchor) {
            (Some(cloud), Some((own, (lat, lon)))) => {
                tokio::join!(self.signalk.vessels(), cloud.nearby(lat, lon, own))
            }
            (Some(cloud), None) => (self.signalk.vessels().await, cloud.cached().await),
            (None, _) => (self.signalk.vessels().await, Vec::new()),
        };
        let primary = match primary {
            Ok(map) => self.normalize_primary(map),
            Err(e) => {
                // Cloud vessels, the bookkeeping purge and the counters log
                // still run through a primary outage.
                warn!("primary vessel fetch failed, continuing with an empty set: {e}");
                HashMap::new()
            }
        };
        let cloud_records = cloud_vessels.iter().map(models::vessel_from_cloud).collect();

        let mut merged = aggregator::merge_sources(primary, cloud_records);
        let stale_name_threshold =
            chrono::Duration::from_std(self.settings.filters.stale_name_threshold)
                .unwrap_or_else(|_| chrono::Duration::minutes(10));
        for vessel in &mut merged {
            aggregator::annotate_stale_name(vessel, stale_name_threshold, now);
        }

        let (vessels, stats) =
            aggregator::filter(merged, self.own_mmsi, &self.settings.filters, now);

        self.message_id = (self.message_id + 1) % 10;
        let new_client = self.broadcaster.take_newly_connected();
        let forwarding =
            self.broadcaster.forwarding_enabled() && self.scheduler.forward_cycle_due(now);

        let mut sent = 0;
        let mut unchanged = 0;
        let mut forwarded = 0;
        let mut errors = 0;
        for vessel in &vessels {
            let due = self.scheduler.is_due(vessel, new_client, now);
            // The debug MMSI only turns up per-vessel logging, every vessel
            // is still broadcast.
            if self.settings.debug_mmsi.is_some_and(|d| d == vessel.mmsi.into_inner()) {
                debug!(
                    mmsi = %vessel.mmsi,
                    due,
                    name = ?vessel.name,
                    fingerprint = %vessel.fingerprint(),
                    "debug vessel"
                );
            }
            if due {
                match self.send_vessel(vessel, now).await {
                    Ok(()) => {
                        self.scheduler.mark_sent(vessel, now);
                        sent += 1;
                    }
                    Err(e) => {
                        warn!("skipping vessel {}: {e}", vessel.mmsi);
                        errors += 1;
                    }
                }
            } else {
                unchanged += 1;
            }

            if forwarding && self.scheduler.forward_due(vessel, now) {
                match self.forward_vessel(vessel, now).await {
                    Ok(()) => forwarded += 1,
                    Err(e) => warn!("udp forward of {} failed: {e}", vessel.mmsi),
                }
            }
        }
        if forwarding {
            self.scheduler.mark_forwarded(now);
        }

        let live: HashSet<Mmsi> = vessels.iter().map(|v| v.mmsi).collect();
        self.scheduler.purge(&live);

        let clients = self.broadcaster.client_count().await;
        info!(
            vessels = vessels.len(),
            sent,
            unchanged,
            forwarded,
            errors,
            base_stations = stats.base_stations,
            invalid_mmsi = stats.invalid_mmsi,
            stale = stats.stale,
            sog_zeroed = stats.sog_zeroed,
            no_identity = stats.no_identity,
            no_callsign = stats.no_callsign,
            clients,
            "update cycle complete"
        );

        Ok(())
    }

    /// Deserializes each vessel entry on its own; malformed entries are
    /// logged and skipped. The `self` entry refreshes the own-vessel anchor
    /// for the next cloud query.
    fn normalize_primary(&mut self, map: SkVesselMap) -> HashMap<Mmsi, VesselRecord> {
        let mut vessels = HashMap::with_capacity(map.len());
        for (key, value) in map {
            if key == "self" {
                if let Ok(own) = serde_json::from_value::<SkVessel>(value) {
                    let (mmsi, position) = own_identity(&own);
                    if mmsi.is_some() {
                        self.own_mmsi = mmsi;
                    }
                    if position.is_some() {
                        self.own_position = position;
                    }
                }
                continue;
            }
            let Some(mmsi) = models::mmsi_from_urn(&key) else {
                continue;
            };
            match serde_json::from_value::<SkVessel>(value) {
                Ok(sk) => {
                    vessels.insert(mmsi, models::vessel_from_signalk(mmsi, &sk));
                }
                Err(e) => warn!("malformed vessel entry {key}: {e}"),
            }
        }
        vessels
    }

    /// Builds and broadcasts every message for one vessel, position reports
    /// before static data.
    async fn send_vessel(&self, vessel: &VesselRecord, now: DateTime<Utc>) -> Result<()> {
        let mut payloads = Vec::with_capacity(3);
        match vessel.ais_class() {
            AisClass::B => {
                payloads.push(
                    self.builder
                        .extended_position_report(vessel, now)
                        .context(CodecSnafu)?,
                );
                let (part_a, part_b) = self
                    .builder
                    .static_data_class_b(vessel)
                    .context(CodecSnafu)?;
                payloads.push(part_a);
                payloads.push(part_b);
            }
            AisClass::A | AisClass::Base => {
                payloads.push(self.builder.position_report(vessel, now).context(CodecSnafu)?);
                let has_callsign = vessel
                    .call_sign
                    .as_deref()
                    .is_some_and(|c| !c.trim().is_empty());
                // Without the callsign filter, static data still goes out
                // with the callsign field left unavailable.
                if has_callsign || !self.settings.filters.skip_without_callsign {
                    payloads.push(
                        self.builder
                            .static_and_voyage(vessel, now)
                            .context(CodecSnafu)?,
                    );
                }
            }
        }

        for payload in &payloads {
            for sentence in frame_all(payload, self.message_id) {
                self.broadcaster.broadcast_sentence(&sentence).await;
            }
        }
        self.broadcaster.broadcast_record(vessel).await;
        Ok(())
    }

    /// The UDP collaborator only takes position reports, always as type 1.
    async fn forward_vessel(&self, vessel: &VesselRecord, now: DateTime<Utc>) -> Result<()> {
        let payload = self.builder.position_report(vessel, now).context(CodecSnafu)?;
        for sentence in frame_all(&payload, self.message_id) {
            self.broadcaster.forward_udp(&sentence).await;
        }
        Ok(())
    }
}

async fn bind(port: u16, kind: &str) -> Option<TcpListener> {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => {
            info!("{kind} listener on port {}", listener.local_addr().map(|a| a.port()).unwrap_or(port));
            Some(listener)
        }
        Err(e) => {
            // Degraded, not fatal: the service keeps running without this
            // listener.
            error!("failed to bind {kind} listener on port {port}: {e}");
            None
        }
    }
}

fn own_identity(own: &SkVessel) -> (Option<Mmsi>, Option<(f64, f64)>) {
    let mmsi = own
        .mmsi
        .as_ref()
        .and_then(|m| m.as_string().parse().ok());
    let position = own.position().map(|p| (p.latitude, p.longitude));
    (mmsi, position)
}
