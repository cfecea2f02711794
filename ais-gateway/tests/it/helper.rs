use std::{net::SocketAddr, time::Duration};

use ais_codec::EncoderConfig;
use ais_gateway::{
    settings::{
        BroadcastSettings, CloudSettings, Environment, FilterSettings, Settings, SignalkSettings,
    },
    startup::App,
};
use tokio::sync::oneshot;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub struct TestHelper {
    pub tcp_addr: SocketAddr,
    pub ws_addr: Option<SocketAddr>,
    #[allow(dead_code)]
    pub mock: MockServer,
    /// Resolves the app's shutdown future when sent.
    pub shutdown: oneshot::Sender<()>,
}

pub struct SpawnOptions {
    pub websocket: bool,
    pub debug_mmsi: Option<u32>,
    /// Number of initial `/vessels` polls answered with a 500.
    pub primary_failures: u64,
    pub cloud_vessels: Option<serde_json::Value>,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            websocket: false,
            debug_mmsi: None,
            primary_failures: 0,
            cloud_vessels: None,
        }
    }
}

/// A class A vessel with a fresh position, built at call time so staleness
/// checks see a current fix.
pub fn test_vessel(name: &str, callsign: &str) -> serde_json::Value {
    let now = chrono::Utc::now().to_rfc3339();
    serde_json::json!({
        "name": name,
        "communication": {"callsignVhf": callsign},
        "navigation": {
            "position": {
                "value": {"latitude": 51.73784, "longitude": 3.85013},
                "timestamp": now,
                "$source": "gps.0"
            },
            "speedOverGround": {"value": 2.5, "timestamp": now},
            "courseOverGroundTrue": {"value": 1.57, "timestamp": now},
            "state": {"value": "motoring"}
        },
        "design": {
            "length": {"value": {"overall": 12.0}},
            "beam": {"value": 4.0}
        }
    })
}

/// A cloud response with one fresh class A vessel, MMSI 244815000.
pub fn test_cloud_vessels() -> serde_json::Value {
    let now = chrono::Utc::now().to_rfc3339();
    serde_json::json!({
        "vessels": [{
            "mmsi": 244815000u32,
            "name": "CLOUDSHIP",
            "call_sign": "PD7777",
            "last_position": {"latitude": 51.74, "longitude": 3.86, "timestamp": now},
            "latest_navigation": {
                "speed_over_ground": 5.2,
                "course_over_ground": 90.0,
                "timestamp": now
            }
        }]
    })
}

pub async fn spawn_app(vessels: serde_json::Value, websocket: bool) -> TestHelper {
    spawn_app_with(
        vessels,
        SpawnOptions {
            websocket,
            ..Default::default()
        },
    )
    .await
}

pub async fn spawn_app_with(vessels: serde_json::Value, options: SpawnOptions) -> TestHelper {
    let mock = MockServer::start().await;
    if options.primary_failures > 0 {
        // Mounted first so it takes the initial matches, then expires.
        Mock::given(method("GET"))
            .and(path("/vessels"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(options.primary_failures)
            .mount(&mock)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/vessels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vessels))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/vessels/self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mmsi": "244000000",
            "navigation": {
                "position": {
                    "value": {"latitude": 51.73, "longitude": 3.84},
                    "timestamp": chrono::Utc::now().to_rfc3339()
                }
            }
        })))
        .mount(&mock)
        .await;

    let cloud = if let Some(cloud_vessels) = options.cloud_vessels {
        Mock::given(method("GET"))
            .and(path("/api/vessels/nearby"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cloud_vessels))
            .mount(&mock)
            .await;
        Some(CloudSettings {
            api_root: mock.uri(),
            radius_meters: 30_000,
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(5),
        })
    } else {
        None
    };

    // Port 0 disables the websocket listener, so tests that need one grab a
    // free port first.
    let websocket_port = if options.websocket { free_port() } else { 0 };

    let settings = Settings {
        environment: Environment::Test,
        broadcast: BroadcastSettings {
            tcp_port: 0,
            websocket_port,
        },
        update_interval: Duration::from_millis(100),
        resend_interval: Duration::from_secs(900),
        filters: FilterSettings {
            skip_stale_data: false,
            stale_data_threshold: Duration::from_secs(1800),
            stale_name_threshold: Duration::from_secs(600),
            sog_zero_after: Duration::from_secs(600),
            skip_without_callsign: false,
        },
        encoder: EncoderConfig::default(),
        signalk: SignalkSettings {
            api_root: mock.uri(),
            timeout: Duration::from_secs(5),
        },
        cloud,
        forwarder: None,
        debug_mmsi: options.debug_mmsi,
    };

    let app = App::build(settings).await;
    let tcp_addr = app.tcp_addr().unwrap();
    let ws_addr = app.ws_addr();
    let (shutdown, shutdown_rx) = oneshot::channel();
    tokio::spawn(app.run_until(async move {
        let _ = shutdown_rx.await;
    }));

    TestHelper {
        tcp_addr,
        ws_addr,
        mock,
        shutdown,
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
