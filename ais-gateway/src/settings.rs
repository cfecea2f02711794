use std::time::Duration;

use ais_codec::EncoderConfig;
use config::{Config, File};
use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{ConfigSnafu, Result};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Development,
    Production,
    Test,
}

impl Environment {
    fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub broadcast: BroadcastSettings,
    #[serde(with = "humantime_serde")]
    pub update_interval: Duration,
    /// Unchanged vessels are still re-sent once this much time has passed
    /// since their last broadcast.
    #[serde(with = "humantime_serde")]
    pub resend_interval: Duration,
    pub filters: FilterSettings,
    pub encoder: EncoderConfig,
    pub signalk: SignalkSettings,
    pub cloud: Option<CloudSettings>,
    pub forwarder: Option<ForwarderSettings>,
    /// Turns up per-vessel logging for one vessel, for on-water debugging.
    /// Broadcast output is unaffected.
    pub debug_mmsi: Option<u32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BroadcastSettings {
    pub tcp_port: u16,
    /// 0 disables the WebSocket listener.
    pub websocket_port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FilterSettings {
    /// Drop vessels whose position is older than `stale_data_threshold`.
    pub skip_stale_data: bool,
    #[serde(with = "humantime_serde")]
    pub stale_data_threshold: Duration,
    /// Position age beyond which the display name gets a staleness suffix.
    #[serde(with = "humantime_serde")]
    pub stale_name_threshold: Duration,
    /// Position age beyond which a reported SOG is forced to zero without
    /// dropping the vessel.
    #[serde(with = "humantime_serde")]
    pub sog_zero_after: Duration,
    pub skip_without_callsign: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SignalkSettings {
    pub api_root: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CloudSettings {
    pub api_root: String,
    pub radius_meters: u32,
    /// How often to actually hit the cloud API; between refreshes the cached
    /// snapshot is served.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ForwarderSettings {
    pub host: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Settings {
    pub fn new() -> Result<Self> {
        let environment = std::env::var("APP_ENVIRONMENT")
            .map(|e| match e.to_lowercase().as_str() {
                "development" => Environment::Development,
                "production" => Environment::Production,
                "test" => Environment::Test,
                _ => Environment::Local,
            })
            .unwrap_or(Environment::Local);

        let dir = std::env::var("AIS_GATEWAY_CONFIG_DIR").unwrap_or_else(|_| "config".into());

        Config::builder()
            .add_source(File::with_name(&format!("{dir}/default")))
            .add_source(File::with_name(&format!("{dir}/{}", environment.as_str())).required(false))
            .add_source(config::Environment::with_prefix("AIS_GATEWAY").separator("__"))
            .set_override("environment", environment.as_str())
            .context(ConfigSnafu)?
            .build()
            .context(ConfigSnafu)?
            .try_deserialize()
            .context(ConfigSnafu)
    }
}
