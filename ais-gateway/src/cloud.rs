use ais_core::Mmsi;
use reqwest::{Client, StatusCode};
use snafu::ResultExt;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::{
    error::{FailedRequestSnafu, RequestSnafu, Result},
    models::{CloudResponse, CloudVessel},
    settings::CloudSettings,
};

/// Client for the supplementary cloud vessel source. A failed or timed-out
/// fetch degrades to the last successful snapshot so a slow external API
/// never stalls the update cycle.
#[derive(Debug)]
pub struct CloudClient {
    client: Client,
    api_root: String,
    radius_meters: u32,
    refresh_interval: std::time::Duration,
    last_fetch: Mutex<Option<std::time::Instant>>,
    cache: Mutex<Vec<CloudVessel>>,
}

impl CloudClient {
    pub fn new(settings: &CloudSettings) -> Self {
        Self {
            client: Client::builder()
                .timeout(settings.timeout)
                .build()
                .unwrap_or_default(),
            api_root: settings.api_root.trim_end_matches('/').to_string(),
            radius_meters: settings.radius_meters,
            refresh_interval: settings.interval,
            last_fetch: Mutex::new(None),
            cache: Mutex::new(Vec::new()),
        }
    }

    /// Vessels near the given position. The API is only queried once per
    /// refresh interval; in between, and on any fetch failure, the cached
    /// snapshot is served.
    #[instrument(skip(self))]
    pub async fn nearby(&self, latitude: f64, longitude: f64, own_mmsi: Mmsi) -> Vec<CloudVessel> {
        {
            let last = self.last_fetch.lock().await;
            if last.is_some_and(|t| t.elapsed() < self.refresh_interval) {
                return self.cache.lock().await.clone();
            }
        }
        match self.fetch(latitude, longitude, own_mmsi).await {
            Ok(vessels) => {
                *self.cache.lock().await = vessels.clone();
                *self.last_fetch.lock().await = Some(std::time::Instant::now());
                vessels
            }
            Err(e) => {
                warn!("cloud fetch failed, using cached snapshot: {e}");
                self.cache.lock().await.clone()
            }
        }
    }

    /// The last successful snapshot, for cycles where no fresh query is
    /// possible yet.
    pub async fn cached(&self) -> Vec<CloudVessel> {
        self.cache.lock().await.clone()
    }

    async fn fetch(&self, latitude: f64, longitude: f64, own_mmsi: Mmsi) -> Result<Vec<CloudVessel>> {
        let url = format!(
            "{}/api/vessels/nearby?lat={latitude}&lng={longitude}&radius={}&mmsi={own_mmsi}",
            self.api_root, self.radius_meters,
        );
        let response = self.client.get(&url).send().await.context(RequestSnafu)?;
        match response.status() {
            StatusCode::OK => {
                let body: CloudResponse = response.json().await.context(RequestSnafu)?;
                Ok(body.vessels)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                FailedRequestSnafu { url, status, body }.fail()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn settings(uri: &str) -> CloudSettings {
        CloudSettings {
            api_root: uri.to_string(),
            radius_meters: 30_000,
            interval: std::time::Duration::from_secs(120),
            timeout: std::time::Duration::from_secs(5),
        }
    }

    fn one_vessel() -> serde_json::Value {
        serde_json::json!({"vessels": [{"mmsi": 244_813_000u32, "name": "CLOUDSHIP"}]})
    }

    #[tokio::test]
    async fn snapshot_is_cached_and_served_between_refreshes() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vessels/nearby"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_vessel()))
            .expect(1)
            .mount(&mock)
            .await;

        let client = CloudClient::new(&settings(&mock.uri()));
        assert!(client.cached().await.is_empty());

        let own = Mmsi::new(244_000_000);
        assert_eq!(client.nearby(51.7, 3.8, own).await.len(), 1);
        assert_eq!(client.cached().await.len(), 1);

        // Within the refresh interval the API is not queried again; the
        // mock's expect(1) verifies that on drop.
        assert_eq!(client.nearby(51.7, 3.8, own).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_serves_the_cached_snapshot() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vessels/nearby"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let mut settings = settings(&mock.uri());
        settings.interval = std::time::Duration::ZERO;
        let client = CloudClient::new(&settings);
        assert!(client.nearby(51.7, 3.8, Mmsi::new(244_000_000)).await.is_empty());
    }
}
