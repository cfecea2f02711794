use reqwest::{Client, Response, StatusCode};
use snafu::ResultExt;
use tracing::instrument;

use crate::{
    error::{FailedRequestSnafu, RequestSnafu, Result},
    models::{SkVessel, SkVesselMap},
    settings::SignalkSettings,
};

// Vessels are deserialized per entry so one malformed vessel never poisons
// the whole response, see [`SkVesselMap`].

/// Client for the primary vessel source.
#[derive(Debug, Clone)]
pub struct SignalkClient {
    client: Client,
    api_root: String,
}

impl SignalkClient {
    pub fn new(settings: &SignalkSettings) -> Self {
        Self {
            client: Client::builder()
                .timeout(settings.timeout)
                .build()
                .unwrap_or_default(),
            api_root: settings.api_root.trim_end_matches('/').to_string(),
        }
    }

    /// All vessels currently known to the primary source, keyed by URN.
    /// The map includes the literal `self` entry.
    #[instrument(skip(self))]
    pub async fn vessels(&self) -> Result<SkVesselMap> {
        let url = format!("{}/vessels", self.api_root);
        let response = self.client.get(&url).send().await.context(RequestSnafu)?;
        Self::checked(url, response)
            .await?
            .json()
            .await
            .context(RequestSnafu)
    }

    /// The local vessel, used to exclude it from output and to anchor the
    /// cloud radius query.
    #[instrument(skip(self))]
    pub async fn own_vessel(&self) -> Result<SkVessel> {
        let url = format!("{}/vessels/self", self.api_root);
        let response = self.client.get(&url).send().await.context(RequestSnafu)?;
        Self::checked(url, response)
            .await?
            .json()
            .await
            .context(RequestSnafu)
    }

    async fn checked(url: String, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK => Ok(response),
            status => {
                let body = response.text().await.unwrap_or_default();
                FailedRequestSnafu { url, status, body }.fail()
            }
        }
    }
}
