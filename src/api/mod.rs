use crate::config::ApiConfig;
use crate::event::{BoundingBox, Domain, DomainRecord};
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Response envelope shared by every REST endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP client for the bulk (non-live) data endpoints.
///
/// Used to seed or resync a domain collection; live deltas are layered on
/// top of whatever this returns.
#[derive(Clone, Debug)]
pub struct BulkFetcher {
    http_client: Client,
    base_url: String,
    version: String,
}

impl BulkFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.version.clone(),
        })
    }

    /// `GET {base}/{version}/{resource}`
    pub fn endpoint(&self, domain: Domain) -> String {
        format!("{}/{}/{}", self.base_url, self.version, domain.resource_path())
    }

    /// Fetch the full current record set for one domain.
    pub async fn fetch(
        &self,
        domain: Domain,
        bounds: Option<&BoundingBox>,
    ) -> Result<Vec<DomainRecord>> {
        let url = self.endpoint(domain);
        let mut request = self.http_client.get(&url);
        if let Some(bounds) = bounds {
            let bounds = serde_json::to_string(bounds).context("Failed to encode bounds")?;
            request = request.query(&[("bounds", bounds)]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", domain))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Bulk fetch for {} failed with HTTP {}", domain, status);
        }

        let body: ApiResponse<Vec<DomainRecord>> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", domain))?;

        let records = unwrap_envelope(body).with_context(|| format!("Bulk fetch for {}", domain))?;
        debug!(domain = %domain, count = records.len(), "Bulk fetch complete");
        Ok(records)
    }
}

fn unwrap_envelope<T>(body: ApiResponse<T>) -> Result<T> {
    if !body.success {
        let reason = body
            .error
            .or(body.message)
            .unwrap_or_else(|| "request unsuccessful".to_string());
        return Err(anyhow!("API error: {}", reason));
    }
    body.data.ok_or_else(|| anyhow!("API response missing data"))
}
