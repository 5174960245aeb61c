pub mod error;
pub mod types;

pub use error::{OverpassError, Result};
pub use types::{OverpassElement, OverpassPoint, OverpassResponse};

use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Server-side evaluation budget passed in the query header, seconds.
const QUERY_TIMEOUT_SECS: u32 = 25;

/// Client-side HTTP timeout, slightly above the server budget.
const HTTP_TIMEOUT_SECS: u64 = 30;

pub struct OverpassClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OverpassClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("reqwest client");
        Self { client, endpoint }
    }

    /// Fetch parking-lot ways inside the given area ring, with full way
    /// geometry and a precomputed center.
    pub async fn parking_lots(&self, ring: &[(f64, f64)]) -> Result<Vec<OverpassElement>> {
        let poly = poly_filter(ring)?;
        let query = format!(
            "[out:json][timeout:{QUERY_TIMEOUT_SECS}];\
             way[\"amenity\"=\"parking\"](poly:\"{poly}\");\
             out tags geom center;"
        );
        self.run(query).await
    }

    /// Fetch named business POIs (shops, amenities, offices) inside the given
    /// area ring. Ways and relations come back with a center point.
    pub async fn businesses(&self, ring: &[(f64, f64)], max: usize) -> Result<Vec<OverpassElement>> {
        let poly = poly_filter(ring)?;
        let query = format!(
            "[out:json][timeout:{QUERY_TIMEOUT_SECS}];\
             (nwr[\"shop\"][\"name\"](poly:\"{poly}\");\
              nwr[\"amenity\"][\"name\"](poly:\"{poly}\");\
              nwr[\"office\"][\"name\"](poly:\"{poly}\"););\
             out tags center {max};"
        );
        self.run(query).await
    }

    async fn run(&self, query: String) -> Result<Vec<OverpassElement>> {
        tracing::debug!(endpoint = %self.endpoint, "Running Overpass query");
        let resp = self
            .client
            .post(&self.endpoint)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OverpassError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: OverpassResponse = resp.json().await?;
        Ok(parsed.elements)
    }
}

impl Default for OverpassClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `poly:` filter value from a lat/lng ring:
/// space-separated `lat lng` pairs.
fn poly_filter(ring: &[(f64, f64)]) -> Result<String> {
    if ring.len() < 3 {
        return Err(OverpassError::InvalidQuery(format!(
            "polygon filter needs at least 3 points, got {}",
            ring.len()
        )));
    }
    Ok(ring
        .iter()
        .map(|(lat, lng)| format!("{lat} {lng}"))
        .collect::<Vec<_>>()
        .join(" "))
}
