//! Best-effort geocoding (C6 step 6).
//!
//! On any failure — network, parse, rate limit — the caller proceeds
//! without coordinates; geocoding is never allowed to fail a job. Results
//! are cached by postal code behind a read-mostly `RwLock`, matching the
//! channel-info cache pattern used elsewhere in this workspace rather than
//! an external cache service.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    cache: RwLock<HashMap<String, LatLon>>,
    last_request: RwLock<Option<Instant>>,
    min_interval: Duration,
}

impl GeocodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            cache: RwLock::new(HashMap::new()),
            last_request: RwLock::new(None),
            min_interval: Duration::from_secs(1),
        }
    }

    /// Look up a postal code's coordinates, returning `None` on any failure
    /// rather than propagating an error — callers never block enrichment
    /// on geocoding.
    pub async fn lookup(&self, postal_code: &str) -> Option<LatLon> {
        if let Some(cached) = self.cache.read().ok()?.get(postal_code).copied() {
            return Some(cached);
        }

        self.wait_for_rate_limit().await;

        let result = self
            .http
            .get(&self.base_url)
            .query(&[("q", postal_code), ("format", "json"), ("countrycodes", "sg")])
            .header("User-Agent", "tutordex-aggregator")
            .send()
            .await
            .ok()?
            .json::<Vec<NominatimResult>>()
            .await
            .ok()?;

        let first = result.into_iter().next()?;
        let lat: f64 = first.lat.parse().ok()?;
        let lon: f64 = first.lon.parse().ok()?;
        let coords = LatLon { lat, lon };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(postal_code.to_string(), coords);
        }

        debug!(postal_code, "Geocoded postal code");
        Some(coords)
    }

    async fn wait_for_rate_limit(&self) {
        let wait_for = {
            let guard = self.last_request.read().unwrap();
            guard
                .map(|last| self.min_interval.saturating_sub(last.elapsed()))
                .unwrap_or_default()
        };
        if !wait_for.is_zero() {
            tokio::time::sleep(wait_for).await;
        }
        *self.last_request.write().unwrap() = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_skips_the_network() {
        let client = GeocodeClient::new("http://127.0.0.1:1/unreachable");
        client
            .cache
            .write()
            .unwrap()
            .insert("570123".to_string(), LatLon { lat: 1.35, lon: 103.85 });

        let result = client.lookup("570123").await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_none_not_a_panic() {
        let client = GeocodeClient::new("http://127.0.0.1:1/unreachable");
        let result = client.lookup("999999").await;
        assert!(result.is_none());
    }
}
