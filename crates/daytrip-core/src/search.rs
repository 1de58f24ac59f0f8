//! Location lookup for cities and addresses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use daytrip_schema::{BoundingBox, LocationCandidate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::SearchConfig;

/// Shorter queries return nothing without a request.
pub const MIN_QUERY_CHARS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Restricts results to this area.
    pub viewbox: Option<BoundingBox>,
    /// Appended to the text, e.g. the trip's city when looking up a
    /// lodging address.
    pub city: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn within(mut self, viewbox: Option<BoundingBox>) -> Self {
        self.viewbox = viewbox;
        self
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        let city = city.into();
        self.city = (!city.trim().is_empty()).then_some(city);
        self
    }

    pub fn is_searchable(&self) -> bool {
        self.text.trim().chars().count() >= MIN_QUERY_CHARS
    }

    /// The text actually sent to the search service.
    pub fn full_text(&self) -> String {
        let text = self.text.trim();
        match self.city.as_deref().map(str::trim) {
            Some(city) if !city.is_empty() => format!("{text}, {city}"),
            _ => text.to_string(),
        }
    }
}

#[async_trait]
pub trait LocationSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<LocationCandidate>>;
}

pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    limit: u32,
    user_agent: String,
    accept_language: String,
}

impl NominatimClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limit: config.limit,
            user_agent: config.user_agent.clone(),
            accept_language: config.accept_language.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: serde_json::Value,
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
}

impl NominatimPlace {
    fn into_candidate(self) -> Option<LocationCandidate> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lng = self.lon.trim().parse::<f64>().ok()?;
        let id = match self.place_id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        Some(LocationCandidate {
            id,
            name: self.display_name,
            lat,
            lng,
            bounding_box: self.boundingbox.as_deref().and_then(parse_bounding_box),
        })
    }
}

/// Nominatim orders a bounding box as `[lat_min, lat_max, lon_min, lon_max]`.
fn parse_bounding_box(raw: &[String]) -> Option<BoundingBox> {
    let values: Vec<f64> = raw
        .iter()
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match values[..] {
        [lat_min, lat_max, lon_min, lon_max] => Some(BoundingBox {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }),
        _ => None,
    }
}

/// `left,top,right,bottom`, the order the viewbox parameter expects.
fn viewbox_param(b: &BoundingBox) -> String {
    format!("{},{},{},{}", b.lon_min, b.lat_max, b.lon_max, b.lat_min)
}

#[async_trait]
impl LocationSearch for NominatimClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<LocationCandidate>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }

        let mut params = vec![
            ("format", "json".to_string()),
            ("q", query.full_text()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(viewbox) = &query.viewbox {
            params.push(("viewbox", viewbox_param(viewbox)));
            params.push(("bounded", "1".to_string()));
        }

        let url = format!("{}/search", self.base_url);
        debug!(url = %url, q = %query.full_text(), "location search");
        let resp = self
            .client
            .get(&url)
            .query(&params)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Language", &self.accept_language)
            .send()
            .await
            .context("location search request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("location search error ({status}): {text}"));
        }

        let places: Vec<NominatimPlace> = resp
            .json()
            .await
            .context("invalid location search response")?;
        let total = places.len();
        let candidates: Vec<LocationCandidate> = places
            .into_iter()
            .filter_map(NominatimPlace::into_candidate)
            .collect();
        if candidates.len() < total {
            warn!(dropped = total - candidates.len(), "location results without usable coordinates");
        }
        Ok(candidates)
    }
}

/// Waits out a quiet period before searching; a newer query supersedes
/// every older one still waiting or in flight.
pub struct DebouncedSearch {
    inner: Arc<dyn LocationSearch>,
    delay: Duration,
    latest: AtomicU64,
}

impl DebouncedSearch {
    pub fn new(inner: Arc<dyn LocationSearch>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            latest: AtomicU64::new(0),
        }
    }

    /// `Ok(None)` when a newer query arrived in the meantime.
    pub async fn search(&self, query: SearchQuery) -> Result<Option<Vec<LocationCandidate>>> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if !query.is_searchable() {
            return Ok(Some(Vec::new()));
        }

        tokio::time::sleep(self.delay).await;
        if self.latest.load(Ordering::SeqCst) != ticket {
            return Ok(None);
        }
        let results = self.inner.search(&query).await?;
        if self.latest.load(Ordering::SeqCst) != ticket {
            return Ok(None);
        }
        Ok(Some(results))
    }
}
