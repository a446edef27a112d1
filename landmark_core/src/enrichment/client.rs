//! MediaWiki action API client

use super::{LocationEnricher, extraction};
use crate::error::{Result, ServiceError, ServiceKind};
use crate::landmark::{Coordinates, EnrichedLocationData, NearbyPlace};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace, warn};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Default encyclopedia endpoint
pub const DEFAULT_ENRICHMENT_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

/// Hard cap on the nearby-places list
pub const MAX_NEARBY_PLACES: usize = 5;

// MediaWiki rejects geosearch radii above this
const MAX_GEOSEARCH_RADIUS_M: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Results requested from the title search
    pub search_limit: usize,
    /// Radius for the nearby-places search and for resolving by position
    pub nearby_radius_m: u32,
    pub user_agent: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENRICHMENT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            search_limit: 5,
            nearby_radius_m: MAX_GEOSEARCH_RADIUS_M,
            user_agent: concat!("landmark-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    query: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct GeoQuery {
    #[serde(default)]
    geosearch: Vec<GeoHit>,
}

#[derive(Debug, Deserialize)]
struct GeoHit {
    pageid: u64,
    title: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    dist: f64,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extract: String,
    thumbnail: Option<Thumbnail>,
    #[serde(default)]
    coordinates: Vec<PageCoordinates>,
    #[serde(default)]
    categories: Vec<CategoryRef>,
    fullurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct PageCoordinates {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct CategoryRef {
    title: String,
}

/// Enricher backed by a MediaWiki installation (Wikipedia by default)
pub struct WikipediaClient {
    config: EnrichmentConfig,
    http: Client,
}

impl WikipediaClient {
    pub fn new(config: EnrichmentConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                ServiceError::from_transport(ServiceKind::Enrichment, e, config.request_timeout)
            })?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T> {
        let started = Instant::now();
        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                ServiceError::from_transport(ServiceKind::Enrichment, e, self.config.request_timeout)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::http_status(ServiceKind::Enrichment, status.as_u16(), &text).into());
        }

        let parsed: QueryResponse<T> = response.json().await.map_err(|e| {
            ServiceError::invalid_response(ServiceKind::Enrichment, e.to_string())
        })?;
        trace!("Enrichment query took {:?}", started.elapsed());

        if let Some(error) = parsed.error {
            return Err(ServiceError::upstream(
                ServiceKind::Enrichment,
                format!("{}: {}", error.code, error.info),
            )
            .into());
        }
        parsed.query.ok_or_else(|| {
            ServiceError::invalid_response(ServiceKind::Enrichment, "response has no query block")
                .into()
        })
    }

    /// Free-text search by title, best match first
    async fn search_titles(&self, name: &str) -> Result<Vec<SearchHit>> {
        let query: SearchQuery = self
            .query(&[
                ("list", "search".to_string()),
                ("srsearch", name.to_string()),
                ("srlimit", self.config.search_limit.to_string()),
            ])
            .await?;
        Ok(query.search)
    }

    async fn geosearch(&self, center: Coordinates, radius_m: u32, limit: usize) -> Result<Vec<GeoHit>> {
        let radius = radius_m.clamp(10, MAX_GEOSEARCH_RADIUS_M);
        let query: GeoQuery = self
            .query(&[
                ("list", "geosearch".to_string()),
                ("gscoord", format!("{}|{}", center.latitude, center.longitude)),
                ("gsradius", radius.to_string()),
                ("gslimit", limit.max(1).to_string()),
            ])
            .await?;
        Ok(query.geosearch)
    }

    async fn page(&self, page_id: u64) -> Result<Option<Page>> {
        let query: PagesQuery = self
            .query(&[
                ("prop", "extracts|pageimages|coordinates|categories|info".to_string()),
                ("pageids", page_id.to_string()),
                ("explaintext", "1".to_string()),
                ("piprop", "thumbnail".to_string()),
                ("pithumbsize", "640".to_string()),
                ("inprop", "url".to_string()),
                ("clshow", "!hidden".to_string()),
                ("cllimit", "20".to_string()),
                ("redirects", "1".to_string()),
            ])
            .await?;
        Ok(query.pages.into_iter().find(|page| !page.missing))
    }

    async fn nearby_titles(&self, center: Coordinates, exclude: &str) -> Vec<String> {
        match self
            .geosearch(center, self.config.nearby_radius_m, MAX_NEARBY_PLACES + 1)
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| hit.title)
                .filter(|title| title != exclude)
                .take(MAX_NEARBY_PLACES)
                .collect(),
            Err(e) => {
                warn!("Nearby search around '{exclude}' failed: {e}");
                Vec::new()
            }
        }
    }

    fn fallback_url(&self, title: &str) -> String {
        let base = self
            .config
            .endpoint
            .strip_suffix("/w/api.php")
            .unwrap_or(&self.config.endpoint);
        format!("{base}/wiki/{}", title.replace(' ', "_"))
    }

    fn build_record(&self, page: Page, coordinates: Option<Coordinates>, nearby: Vec<String>) -> EnrichedLocationData {
        let categories: Vec<String> = page
            .categories
            .into_iter()
            .map(|c| c.title.trim_start_matches("Category:").to_string())
            .collect();
        let text = page.extract;
        let url = page
            .fullurl
            .unwrap_or_else(|| self.fallback_url(&page.title));

        EnrichedLocationData {
            short_description: extraction::short_description(&text),
            cultural_significance: extraction::cultural_significance(&text),
            historical_context: extraction::historical_context(&text),
            best_time_to_visit: extraction::best_time_to_visit(&text),
            accessibility: extraction::accessibility(&text),
            activities: extraction::activities(&categories, &text),
            title: page.title,
            description: text,
            coordinates,
            categories,
            thumbnail: page.thumbnail.map(|t| t.source),
            url,
            nearby_places: nearby,
            last_updated: Utc::now(),
        }
    }
}

#[async_trait]
impl LocationEnricher for WikipediaClient {
    async fn resolve(
        &self,
        name: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<Option<EnrichedLocationData>> {
        let mut page_id = self.search_titles(name).await?.first().map(|hit| hit.pageid);

        if page_id.is_none()
            && let Some(center) = coordinates
        {
            debug!("No title match for '{name}', trying proximity search");
            page_id = self
                .geosearch(center, self.config.nearby_radius_m, 1)
                .await?
                .first()
                .map(|hit| hit.pageid);
        }

        let Some(page_id) = page_id else {
            debug!("No enrichment found for '{name}'");
            return Ok(None);
        };
        let Some(page) = self.page(page_id).await? else {
            return Ok(None);
        };

        let coordinates = page
            .coordinates
            .first()
            .map(|c| Coordinates::new(c.lat, c.lon))
            .or(coordinates);
        let nearby = match coordinates {
            Some(center) => self.nearby_titles(center, &page.title).await,
            None => Vec::new(),
        };

        debug!("Resolved '{name}' to '{}'", page.title);
        Ok(Some(self.build_record(page, coordinates, nearby)))
    }

    async fn nearby(&self, center: Coordinates, radius_m: u32, limit: usize) -> Result<Vec<NearbyPlace>> {
        let mut places: Vec<NearbyPlace> = self
            .geosearch(center, radius_m, limit)
            .await?
            .into_iter()
            .map(|hit| NearbyPlace {
                title: hit.title,
                page_id: Some(hit.pageid),
                coordinates: Coordinates::new(hit.lat, hit.lon),
                distance_m: hit.dist,
            })
            .collect();
        places.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(places)
    }

    fn is_ready(&self) -> bool {
        self.config.endpoint.starts_with("http")
    }
}
