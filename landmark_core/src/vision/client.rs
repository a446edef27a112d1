//! HTTP client for the landmark detection service

use super::{ImagePayload, LandmarkDetector, landmark_from_text};
use crate::error::{Result, ServiceError, ServiceKind};
use crate::landmark::{Coordinates, DetectedLandmark, Provenance};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, trace};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default `images:annotate` endpoint
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Vision client configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Minimum raw score (0-1) for a landmark annotation to be kept
    pub score_threshold: f64,
    pub request_timeout: Duration,
    /// How many text annotations to request for the text heuristic
    pub max_text_results: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            score_threshold: 0.7,
            request_timeout: Duration::from_secs(30),
            max_text_results: 10,
        }
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [AnnotateImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotations>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageAnnotations {
    #[serde(default)]
    landmark_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    mid: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    locations: Vec<LocationInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationInfo {
    lat_lng: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

/// Landmark detector backed by a remote vision API
pub struct VisionClient {
    config: VisionConfig,
    http: Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::from_transport(ServiceKind::Vision, e, config.request_timeout))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn transport_error(&self, err: reqwest::Error) -> ServiceError {
        ServiceError::from_transport(ServiceKind::Vision, err, self.config.request_timeout)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        trace!("Downloading image from {url}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::http_status(
                ServiceKind::Vision,
                status.as_u16(),
                &format!("image download failed for {url}"),
            )
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    async fn annotate(&self, api_key: &str, content: String, max_results: usize) -> Result<ImageAnnotations> {
        let body = AnnotateRequest {
            requests: [AnnotateImageRequest {
                image: ImageContent { content },
                features: [
                    Feature {
                        kind: "LANDMARK_DETECTION",
                        max_results,
                    },
                    Feature {
                        kind: "TEXT_DETECTION",
                        max_results: self.config.max_text_results,
                    },
                ],
            }],
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.config.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            return Err(ServiceError::http_status(ServiceKind::Vision, status.as_u16(), &message).into());
        }

        let parsed: AnnotateResponse = response.json().await.map_err(|e| {
            ServiceError::invalid_response(ServiceKind::Vision, e.to_string())
        })?;
        trace!("Vision annotate took {:?}", started.elapsed());

        if let Some(error) = parsed.error {
            return Err(upstream_error(error).into());
        }
        let annotations = parsed.responses.into_iter().next().unwrap_or_default();
        if let Some(error) = annotations.error {
            return Err(upstream_error(error).into());
        }
        Ok(annotations)
    }

    fn to_candidates(&self, annotations: ImageAnnotations, max_results: usize) -> Vec<DetectedLandmark> {
        let mut candidates: Vec<DetectedLandmark> = annotations
            .landmark_annotations
            .into_iter()
            .filter(|annotation| annotation.score >= self.config.score_threshold)
            .filter(|annotation| !annotation.description.trim().is_empty())
            .map(|annotation| {
                let coordinates = annotation
                    .locations
                    .iter()
                    .find_map(|location| location.lat_lng.as_ref())
                    .map(|ll| Coordinates::new(ll.latitude, ll.longitude));
                let landmark = DetectedLandmark::new(
                    annotation.description.trim(),
                    annotation.score * 100.0,
                    coordinates,
                    Provenance::Primary,
                );
                match annotation.mid {
                    Some(mid) => landmark.with_mid(mid),
                    None => landmark,
                }
            })
            .collect();

        candidates.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        candidates.truncate(max_results);

        if candidates.is_empty() {
            // the first text annotation holds the full recognized text
            let text = annotations
                .text_annotations
                .first()
                .map(|t| t.description.as_str())
                .unwrap_or_default();
            if let Some(guess) = landmark_from_text(text) {
                debug!("No landmark annotations, guessed '{}' from text", guess.name);
                candidates.push(guess);
            }
        }

        candidates
    }
}

fn upstream_error(status: ApiStatus) -> ServiceError {
    if status.code == 8 || status.message.to_lowercase().contains("quota") {
        // RESOURCE_EXHAUSTED
        ServiceError::RateLimited {
            service: ServiceKind::Vision,
        }
    } else {
        ServiceError::upstream(ServiceKind::Vision, status.message)
    }
}

#[async_trait]
impl LandmarkDetector for VisionClient {
    async fn detect(&self, image: &ImagePayload, max_results: usize) -> Result<Vec<DetectedLandmark>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ServiceError::missing_credential(ServiceKind::Vision))?;

        let content = match image {
            ImagePayload::Bytes(bytes) => STANDARD.encode(bytes),
            ImagePayload::Url(url) => STANDARD.encode(self.download(url).await?),
        };

        let annotations = self.annotate(api_key, content, max_results.max(1)).await?;
        let candidates = self.to_candidates(annotations, max_results.max(1));
        debug!("Vision detected {} candidate(s)", candidates.len());
        Ok(candidates)
    }

    fn is_ready(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|key| !key.is_empty())
            && !self.config.endpoint.is_empty()
    }
}
