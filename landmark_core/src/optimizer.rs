//! Image size reduction before upload
//!
//! The optimizer shrinks images so neither side exceeds a maximum dimension
//! and re-encodes them as JPEG. The CPU-bound work runs on one of two
//! execution strategies:
//!
//! - `Background`: tokio's blocking pool, keeping the async workers free
//! - `Inline`: on the calling task
//!
//! A background failure falls back to inline execution, and any processing
//! failure returns the original bytes. Optimization never stops recognition.

use crate::error::{InternalError, Result};
use image::ImageFormat;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::{debug, warn};
use std::sync::Arc;

/// Where the optimization work runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    #[default]
    Background,
    Inline,
}

impl ExecutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Longest allowed side in pixels
    pub max_dimension: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Images at or below this size are left alone unless `compress` is set
    pub max_bytes: usize,
    /// Re-encode even small images
    pub compress: bool,
    pub strategy: ExecutionStrategy,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            quality: 85,
            max_bytes: 1024 * 1024,
            compress: true,
            strategy: ExecutionStrategy::Background,
        }
    }
}

/// Result of an optimization pass
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    /// Output size over input size; 1.0 when unchanged
    pub ratio: f64,
    pub resized: bool,
    /// Detected input format, if recognizable
    pub format: Option<ImageFormat>,
}

impl OptimizedImage {
    fn unchanged(bytes: Vec<u8>, format: Option<ImageFormat>) -> Self {
        Self {
            bytes,
            ratio: 1.0,
            resized: false,
            format,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageOptimizer {
    config: OptimizerConfig,
}

impl ImageOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize `bytes`, falling back to the original on any failure
    pub async fn optimize(&self, bytes: Vec<u8>) -> OptimizedImage {
        let format = image::guess_format(&bytes).ok();
        if bytes.len() <= self.config.max_bytes && !self.config.compress {
            return OptimizedImage::unchanged(bytes, format);
        }

        let source = Arc::new(bytes);
        let outcome = match self.config.strategy {
            ExecutionStrategy::Background => self.run_in_background(Arc::clone(&source)).await,
            ExecutionStrategy::Inline => optimize_bytes(&source, &self.config),
        };

        match outcome {
            Ok(optimized) => {
                debug!(
                    "Optimized image {} -> {} bytes (ratio {:.2}, resized: {})",
                    source.len(),
                    optimized.bytes.len(),
                    optimized.ratio,
                    optimized.resized
                );
                optimized
            }
            Err(e) => {
                warn!("Image optimization failed, sending original: {e}");
                let original = Arc::try_unwrap(source).unwrap_or_else(|shared| (*shared).clone());
                OptimizedImage::unchanged(original, format)
            }
        }
    }

    async fn run_in_background(&self, source: Arc<Vec<u8>>) -> Result<OptimizedImage> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime for background optimization, running inline");
            return optimize_bytes(&source, &self.config);
        };

        let config = self.config.clone();
        let job_source = Arc::clone(&source);
        match handle
            .spawn_blocking(move || optimize_bytes(&job_source, &config))
            .await
        {
            Ok(result) => result,
            Err(join_error) => {
                warn!(
                    "{}",
                    InternalError::task_join("image optimization", join_error.to_string())
                );
                optimize_bytes(&source, &self.config)
            }
        }
    }
}

/// The optimization algorithm itself, independent of where it runs
pub fn optimize_bytes(bytes: &[u8], config: &OptimizerConfig) -> Result<OptimizedImage> {
    let format = image::guess_format(bytes).ok();
    let decoded = image::load_from_memory(bytes)?;

    let max = config.max_dimension.max(1);
    let resized = decoded.width() > max || decoded.height() > max;
    let image = if resized {
        decoded.resize(max, max, FilterType::Triangle)
    } else {
        decoded
    };

    let mut out = Vec::new();
    let quality = config.quality.clamp(1, 100);
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&image.to_rgb8())?;

    if out.len() >= bytes.len() && !resized {
        return Ok(OptimizedImage::unchanged(bytes.to_vec(), format));
    }

    let ratio = if bytes.is_empty() {
        1.0
    } else {
        out.len() as f64 / bytes.len() as f64
    };
    Ok(OptimizedImage {
        bytes: out,
        ratio,
        resized,
        format,
    })
}
