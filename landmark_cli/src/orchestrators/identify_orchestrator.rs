//! Identify command orchestrator
//!
//! Turns command-line inputs (files, directories, URLs) into image sources,
//! runs them through the recognition service and renders the results.

use crate::config::AppConfig;
use crate::error::{CliError, CliResult, ErrorContext as _};
use crate::file_discovery::{FileDiscoveryOptions, discover_files, is_image_path};
use crate::progress::{format_confidence, format_duration, render_progress};
use anyhow::Context;
use colored::*;
use landmark_core::{
    ChannelProvider, ErrorContext, ImageSource, NullProvider, ProgressProvider, ProgressUpdate,
    RecognitionOptions, RecognitionResult, RecognitionService, RequestPriority, RequestQueue,
    SharedProvider,
};
use log::{debug, warn};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Output format for recognition results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifyOptions {
    pub recognition: RecognitionOptions,
    pub discovery: FileDiscoveryOptions,
    pub format: OutputFormat,
    pub show_progress: bool,
}

/// One input resolved to a recognizable source
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub label: String,
    pub source: ImageSource,
}

/// The result for one input
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyOutcome {
    pub input: String,
    pub result: RecognitionResult,
}

/// Totals for a multi-image run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub identified: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub fallbacks: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[IdentifyOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            let result = &outcome.result;
            if result.success {
                summary.identified += 1;
            } else {
                summary.failed += 1;
            }
            if result.cache_used {
                summary.cache_hits += 1;
            }
            if result.fallback_used {
                summary.fallbacks += 1;
            }
        }
        summary
    }
}

pub struct IdentifyOrchestrator {
    service: Arc<RecognitionService>,
    queue: RequestQueue,
}

impl IdentifyOrchestrator {
    pub fn new(service: Arc<RecognitionService>, queue: RequestQueue) -> Self {
        Self { service, queue }
    }

    /// Build the recognition service from the loaded configuration
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let service = RecognitionService::from_config(config.to_client_config())
            .await
            .context("Failed to create recognition service")?;
        Ok(Self::new(Arc::new(service), RequestQueue::default()))
    }

    pub fn service(&self) -> &RecognitionService {
        &self.service
    }

    /// Expand the command-line inputs into image sources
    ///
    /// URLs pass through, directories are scanned, and a missing path is a
    /// usage error.
    pub fn resolve_inputs(
        &self,
        inputs: &[String],
        discovery: &FileDiscoveryOptions,
    ) -> CliResult<Vec<ResolvedInput>> {
        let mut resolved = Vec::new();

        for input in inputs {
            if input.starts_with("http://") || input.starts_with("https://") {
                resolved.push(ResolvedInput {
                    label: input.clone(),
                    source: ImageSource::Url(input.clone()),
                });
                continue;
            }

            let path = Path::new(input);
            if path.is_file() {
                if !is_image_path(path) {
                    warn!("{input} does not look like an image, sending it anyway");
                }
                resolved.push(ResolvedInput {
                    label: input.clone(),
                    source: ImageSource::File(path.to_path_buf()),
                });
            } else if path.is_dir() {
                let files = discover_files(path, discovery.clone())
                    .map_err(|e| CliError::usage(&e.to_string()).with_context("path", input))?;
                if files.is_empty() {
                    warn!("No images found in {}", path.display());
                }
                debug!("Discovered {} image(s) in {}", files.len(), path.display());
                resolved.extend(files.into_iter().map(|file| ResolvedInput {
                    label: file.path.display().to_string(),
                    source: ImageSource::File(file.path),
                }));
            } else {
                return Err(CliError::from_io_error(
                    io::Error::new(io::ErrorKind::NotFound, "no such file or directory"),
                    input,
                ));
            }
        }

        Ok(resolved)
    }

    /// Recognize every input, in input order
    pub async fn identify(
        &self,
        inputs: &[String],
        options: &IdentifyOptions,
    ) -> CliResult<Vec<IdentifyOutcome>> {
        let resolved = self.resolve_inputs(inputs, &options.discovery)?;

        match resolved.as_slice() {
            [] => Ok(Vec::new()),
            [single] => {
                let outcome = self.identify_one(single.clone(), options).await;
                Ok(vec![outcome])
            }
            _ => Ok(self.identify_batch(resolved, options).await),
        }
    }

    async fn identify_one(&self, input: ResolvedInput, options: &IdentifyOptions) -> IdentifyOutcome {
        let result = if options.show_progress {
            let (provider, rx) = ChannelProvider::channel(64);
            let renderer = tokio::spawn(render_progress(rx));
            let result = self
                .service
                .recognize_landmark_with_progress(input.source, options.recognition.clone(), &provider)
                .await;
            provider.complete();
            let _ = tokio::time::timeout(Duration::from_millis(100), renderer).await;
            result
        } else {
            self.service
                .recognize_landmark(input.source, options.recognition.clone())
                .await
        };

        IdentifyOutcome {
            input: input.label,
            result,
        }
    }

    /// Queue every input at medium priority and collect results in order
    async fn identify_batch(
        &self,
        inputs: Vec<ResolvedInput>,
        options: &IdentifyOptions,
    ) -> Vec<IdentifyOutcome> {
        let total = inputs.len();
        let (provider, renderer) = if options.show_progress {
            let (channel, rx) = ChannelProvider::channel(total * 8 + 8);
            (
                SharedProvider::new(Arc::new(channel)),
                Some(tokio::spawn(render_progress(rx))),
            )
        } else {
            (SharedProvider::new(Arc::new(NullProvider)), None)
        };

        let pending: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let service = Arc::clone(&self.service);
                let recognition = options.recognition.clone();
                let progress = provider.clone();
                let source = input.source;
                let queued = self.queue.enqueue(RequestPriority::Medium, async move {
                    service
                        .recognize_landmark_with_progress(source, recognition, &progress)
                        .await
                });
                (input.label, queued)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        for (index, (label, queued)) in pending.into_iter().enumerate() {
            let result = match queued.wait().await {
                Ok(result) => result,
                Err(e) => {
                    let mut context = ErrorContext::new();
                    context.insert("source".to_string(), label.clone());
                    RecognitionResult::failed(self.service.classifier().classify_error(&e, context))
                }
            };
            provider.report(ProgressUpdate::Batch {
                current: index + 1,
                total,
                current_item: Some(label.clone()),
            });
            outcomes.push(IdentifyOutcome {
                input: label,
                result,
            });
        }

        provider.complete();
        if let Some(renderer) = renderer {
            let _ = tokio::time::timeout(Duration::from_millis(100), renderer).await;
        }
        outcomes
    }
}

/// Write outcomes in the requested format
pub fn render<W: Write>(
    outcomes: &[IdentifyOutcome],
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => {
            for outcome in outcomes {
                write_human(outcome, out)?;
            }
        }
        OutputFormat::Json => {
            let json = match outcomes {
                [single] => serde_json::to_string_pretty(single)?,
                many => serde_json::to_string_pretty(many)?,
            };
            writeln!(out, "{json}")?;
        }
        OutputFormat::Csv => write_csv(outcomes, out)?,
    }
    Ok(())
}

fn write_human<W: Write>(outcome: &IdentifyOutcome, out: &mut W) -> io::Result<()> {
    let result = &outcome.result;

    let Some(landmark) = &result.landmark else {
        let message = result
            .error
            .as_ref()
            .map(|e| e.user_message.as_str())
            .unwrap_or("Recognition failed");
        writeln!(out, "{} {}: {}", "✗".red(), outcome.input, message)?;
        if let Some(error) = &result.error {
            for suggestion in error.visible_suggestions() {
                writeln!(out, "    • {suggestion}")?;
            }
        }
        return Ok(());
    };

    writeln!(
        out,
        "{} {} ({})",
        "✓".green(),
        landmark.name.bold(),
        format_confidence(result.confidence)
    )?;
    writeln!(out, "  {}: {}", "Image".dimmed(), outcome.input)?;

    let coordinates = result
        .location
        .as_ref()
        .and_then(|l| l.coordinates)
        .or(landmark.coordinates);
    if let Some(position) = coordinates {
        writeln!(
            out,
            "  {}: {:.5}, {:.5}",
            "Location".bold(),
            position.latitude,
            position.longitude
        )?;
    }

    if let Some(location) = &result.location {
        if !location.short_description.is_empty() {
            writeln!(out, "  {}", location.short_description)?;
        }
        writeln!(out, "  {}: {}", "More".bold(), location.url.cyan())?;
        if let Some(history) = &location.historical_context {
            writeln!(out, "  {}: {}", "History".bold(), history)?;
        }
        if let Some(culture) = &location.cultural_significance {
            writeln!(out, "  {}: {}", "Significance".bold(), culture)?;
        }
        if let Some(when) = &location.best_time_to_visit {
            writeln!(out, "  {}: {}", "When to visit".bold(), when)?;
        }
        if let Some(activities) = &location.activities {
            writeln!(out, "  {}: {}", "Activities".bold(), activities.join(", "))?;
        }
        if !location.nearby_places.is_empty() {
            writeln!(out, "  {}: {}", "Nearby".bold(), location.nearby_places.join(", "))?;
        }
    }

    let mut notes = vec![format_duration(result.processing_time)];
    if result.cache_used {
        notes.push("cached".to_string());
    }
    if result.fallback_used {
        notes.push("nearest place to your position".to_string());
    }
    writeln!(out, "  {}", notes.join(" • ").dimmed())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    input: &'a str,
    success: bool,
    landmark: &'a str,
    confidence: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    url: &'a str,
    cache_used: bool,
    fallback_used: bool,
    processing_ms: u128,
    error_code: &'a str,
    error_message: &'a str,
}

fn write_csv<W: Write>(outcomes: &[IdentifyOutcome], out: &mut W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for outcome in outcomes {
        let result = &outcome.result;
        let position = result
            .location
            .as_ref()
            .and_then(|l| l.coordinates)
            .or_else(|| result.landmark.as_ref().and_then(|l| l.coordinates));
        writer.serialize(CsvRow {
            input: &outcome.input,
            success: result.success,
            landmark: result.landmark_name().unwrap_or_default(),
            confidence: format!("{:.1}", result.confidence),
            latitude: position.map(|p| p.latitude),
            longitude: position.map(|p| p.longitude),
            url: result.location.as_ref().map(|l| l.url.as_str()).unwrap_or_default(),
            cache_used: result.cache_used,
            fallback_used: result.fallback_used,
            processing_ms: result.processing_time.as_millis(),
            error_code: result.error.as_ref().map(|e| e.code.as_str()).unwrap_or_default(),
            error_message: result
                .error
                .as_ref()
                .map(|e| e.user_message.as_str())
                .unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Print the totals of a multi-image run to stderr
pub fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    eprintln!();
    eprintln!("{}", "Summary:".bold().green());
    eprintln!("Images processed: {}", summary.total);
    eprintln!("Identified: {}", summary.identified.to_string().green());
    if summary.failed > 0 {
        eprintln!("Failed: {}", summary.failed.to_string().red());
    }
    eprintln!("Cache hits: {}", summary.cache_hits);
    if summary.fallbacks > 0 {
        eprintln!("Nearby fallbacks: {}", summary.fallbacks);
    }
    eprintln!("Total time: {}", format_duration(elapsed));
}

/// The run's exit status: the first failure decides the error
pub fn outcome_status(outcomes: &[IdentifyOutcome]) -> CliResult<()> {
    let failure = outcomes
        .iter()
        .find_map(|outcome| outcome.result.error.as_ref().map(|e| (outcome, e)));
    match failure {
        Some((outcome, details)) if outcomes.len() == 1 => {
            Err(CliError::from(details).with_context("input", &outcome.input))
        }
        Some((_, details)) => {
            let failed = outcomes.iter().filter(|o| !o.result.success).count();
            Err(CliError::from(details)
                .with_context("failed", &format!("{failed} of {}", outcomes.len())))
        }
        None => Ok(()),
    }
}

/// Run the identify command end to end, writing results to stdout
pub async fn run(
    orchestrator: &IdentifyOrchestrator,
    inputs: &[String],
    options: &IdentifyOptions,
) -> CliResult<()> {
    let started = Instant::now();
    let outcomes = orchestrator.identify(inputs, options).await?;

    if outcomes.is_empty() {
        eprintln!("{}", "No matching images found.".yellow());
        return Ok(());
    }

    let stdout = io::stdout();
    render(&outcomes, options.format, &mut stdout.lock())?;

    if outcomes.len() > 1 {
        print_summary(&BatchSummary::from_outcomes(&outcomes), started.elapsed());
    }

    let metrics = orchestrator.service().metrics();
    let performance = orchestrator.service().performance();
    debug!(
        "Session: {} call(s), {:.0}% success, average {:?}; image {:?}, api {:?}, cache hit rate {:.0}%",
        metrics.total,
        metrics.success_rate(),
        metrics.average_duration,
        performance.avg_image_processing,
        performance.avg_api_call,
        performance.cache_hit_rate
    );
    outcome_status(&outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use landmark_core::{DetectedLandmark, ErrorClassifier, Provenance};

    fn identified(name: &str, cached: bool) -> IdentifyOutcome {
        let landmark = DetectedLandmark::new(name, 91.0, None, Provenance::Primary);
        let mut result = RecognitionResult::recognized(landmark, None, false);
        result.cache_used = cached;
        IdentifyOutcome {
            input: format!("{name}.jpg"),
            result,
        }
    }

    fn missed(input: &str) -> IdentifyOutcome {
        let details = ErrorClassifier::new().no_landmark("No landmark detected", ErrorContext::new());
        IdentifyOutcome {
            input: input.to_string(),
            result: RecognitionResult::failed(details),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![identified("Taj Mahal", true), identified("Red Fort", false), missed("blur.jpg")];
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(
            summary,
            BatchSummary {
                total: 3,
                identified: 2,
                failed: 1,
                cache_hits: 1,
                fallbacks: 0,
            }
        );
    }

    #[test]
    fn test_render_json_single_is_object() {
        let mut out = Vec::new();
        render(&[identified("Taj Mahal", false)], OutputFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["input"], "Taj Mahal.jpg");
        assert_eq!(value["result"]["success"], true);
    }

    #[test]
    fn test_render_csv_has_header_and_rows() {
        let mut out = Vec::new();
        render(&[identified("Taj Mahal", false), missed("blur.jpg")], OutputFormat::Csv, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("input,success,landmark,confidence"));
        assert!(lines[1].contains("Taj Mahal,91.0"));
        assert!(lines[2].contains("NO_LANDMARK_DETECTED"));
    }

    #[test]
    fn test_render_human_failure_shows_suggestions() {
        let mut out = Vec::new();
        render(&[missed("blur.jpg")], OutputFormat::Human, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("blur.jpg"));
        assert!(text.contains("•"));
    }

    #[test]
    fn test_outcome_status() {
        assert!(outcome_status(&[identified("Taj Mahal", false)]).is_ok());

        let err = outcome_status(&[missed("blur.jpg")]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::ExitCode::NoLandmark);

        let err = outcome_status(&[identified("Taj Mahal", false), missed("blur.jpg")]).unwrap_err();
        assert!(err.context().iter().any(|(k, v)| k == "failed" && v == "1 of 2"));
    }
}
