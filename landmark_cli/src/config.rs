use crate::paths;
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use landmark_core::{
    CacheConfig, ClientConfig, Coordinates, EnrichmentConfig, ExecutionStrategy, OptimizerConfig,
    RecognitionOptions, VisionConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment prefix; `LANDMARK_VISION__API_KEY` maps to `vision.api_key`
pub const ENV_PREFIX: &str = "LANDMARK_";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub vision: VisionSection,

    #[serde(default)]
    pub enrichment: EnrichmentSection,

    #[serde(default)]
    pub recognition: RecognitionSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub optimizer: OptimizerSection,

    #[serde(default)]
    pub location: LocationSection,

    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VisionSection {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub score_threshold: f64,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EnrichmentSection {
    /// Overrides the endpoint derived from `language`
    pub endpoint: Option<String>,
    pub language: String,
    pub timeout_secs: u64,
    pub nearby_radius_m: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RecognitionSection {
    pub max_retries: u32,
    pub confidence_threshold: f64,
    pub enable_fallback: bool,
    pub enable_cache: bool,
    pub timeout_ms: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub max_entries: usize,
    pub max_memory_mb: u64,
    pub sweep_interval_secs: u64,
    /// Mirror the cache to disk so it survives restarts
    pub persist: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizerSection {
    pub max_dimension: u32,
    pub quality: u8,
    pub max_bytes: usize,
    pub compress: bool,
    /// Run image work on the blocking pool
    pub background: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LocationSection {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    /// `human`, `json` or `csv`
    pub format: String,
    pub color: bool,
}

impl Default for VisionSection {
    fn default() -> Self {
        let core = VisionConfig::default();
        Self {
            api_key: None,
            endpoint: core.endpoint,
            score_threshold: core.score_threshold,
            timeout_secs: core.request_timeout.as_secs(),
        }
    }
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        let core = EnrichmentConfig::default();
        Self {
            endpoint: None,
            language: "en".to_string(),
            timeout_secs: core.request_timeout.as_secs(),
            nearby_radius_m: core.nearby_radius_m,
        }
    }
}

impl Default for RecognitionSection {
    fn default() -> Self {
        let core = RecognitionOptions::default();
        Self {
            max_retries: core.max_retries,
            confidence_threshold: core.confidence_threshold,
            enable_fallback: core.enable_fallback,
            enable_cache: core.enable_cache,
            timeout_ms: core.timeout.as_millis() as u64,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        let core = CacheConfig::default();
        Self {
            enabled: true,
            max_entries: core.max_entries,
            max_memory_mb: core.max_memory_bytes / (1024 * 1024),
            sweep_interval_secs: core.sweep_interval.as_secs(),
            persist: true,
        }
    }
}

impl Default for OptimizerSection {
    fn default() -> Self {
        let core = OptimizerConfig::default();
        Self {
            max_dimension: core.max_dimension,
            quality: core.quality,
            max_bytes: core.max_bytes,
            compress: core.compress,
            background: core.strategy == ExecutionStrategy::Background,
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: "human".to_string(),
            color: true,
        }
    }
}

impl EnrichmentSection {
    /// The explicit endpoint, or the Wikipedia API for `language`
    pub fn resolved_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.wikipedia.org/w/api.php", self.language),
        }
    }
}

impl LocationSection {
    /// Both coordinates, when set and in range
    pub fn coordinates(&self) -> Option<Coordinates> {
        let position = Coordinates::new(self.latitude?, self.longitude?);
        position.is_valid().then_some(position)
    }
}

impl AppConfig {
    /// Build the core client configuration
    ///
    /// `cache_dir` is only set when persistence is enabled.
    pub fn to_client_config(&self) -> ClientConfig {
        let vision = VisionConfig {
            api_key: self.vision.api_key.clone().filter(|key| !key.is_empty()),
            endpoint: self.vision.endpoint.clone(),
            score_threshold: self.vision.score_threshold,
            request_timeout: Duration::from_secs(self.vision.timeout_secs),
            ..VisionConfig::default()
        };
        let enrichment = EnrichmentConfig {
            endpoint: self.enrichment.resolved_endpoint(),
            request_timeout: Duration::from_secs(self.enrichment.timeout_secs),
            nearby_radius_m: self.enrichment.nearby_radius_m,
            ..EnrichmentConfig::default()
        };
        let cache = CacheConfig {
            max_entries: self.cache.max_entries,
            max_memory_bytes: self.cache.max_memory_mb * 1024 * 1024,
            sweep_interval: Duration::from_secs(self.cache.sweep_interval_secs),
            ..CacheConfig::default()
        };
        let optimizer = OptimizerConfig {
            max_dimension: self.optimizer.max_dimension,
            quality: self.optimizer.quality,
            max_bytes: self.optimizer.max_bytes,
            compress: self.optimizer.compress,
            strategy: if self.optimizer.background {
                ExecutionStrategy::Background
            } else {
                ExecutionStrategy::Inline
            },
        };

        ClientConfig {
            vision,
            enrichment,
            cache,
            optimizer,
            cache_dir: (self.cache.enabled && self.cache.persist).then(paths::get_cache_dir),
            position: self.location.coordinates(),
        }
    }

    /// Set the confidence gate (0-100). The detector's raw score cutoff is
    /// lowered to match so candidates between the two are not dropped early.
    pub fn set_confidence_threshold(&mut self, threshold: f64) {
        self.recognition.confidence_threshold = threshold;
        self.vision.score_threshold = self.vision.score_threshold.min(threshold / 100.0);
    }

    /// Per-call recognition options
    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions {
            max_retries: self.recognition.max_retries,
            confidence_threshold: self.recognition.confidence_threshold,
            enable_fallback: self.recognition.enable_fallback,
            enable_cache: self.cache.enabled && self.recognition.enable_cache,
            timeout: Duration::from_millis(self.recognition.timeout_ms),
            ..RecognitionOptions::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
}

/// Every settable key and the TOML type it is stored as
const KNOWN_KEYS: &[(&str, ValueKind)] = &[
    ("vision.api_key", ValueKind::Text),
    ("vision.endpoint", ValueKind::Text),
    ("vision.score_threshold", ValueKind::Float),
    ("vision.timeout_secs", ValueKind::Integer),
    ("enrichment.endpoint", ValueKind::Text),
    ("enrichment.language", ValueKind::Text),
    ("enrichment.timeout_secs", ValueKind::Integer),
    ("enrichment.nearby_radius_m", ValueKind::Integer),
    ("recognition.max_retries", ValueKind::Integer),
    ("recognition.confidence_threshold", ValueKind::Float),
    ("recognition.enable_fallback", ValueKind::Boolean),
    ("recognition.enable_cache", ValueKind::Boolean),
    ("recognition.timeout_ms", ValueKind::Integer),
    ("cache.enabled", ValueKind::Boolean),
    ("cache.max_entries", ValueKind::Integer),
    ("cache.max_memory_mb", ValueKind::Integer),
    ("cache.sweep_interval_secs", ValueKind::Integer),
    ("cache.persist", ValueKind::Boolean),
    ("optimizer.max_dimension", ValueKind::Integer),
    ("optimizer.quality", ValueKind::Integer),
    ("optimizer.max_bytes", ValueKind::Integer),
    ("optimizer.compress", ValueKind::Boolean),
    ("optimizer.background", ValueKind::Boolean),
    ("location.latitude", ValueKind::Float),
    ("location.longitude", ValueKind::Float),
    ("output.format", ValueKind::Text),
    ("output.color", ValueKind::Boolean),
];

/// Keys whose values are masked by `list`
const SECRET_KEYS: &[&str] = &["vision.api_key"];

/// Configuration manager for the layered TOML + environment configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Manager for the platform default config file
    pub fn new() -> Self {
        Self {
            config_path: paths::get_config_path(),
        }
    }

    /// Manager for a specific file (`--config`, tests)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration: defaults, then the file, then `LANDMARK_*` variables
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }

    /// Write a full configuration to the file
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let toml_string = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, toml_string)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Write the defaults, refusing to replace an existing file unless forced
    pub fn init(&self, force: bool) -> Result<()> {
        self.init_with(&AppConfig::default(), force)
    }

    pub fn init_with(&self, config: &AppConfig, force: bool) -> Result<()> {
        if self.config_path.exists() && !force {
            anyhow::bail!(
                "Configuration already exists at {} (use --force to overwrite)",
                self.config_path.display()
            );
        }
        self.save(config)
    }

    /// Get a configuration value by key (dot notation)
    pub fn get(&self, key: &str) -> Result<String> {
        Self::kind_of(key)?;
        let value = Self::to_toml(&self.load()?)?;

        let mut current = &value;
        for part in key.split('.') {
            current = match current {
                // optional keys are absent from the document until set
                toml::Value::Table(table) => table
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Key '{key}' is not set"))?,
                _ => anyhow::bail!("Invalid key path: {key}"),
            };
        }

        Self::scalar_to_string(current)
            .ok_or_else(|| anyhow::anyhow!("Value at '{key}' is not a simple type"))
    }

    /// Set a configuration value by key (dot notation), validating it first
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed = Self::parse_value(key, value)?;

        let mut document = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            toml::from_str(&content)
                .with_context(|| format!("{} is not valid TOML", self.config_path.display()))?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let Some((section, field)) = key.split_once('.') else {
            anyhow::bail!("Invalid key path: {key}");
        };
        let toml::Value::Table(root) = &mut document else {
            anyhow::bail!("Configuration root is not a table");
        };
        let entry = root
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
        let toml::Value::Table(table) = entry else {
            anyhow::bail!("Invalid key path: expected table at '{section}'");
        };
        table.insert(field.to_string(), parsed);

        // the edited document must still deserialize as a whole
        let rendered = toml::to_string_pretty(&document)?;
        toml::from_str::<AppConfig>(&rendered)
            .with_context(|| format!("Invalid value for '{key}'"))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, rendered)?;
        Ok(())
    }

    /// All effective values, sorted by key, secrets masked
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = Self::to_toml(&self.load()?)?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        for (key, value) in &mut items {
            if SECRET_KEYS.contains(&key.as_str()) {
                *value = mask(value);
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }

    fn to_toml(config: &AppConfig) -> Result<toml::Value> {
        Ok(toml::from_str(&toml::to_string(config)?)?)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        if let toml::Value::Table(table) = value {
            for (key, val) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                Self::collect_values(val, path, items);
            }
        } else if let Some(text) = Self::scalar_to_string(value) {
            items.push((prefix, text));
        }
    }

    fn scalar_to_string(value: &toml::Value) -> Option<String> {
        match value {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(i) => Some(i.to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn kind_of(key: &str) -> Result<ValueKind> {
        KNOWN_KEYS
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key '{key}'"))
    }

    /// Parse `value` as the type stored under `key` and check its range
    fn parse_value(key: &str, value: &str) -> Result<toml::Value> {
        let parsed = match Self::kind_of(key)? {
            ValueKind::Text => toml::Value::String(value.to_string()),
            ValueKind::Integer => {
                let number: i64 = value
                    .parse()
                    .with_context(|| format!("'{key}' must be a non-negative integer"))?;
                if number < 0 {
                    anyhow::bail!("'{key}' must be a non-negative integer");
                }
                toml::Value::Integer(number)
            }
            ValueKind::Float => toml::Value::Float(
                value
                    .parse()
                    .with_context(|| format!("'{key}' must be a number"))?,
            ),
            ValueKind::Boolean => toml::Value::Boolean(
                value
                    .parse()
                    .with_context(|| format!("'{key}' must be 'true' or 'false'"))?,
            ),
        };

        let check_range = |low: f64, high: f64| -> Result<()> {
            let number = parsed.as_float().unwrap_or(f64::NAN);
            if !(low..=high).contains(&number) {
                anyhow::bail!("'{key}' must be between {low} and {high}");
            }
            Ok(())
        };
        match key {
            "vision.score_threshold" => check_range(0.0, 1.0)?,
            "recognition.confidence_threshold" => check_range(0.0, 100.0)?,
            "location.latitude" => check_range(-90.0, 90.0)?,
            "location.longitude" => check_range(-180.0, 180.0)?,
            "optimizer.quality" => {
                if !(1..=100).contains(&parsed.as_integer().unwrap_or(0)) {
                    anyhow::bail!("'{key}' must be between 1 and 100");
                }
            }
            "vision.timeout_secs" | "enrichment.timeout_secs" | "recognition.timeout_ms" => {
                if parsed.as_integer() == Some(0) {
                    anyhow::bail!("'{key}' must be greater than 0");
                }
            }
            "output.format" => {
                if !matches!(value, "human" | "json" | "csv") {
                    anyhow::bail!("'{key}' must be one of: human, json, csv");
                }
            }
            "vision.endpoint" | "enrichment.endpoint" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    anyhow::bail!("'{key}' must be an http(s) URL");
                }
            }
            _ => {}
        }
        Ok(parsed)
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// Interactive setup: prompts for the API key and an optional home position
///
/// Non-interactive sessions get the defaults written as-is.
pub fn interactive_init(manager: &ConfigManager, force: bool, interactive: bool) -> Result<()> {
    if !interactive {
        manager.init(force)?;
        eprintln!(
            "{}",
            format!("Wrote default configuration to {}", manager.config_path().display()).green()
        );
        return Ok(());
    }

    println!("{}", "Landmark CLI Setup".bold());
    println!("{}", "==================".bold());
    println!();

    if manager.config_path().exists() && !force {
        let reconfigure = Confirm::new()
            .with_prompt("Configuration already exists. Reconfigure?")
            .default(false)
            .interact()
            .context("Failed to read input")?;
        if !reconfigure {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    let mut config = manager.load().unwrap_or_default();

    println!("Landmark detection needs a Cloud Vision API key.");
    let api_key = Password::new()
        .with_prompt("Vision API key (leave empty to skip)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    if !api_key.is_empty() {
        config.vision.api_key = Some(api_key);
    }

    let language: String = Input::new()
        .with_prompt("Encyclopedia language")
        .default(config.enrichment.language.clone())
        .interact_text()
        .context("Failed to read language")?;
    config.enrichment.language = language;

    let set_position = Confirm::new()
        .with_prompt("Set a fixed position for the nearby-places fallback?")
        .default(config.location.coordinates().is_some())
        .interact()
        .context("Failed to read input")?;
    if set_position {
        let validate = |low: f64, high: f64| {
            move |input: &String| -> Result<(), String> {
                match input.parse::<f64>() {
                    Ok(v) if (low..=high).contains(&v) => Ok(()),
                    _ => Err(format!("Must be a number between {low} and {high}")),
                }
            }
        };
        let latitude: String = Input::new()
            .with_prompt("Latitude")
            .validate_with(validate(-90.0, 90.0))
            .interact_text()
            .context("Failed to read latitude")?;
        let longitude: String = Input::new()
            .with_prompt("Longitude")
            .validate_with(validate(-180.0, 180.0))
            .interact_text()
            .context("Failed to read longitude")?;
        config.location.latitude = latitude.parse().ok();
        config.location.longitude = longitude.parse().ok();
    }

    manager.save(&config)?;

    println!();
    println!("{}", "✓ Configuration saved".green());
    println!("  {}", manager.config_path().display());
    println!();
    println!("You can now use:");
    println!("  landmark identify <image>  - Recognize the landmark in a photo");
    println!("  landmark status            - Check service readiness");

    Ok(())
}
