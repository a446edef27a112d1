use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use landmark_cli::config::{self, AppConfig, ConfigManager};
use landmark_cli::error::{CliError, CliResult, ErrorContext};
use landmark_cli::file_discovery::FileDiscoveryOptions;
use landmark_cli::orchestrators::identify_orchestrator::{
    self, IdentifyOptions, IdentifyOrchestrator, OutputFormat,
};
use landmark_cli::progress::format_bytes;
use landmark_cli::{paths, terminal};
use landmark_core::Coordinates;
use landmark_core::error::{ServiceError, ServiceKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "landmark")]
#[command(author, version, about = "Landmark recognition - identify landmarks in photos", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Use this configuration file instead of the default one
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the landmark in one or more photos
    Identify {
        /// Image files, directories or http(s) URLs
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output format (defaults to output.format from the config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Skip the recognition cache
        #[arg(long)]
        no_cache: bool,

        /// Don't fall back to the nearest known place
        #[arg(long)]
        no_fallback: bool,

        /// Retries after the first attempt
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,

        /// Minimum confidence (0-100) for a detection to count; also lowers
        /// vision.score_threshold when that cutoff is higher
        #[arg(long, value_name = "PERCENT")]
        threshold: Option<f64>,

        /// Budget for each recognition in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Latitude of your position, for the nearby fallback
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of your position, for the nearby fallback
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Include patterns for directories (repeatable)
        #[arg(short = 'i', long = "include", value_name = "PATTERN")]
        include_patterns: Vec<String>,

        /// Exclude patterns for directories (repeatable, overrides includes)
        #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
        exclude_patterns: Vec<String>,

        /// Don't use the default image extensions when no include patterns are given
        #[arg(long)]
        no_defaults: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Disable the progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Show service readiness and cache location
    Status,

    /// Inspect or clear the recognition cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Show cache statistics
    Stats,
    /// Remove every cached recognition
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a configuration file, prompting for the API key when interactive
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., recognition.max_retries)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., recognition.max_retries)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Info)
            .filter_module("landmark_core", log::LevelFilter::Debug)
            .filter_module("landmark_cli", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let debug = cli.debug;
    if let Err(error) = run(cli).await {
        eprint!("{}", error.format_for_user(debug));
        std::process::exit(error.exit_code().code());
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::Config { command } => config_command(manager, command),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
        command => {
            let config = load_config(&manager)?;
            if !config.output.color {
                colored::control::set_override(false);
            }
            match command {
                Commands::Identify {
                    inputs,
                    format,
                    no_cache,
                    no_fallback,
                    max_retries,
                    threshold,
                    timeout_ms,
                    lat,
                    lon,
                    include_patterns,
                    exclude_patterns,
                    no_defaults,
                    recursive,
                    no_progress,
                } => {
                    let mut config = config;
                    if let (Some(latitude), Some(longitude)) = (lat, lon) {
                        let position = Coordinates::new(latitude, longitude);
                        if !position.is_valid() {
                            return Err(CliError::usage("Coordinates are out of range")
                                .with_context("lat", &latitude.to_string())
                                .with_context("lon", &longitude.to_string()));
                        }
                        config.location.latitude = Some(latitude);
                        config.location.longitude = Some(longitude);
                    }
                    if let Some(threshold) = threshold {
                        if !(0.0..=100.0).contains(&threshold) {
                            return Err(CliError::usage("--threshold must be between 0 and 100"));
                        }
                        config.set_confidence_threshold(threshold);
                    }

                    let mut recognition = config.recognition_options();
                    recognition.enable_cache &= !no_cache;
                    recognition.enable_fallback &= !no_fallback;
                    if let Some(retries) = max_retries {
                        recognition.max_retries = retries;
                    }
                    if let Some(ms) = timeout_ms {
                        recognition.timeout = Duration::from_millis(ms.max(1));
                    }

                    let format = match format {
                        Some(format) => format,
                        None => config.output.format.parse().map_err(|e: String| {
                            CliError::usage(&e).with_context("key", "output.format")
                        })?,
                    };

                    let options = IdentifyOptions {
                        recognition,
                        discovery: FileDiscoveryOptions::new()
                            .with_include_patterns(include_patterns)
                            .with_exclude_patterns(exclude_patterns)
                            .with_use_defaults(!no_defaults)
                            .with_recursive(recursive),
                        format,
                        show_progress: !no_progress && terminal::should_show_progress_by_default(),
                    };

                    log::debug!("Identifying {} input(s)", inputs.len());
                    let orchestrator = IdentifyOrchestrator::from_config(&config).await?;
                    identify_orchestrator::run(&orchestrator, &inputs, &options).await
                }
                Commands::Status => status_command(&config).await,
                Commands::Cache { command } => cache_command(&config, command).await,
                Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
            }
        }
    }
}

fn load_config(manager: &ConfigManager) -> CliResult<AppConfig> {
    manager.load().map_err(|e| {
        CliError::usage(&format!("{e:#}"))
            .with_context("config", &manager.config_path().display().to_string())
            .with_suggestion("Fix the file or run 'landmark config init --force'")
    })
}

async fn status_command(config: &AppConfig) -> CliResult<()> {
    let orchestrator = IdentifyOrchestrator::from_config(config).await?;
    let service = orchestrator.service();
    let readiness = service.validate_services();

    let mark = |ready: bool| if ready { "ready".green() } else { "not ready".red() };
    println!("{}", "Services:".bold());
    println!("  Vision:     {}", mark(readiness.vision_ready));
    println!("  Enrichment: {}", mark(readiness.enrichment_ready));
    println!("  Endpoint:   {}", config.enrichment.resolved_endpoint());

    println!("{}", "Position:".bold());
    match config.location.coordinates() {
        Some(position) => println!("  {:.5}, {:.5}", position.latitude, position.longitude),
        None => println!("  not configured (nearby fallback unavailable)"),
    }

    let stats = service.cache_stats().await;
    println!("{}", "Cache:".bold());
    if config.cache.enabled && config.cache.persist {
        println!("  File:    {}", paths::get_cache_file().display());
    } else if config.cache.enabled {
        println!("  File:    in memory only");
    } else {
        println!("  Disabled");
    }
    println!("  Entries: {}", stats.entry_count);

    if readiness.vision_ready {
        Ok(())
    } else {
        let error = landmark_core::Error::from(ServiceError::missing_credential(ServiceKind::Vision));
        let details = service.classifier().classify_error(&error, Default::default());
        Err(CliError::from(details).with_suggestion("Run 'landmark config set vision.api_key <KEY>'"))
    }
}

async fn cache_command(config: &AppConfig, command: CacheCommand) -> CliResult<()> {
    let orchestrator = IdentifyOrchestrator::from_config(config).await?;
    let service = orchestrator.service();

    match command {
        CacheCommand::Stats => {
            let stats = service.cache_stats().await;
            println!("{}", "Recognition cache:".bold());
            println!("  Entries:  {}", stats.entry_count);
            println!("  Size:     {}", format_bytes(stats.total_size_bytes));
            if let Some(oldest) = stats.oldest_entry {
                println!("  Oldest:   {}", oldest.to_rfc3339());
            }
            if let Some(newest) = stats.newest_entry {
                println!("  Newest:   {}", newest.to_rfc3339());
            }
            if config.cache.enabled && config.cache.persist {
                println!("  File:     {}", paths::get_cache_file().display());
            }
        }
        CacheCommand::Clear => {
            service.clear_cache().await;
            eprintln!("{}", "Recognition cache cleared".green());
        }
    }
    Ok(())
}

fn config_command(mut manager: ConfigManager, command: ConfigCommand) -> CliResult<()> {
    match command {
        ConfigCommand::Init { force } => {
            config::interactive_init(&manager, force, terminal::is_interactive())?;
        }
        ConfigCommand::Get { key } => {
            let value = manager
                .get(&key)
                .map_err(|e| CliError::usage(&format!("{e:#}")))?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            manager
                .set(&key, &value)
                .map_err(|e| CliError::usage(&format!("{e:#}")).with_context("key", &key))?;
            eprintln!("{}", format!("Set {key}").green());
            eprintln!("Configuration saved to: {}", manager.config_path().display());
        }
        ConfigCommand::List => {
            let items = manager
                .list()
                .map_err(|e| CliError::usage(&format!("{e:#}")))?;
            eprintln!("Config file: {}", manager.config_path().display());

            let mut sections: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
            for (key, value) in &items {
                let (section, field) = key.split_once('.').unwrap_or(("general", key));
                sections.entry(section).or_default().push((field, value));
            }
            for (section, fields) in sections {
                println!("[{}]", section.yellow());
                for (field, value) in fields {
                    println!("  {} = {}", field.cyan(), value);
                }
            }
        }
        ConfigCommand::Path => println!("{}", manager.config_path().display()),
    }
    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
