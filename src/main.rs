//! Holocron - search analytics for the Star Wars reference search
//!
//! Records completed searches in an event store, periodically rolls them
//! up into a statistics snapshot and serves that snapshot over HTTP.

use clap::{Parser, Subcommand};
use holocron_core::{
    HolocronConfig, HolocronError, Result, SearchEvent, SearchType, StoreBackend,
};
use holocron_infra::{connect_store, health_check, init_logger, LoggerConfig};
use holocron_serve::{AnalyticsServices, JobOutcome, ServerBuilder, ServerConfig};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "holocron")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Holocron - search analytics for the Star Wars reference search")]
#[command(long_about = r#"
Holocron records every completed people or movies search, rolls the
counters up into a statistics snapshot every few minutes and serves the
latest snapshot over a small HTTP API.

The event store is either in-process memory or Redis (build with the
`redis` feature).
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (pretty, json)
    #[arg(short, long, default_value = "pretty", global = true)]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and run the recompute scheduler
    Serve {
        /// Server host address
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not start the recompute scheduler
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Run the recompute job once
    Recalculate,

    /// Show the latest statistics, computing them on a cache miss
    Stats,

    /// Show the state of the statistics cache
    CacheInfo,

    /// Record one completed search
    Log {
        /// Search type (people, movies)
        #[arg(short = 't', long = "type")]
        search_type: String,

        /// Search term
        term: String,

        /// Number of results returned
        #[arg(long, default_value = "0")]
        results: u64,

        /// Response time in milliseconds
        #[arg(long, default_value = "0")]
        response_time_ms: u64,
    },

    /// Write a default configuration file
    Init {
        /// Configuration file path
        #[arg(default_value = "holocron.yaml")]
        path: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate
        path: PathBuf,
    },

    /// Show version information
    Version,

    /// Check event store connectivity
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        // These operate on files directly and must not fail on a bad config
        Some(Commands::Init { .. }) | Some(Commands::Validate { .. }) | Some(Commands::Version) => {
            HolocronConfig::default()
        }
        _ => HolocronConfig::load(cli.config.as_deref())?,
    };

    let mut logger_config = LoggerConfig::from(&config.logging).with_env_overrides();
    if cli.verbose {
        logger_config.level = "debug".to_string();
    }
    init_logger(logger_config)?;

    match cli.command {
        Some(Commands::Serve {
            ref host,
            port,
            no_scheduler,
        }) => handle_serve(&config, host.clone(), port, no_scheduler).await,
        Some(Commands::Recalculate) => handle_recalculate(&config, &cli).await,
        Some(Commands::Stats) => handle_stats(&config, &cli).await,
        Some(Commands::CacheInfo) => handle_cache_info(&config, &cli).await,
        Some(Commands::Log {
            ref search_type,
            ref term,
            results,
            response_time_ms,
        }) => handle_log(&config, search_type, term, results, response_time_ms, &cli).await,
        Some(Commands::Init { ref path }) => handle_init(path),
        Some(Commands::Validate { ref path }) => handle_validate(path, &cli),
        Some(Commands::Version) => {
            println!("holocron v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", holocron_core::version_info());
            Ok(())
        }
        Some(Commands::Health) => handle_health(&config, &cli).await,
        None => {
            handle_default();
            Ok(())
        }
    }
}

/// Warning for one-shot commands run against the in-process store, which
/// starts empty and is dropped when the command exits
fn ephemeral_store_warning(config: &HolocronConfig, command: &str) -> Option<String> {
    match config.store.backend {
        StoreBackend::Memory => Some(format!(
            "'{}' is using the memory store: it starts empty and nothing is kept after exit. \
             Set store.backend to redis to work with shared data.",
            command
        )),
        StoreBackend::Redis => None,
    }
}

fn warn_if_ephemeral(config: &HolocronConfig, command: &str) {
    if let Some(message) = ephemeral_store_warning(config, command) {
        warn!(command, "Memory store does not persist between commands");
        eprintln!("warning: {}", message);
    }
}

async fn analytics(config: &HolocronConfig) -> Result<AnalyticsServices> {
    config.validate()?;
    let store = connect_store(&config.store).await?;
    Ok(AnalyticsServices::from_config(store, config))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_serve(
    config: &HolocronConfig,
    host: Option<String>,
    port: Option<u16>,
    no_scheduler: bool,
) -> Result<()> {
    let analytics = analytics(config).await?;

    let mut builder = ServerBuilder::from_config(ServerConfig::from(&config.server));
    if let Some(host) = host {
        builder = builder.host(host);
    }
    if let Some(port) = port {
        builder = builder.port(port);
    }
    let server = builder.build(analytics.clone())?;

    let scheduler = if config.job.enabled && !no_scheduler {
        info!(
            interval_seconds = config.job.interval_seconds,
            "Starting statistics scheduler"
        );
        Some(analytics.scheduler(&config.job).spawn())
    } else {
        info!("Statistics scheduler disabled");
        None
    };

    let result = server.start().await;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }

    result
}

async fn handle_recalculate(config: &HolocronConfig, cli: &Cli) -> Result<()> {
    warn_if_ephemeral(config, "recalculate");
    let analytics = analytics(config).await?;
    let outcome = analytics.recompute_job(&config.job).run().await;

    if cli.output == "json" {
        print_json(&outcome)?;
    } else {
        match &outcome {
            JobOutcome::Completed { attempts } => {
                println!("Statistics recalculated after {} attempt(s)", attempts)
            }
            JobOutcome::Discarded { reason, .. } => println!("Job discarded: {}", reason),
            JobOutcome::Failed { attempts, error } => {
                println!("Job failed after {} attempt(s): {}", attempts, error)
            }
        }
    }

    match outcome {
        JobOutcome::Failed { error, .. } => Err(HolocronError::aggregation(error)),
        JobOutcome::Discarded { reason, .. } => {
            warn!(reason = %reason, "Recompute job discarded");
            Ok(())
        }
        JobOutcome::Completed { .. } => Ok(()),
    }
}

async fn handle_stats(config: &HolocronConfig, cli: &Cli) -> Result<()> {
    warn_if_ephemeral(config, "stats");
    let analytics = analytics(config).await?;
    let cached = analytics.statistics.get_latest_statistics().await?;

    if cli.output == "json" {
        return print_json(&cached);
    }

    let stats = &cached.data;
    println!(
        "Statistics calculated at {} ({})",
        cached.calculated_at.to_rfc3339(),
        if cached.cache_miss { "computed now" } else { "cached" }
    );
    println!();
    println!("Total searches: {}", stats.total_searches);
    for (search_type, count) in &stats.searches_by_type {
        println!("  {:<8} {}", search_type, count);
    }
    println!("Average response time: {:.2} ms", stats.average_response_time);

    if !stats.top_queries.is_empty() {
        println!();
        println!("Top queries:");
        for (rank, query) in stats.top_queries.iter().enumerate() {
            println!(
                "  {:>2}. {} ({} searches, {:.2}%)",
                rank + 1,
                query.term,
                query.count,
                query.percentage
            );
        }
    }

    if !stats.popular_hours.is_empty() {
        println!();
        println!("Popular hours:");
        for hour in &stats.popular_hours {
            println!("  {:02}:00  {}", hour.hour, hour.count);
        }
    }

    Ok(())
}

async fn handle_cache_info(config: &HolocronConfig, cli: &Cli) -> Result<()> {
    warn_if_ephemeral(config, "cache-info");
    let analytics = analytics(config).await?;
    let info = analytics.statistics.cache_info().await;

    if cli.output == "json" {
        return print_json(&info);
    }

    println!("Cache key: {}", info.cache_key);
    println!("TTL: {}s", info.cache_ttl_seconds);
    match (info.cached_at, info.calculated_at) {
        (Some(cached_at), Some(calculated_at)) => {
            println!("Cached at: {}", cached_at.to_rfc3339());
            println!("Calculated at: {}", calculated_at.to_rfc3339());
        }
        _ => println!("Nothing cached"),
    }
    Ok(())
}

async fn handle_log(
    config: &HolocronConfig,
    search_type: &str,
    term: &str,
    results: u64,
    response_time_ms: u64,
    cli: &Cli,
) -> Result<()> {
    let search_type: SearchType = search_type.parse()?;
    warn_if_ephemeral(config, "log");
    let analytics = analytics(config).await?;

    let event = SearchEvent::new(search_type, term, results, response_time_ms);
    let count = analytics.logger.record(&event).await?;

    if cli.output == "json" {
        print_json(&serde_json::json!({
            "type": event.search_type,
            "term": event.term,
            "count": count,
        }))
    } else {
        println!(
            "Logged {} search for '{}' ({} so far)",
            event.search_type, event.term, count
        );
        Ok(())
    }
}

fn handle_init(path: &Path) -> Result<()> {
    info!("Initializing configuration at {:?}", path);

    if path.exists() {
        return Err(HolocronError::validation(format!(
            "Configuration file already exists: {:?}. Remove it first or use a different path.",
            path
        )));
    }

    HolocronConfig::default().to_file(path)?;

    println!("Configuration initialized at {:?}", path);
    println!();
    println!("Next steps:");
    println!("1. Point store.redis_url at your Redis instance and set store.backend: redis");
    println!("2. Run 'holocron validate {:?}' to check the file", path);
    println!("3. Run 'holocron --config {:?} serve'", path);
    Ok(())
}

fn handle_validate(path: &Path, cli: &Cli) -> Result<()> {
    info!("Validating configuration at {:?}", path);

    let result = HolocronConfig::load(Some(path)).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            if cli.output == "json" {
                print_json(&serde_json::json!({
                    "valid": true,
                    "message": "Configuration is valid",
                    "store": config.store.backend,
                }))?;
            } else {
                println!("Configuration is valid");
                println!("  Store: {:?}", config.store.backend);
                println!("  Cache: {:?}, ttl {}s", config.cache.backend, config.cache.ttl_seconds);
                println!(
                    "  Job: every {}s, {} tries, timeout {}s",
                    config.job.interval_seconds, config.job.tries, config.job.timeout_seconds
                );
            }
            Ok(())
        }
        Err(e) => {
            if cli.output == "json" {
                print_json(&serde_json::json!({
                    "valid": false,
                    "error": e.to_string(),
                }))?;
            } else {
                println!("Configuration is invalid: {}", e);
            }
            Err(e)
        }
    }
}

async fn handle_health(config: &HolocronConfig, cli: &Cli) -> Result<()> {
    let store = connect_store(&config.store).await?;
    let health = health_check(&store).await;

    if cli.output == "json" {
        print_json(&serde_json::json!({
            "healthy": health.is_healthy(),
            "store": health.backend,
            "latency_ms": health.latency_ms,
            "error": health.error,
        }))?;
    } else if health.is_healthy() {
        println!("Store '{}' reachable in {} ms", health.backend, health.latency_ms);
    } else {
        println!(
            "Store '{}' unreachable: {}",
            health.backend,
            health.error.as_deref().unwrap_or("unknown error")
        );
    }

    if health.is_healthy() {
        Ok(())
    } else {
        error!("Health check failed");
        Err(HolocronError::store_unavailable(
            health.error.unwrap_or_else(|| "health check failed".to_string()),
        ))
    }
}

fn handle_default() {
    println!("Holocron - search analytics for the Star Wars reference search");
    println!();
    println!("Quick start:");
    println!("  holocron init                       # Create configuration file");
    println!("  holocron log -t people Luke         # Record a search");
    println!("  holocron stats                      # Show the latest statistics");
    println!("  holocron serve                      # Start the API and scheduler");
    println!("  holocron --help                     # Show all options");
}
