//! Seat Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use seat_crawler::{
    error::{AppError, Result},
    models::Config,
    pipeline::{
        AvailabilityCrawler, AvailabilityTree, CatalogCrawler, CrawlReport, SequentialCrawler,
    },
    storage::{CatalogStorage, LocalStorage},
};

/// Seat Crawler - Course Seat Availability Checker
#[derive(Parser, Debug)]
#[command(
    name = "seat-crawler",
    version,
    about = "Crawls a course schedule for section seat availability"
)]
struct Cli {
    /// Path to storage directory containing config and results
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every department offered this session
    Departments,

    /// Discover courses and sections and store the catalog
    Catalog {
        /// Department codes (default: all listed departments)
        departments: Vec<String>,
    },

    /// Check seats for departments, courses or sections
    Seats {
        /// Scopes such as "CPSC", "CPSC 110" or "CPSC 110 101"
        #[arg(required = true)]
        items: Vec<String>,

        /// Fetch one page at a time instead of using the worker pool
        #[arg(long)]
        sequential: bool,

        /// Only report sections with general seats remaining
        #[arg(long)]
        available_only: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show stored catalog and availability info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Log every failed job of a run. Returns the tree, partial if any job
/// failed, with the first failure's error.
fn finish<T>(report: CrawlReport<T>) -> (T, Result<()>) {
    for failure in &report.failures {
        log::error!("Failed: {}", failure);
    }
    if !report.is_complete() {
        log::error!("{} jobs failed", report.failures.len());
    }
    report.into_parts()
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Seat crawler starting...");

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", config_path.display());

    let session = config.session.session();
    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Departments => {
            let crawler = CatalogCrawler::from_config(&config)?;
            for dept in crawler.list_departments().await? {
                println!("{dept}");
            }
        }

        Command::Catalog { departments } => {
            config.validate()?;
            let crawler = CatalogCrawler::from_config(&config)?;
            let (tree, outcome) = finish(crawler.run(&departments).await?);
            outcome?;
            let catalog = tree.into_map();

            let meta = storage.save_catalog(&session, &catalog).await?;
            log::info!(
                "Catalog of {} departments saved to {}",
                catalog.len(),
                meta.location
            );
        }

        Command::Seats {
            items,
            sequential,
            available_only,
        } => {
            config.validate()?;
            let report = if sequential {
                let config = config.clone();
                tokio::task::spawn_blocking(move || {
                    SequentialCrawler::from_config(&config)?.run(&items)
                })
                .await
                .map_err(AppError::worker)??
            } else {
                AvailabilityCrawler::from_config(&config)?
                    .run(&items)
                    .await?
            };

            let (mut tree, outcome): (AvailabilityTree, _) = finish(report);
            if available_only {
                tree = tree.only_available();
            }
            let availability = tree.into_map();

            // partial results are still shown, but only a complete run is stored
            println!("{}", serde_json::to_string_pretty(&availability)?);
            outcome?;
            storage.save_availability(&session, &availability).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Session: {} {} {}",
                session.term,
                session.year,
                session.campus
            );

            match storage.load_catalog().await? {
                Some(catalog) => log::info!(
                    "Catalog: {} departments, {} sections (updated {})",
                    catalog.data.len(),
                    catalog.count,
                    catalog.updated_at
                ),
                None => log::info!("No catalog stored yet."),
            }

            match storage.load_availability().await? {
                Some(report) => log::info!(
                    "Last availability check: {} sections (updated {})",
                    report.count,
                    report.updated_at
                ),
                None => log::info!("No availability report stored yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
