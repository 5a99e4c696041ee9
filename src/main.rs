mod availability;
mod config;
mod error;
mod export;
mod models;
mod parse;
mod report;
mod scrapers;

use anyhow::{Context, Result};
use availability::{AvailabilityWalker, CancelToken};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::Config;
use models::{AvailabilityRecord, DateRange, HotelDetails, HotelLink};
use scrapers::hotel_page::extract_details;
use scrapers::{BookingBrowser, HttpPageSource, PageSource, SearchParams};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "hotel-scout")]
#[command(about = "Scrape hotel amenities, ratings and calendar prices", long_about = None)]
struct Args {
    /// YAML configuration file (optional)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Directory for CSV and JSON output
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect hotel names and links from every search result page
    Search {
        /// Full search URL; built from the other options when omitted
        #[arg(long)]
        url: Option<String>,

        #[arg(long, default_value = "Porto de Galinhas")]
        destination: String,

        /// Check-in date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        checkin: Option<NaiveDate>,

        #[arg(long, default_value = "https://www.booking.com")]
        base_url: String,

        #[arg(short, long, default_value = "hotels.csv")]
        output: PathBuf,
    },

    /// Visit each hotel from a links CSV and extract details and availability
    Scrape {
        #[arg(short, long, default_value = "hotels.csv")]
        input: PathBuf,

        /// First date to collect (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date to collect (YYYY-MM-DD), defaults to start + 180 days
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Skip this many hotels from the top of the list
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Stop after this many hotels
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch hotel pages over plain HTTP instead of the browser
        #[arg(long)]
        http: bool,

        /// Only extract details, do not walk the calendar
        #[arg(long)]
        no_availability: bool,
    },

    /// Summarize an availability CSV by day of the week
    Report {
        /// Availability CSV written by `scrape`
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(config: &Config) {
    // RUST_LOG wins over the configured level
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        return;
    }

    let level = match config.tracing_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!("Invalid tracing level '{}', using 'info'", other);
            Level::INFO
        }
    };

    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if args.headful {
        config.headless = false;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    init_logging(&config);
    info!("🏨 Hotel Scout");

    match args.command {
        Command::Search {
            url,
            destination,
            checkin,
            base_url,
            output,
        } => {
            let url = url.unwrap_or_else(|| {
                let checkin = checkin.unwrap_or_else(|| Local::now().date_naive());
                SearchParams::new(destination, checkin).search_url(&base_url)
            });
            search(&config, &url, &output)
        }
        Command::Scrape {
            input,
            start,
            end,
            skip,
            limit,
            http,
            no_availability,
        } => {
            let options = ScrapeOptions {
                input,
                start,
                end,
                skip,
                limit,
                http,
                no_availability,
            };
            scrape(&config, options).await
        }
        Command::Report { input, output } => {
            let output = output.unwrap_or_else(|| config.output_dir.join("weekday_summary.csv"));
            summarize(&input, &output)
        }
    }
}

fn search(config: &Config, url: &str, output: &Path) -> Result<()> {
    let browser = BookingBrowser::launch(config)?;
    let hotels = browser.collect_search_results(url)?;

    export::save_hotel_links(output, &hotels)?;
    Ok(())
}

struct ScrapeOptions {
    input: PathBuf,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    skip: usize,
    limit: Option<usize>,
    http: bool,
    no_availability: bool,
}

async fn scrape(config: &Config, options: ScrapeOptions) -> Result<()> {
    let today = Local::now().date_naive();
    // Fail on an inverted range before launching anything
    let range = DateRange::resolve(options.start, options.end, today)?;
    info!("Collecting availability for {}", range);

    let hotels = export::load_hotel_links(&options.input)?;

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current hotel");
            ctrl_c.cancel();
        }
    });

    let needs_browser = !options.http || !options.no_availability;
    let browser = if needs_browser {
        Some(BookingBrowser::launch(config)?)
    } else {
        None
    };
    let http_source = if options.http {
        Some(HttpPageSource::new(&config.user_agent)?)
    } else {
        None
    };
    let pages: &dyn PageSource = match (&http_source, &browser) {
        (Some(http), _) => http,
        (None, Some(browser)) => browser,
        (None, None) => anyhow::bail!("No page source available"),
    };
    info!("Reading hotel pages via {}", pages.source_name());

    let walker = AvailabilityWalker::new(config.walker_options()).with_cancel(cancel.clone());
    let availability_dir = config.output_dir.join("availability");
    let selected: Vec<&HotelLink> = hotels
        .iter()
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX))
        .collect();

    let mut details = Vec::new();
    let mut failures = 0;
    let mut used_slugs = HashSet::new();

    for (i, hotel) in selected.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        info!("[{}/{}] {}", i + 1, selected.len(), hotel.name);

        match scrape_details(pages, hotel, config).await {
            Ok(hotel_details) => details.push(hotel_details),
            Err(e) => {
                failures += 1;
                error!("Failed to read details of {}: {:#}", hotel.name, e);
            }
        }

        if let (Some(browser), false) = (&browser, options.no_availability) {
            let walked = tokio::task::block_in_place(|| {
                walk_hotel(browser, &walker, hotel, options.start, options.end, today)
            });

            match walked {
                Ok(records) => {
                    let slug = export::unique_slug(&hotel.name, &mut used_slugs);
                    let path = availability_dir.join(format!("{}.csv", slug));
                    if let Err(e) = export::save_availability(&path, &records) {
                        failures += 1;
                        error!("Failed to save availability of {}: {:#}", hotel.name, e);
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!("Failed to walk calendar of {}: {:#}", hotel.name, e);
                }
            }
        }

        tokio::time::sleep(config.request_delay()).await;
    }

    export::save_details(&config.output_dir.join("details.csv"), &details)?;

    let json = serde_json::to_string_pretty(&details)?;
    tokio::fs::write(config.output_dir.join("details.json"), json).await?;

    info!(
        "✅ Scraped {} hotels ({} failures)",
        details.len(),
        failures
    );
    Ok(())
}

async fn scrape_details(
    pages: &dyn PageSource,
    hotel: &HotelLink,
    config: &Config,
) -> Result<HotelDetails> {
    let html = pages
        .fetch_html(&hotel.link)
        .await
        .with_context(|| format!("Failed to load {}", hotel.link))?;

    extract_details(&html, hotel, &config.selectors, &config.keywords)
}

fn walk_hotel(
    browser: &BookingBrowser,
    walker: &AvailabilityWalker,
    hotel: &HotelLink,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<Vec<AvailabilityRecord>> {
    let mut calendar = browser.open_calendar(&hotel.link)?;
    let records = walker.walk_between(&mut calendar, start, end, today)?;
    Ok(records)
}

fn summarize(input: &Path, output: &Path) -> Result<()> {
    let records = export::load_availability(input)?;
    let stats = report::weekday_summary(&records);

    for day in &stats {
        match day.average_price {
            Some(avg) => println!(
                "{}: {} unavailable, {} priced, average {:.2}",
                day.weekday, day.unavailable, day.priced, avg
            ),
            None => println!("{}: {} unavailable, no prices", day.weekday, day.unavailable),
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    report::save_weekday_summary(output, &stats)?;
    Ok(())
}
