use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use karuisearch::config::ScraperConfig;
use karuisearch::export::{self, ExportFormat};
use karuisearch::frontend;
use karuisearch::logging;
use karuisearch::progress::SiteProgress;
use karuisearch::registry::{ScraperRegistry, SiteKey};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Karuisearch - Karuizawa vacation property scraper")]
struct Args {
    /// Sites to scrape, comma separated (default: all, in priority order)
    #[clap(short, long, value_delimiter = ',')]
    sites: Vec<String>,

    /// JSON config file; missing files fall back to defaults
    #[clap(short, long, default_value = "karuisearch.json")]
    config: PathBuf,

    /// Directory for the export file
    #[clap(short, long, default_value = "output")]
    output: PathBuf,

    /// Export format: json or csv
    #[clap(short, long, default_value = "json")]
    format: String,

    /// Request parallel scraping (sites still run one at a time)
    #[clap(long)]
    parallel: bool,

    /// Write front-end listings and a weekly summary into this directory
    #[clap(long)]
    frontend: Option<PathBuf>,

    /// Print the run summary as JSON
    #[clap(long)]
    summary: bool,

    /// List the available sites and exit
    #[clap(long)]
    list: bool,

    /// Override the configured requests per second
    #[clap(long)]
    requests_per_second: Option<f64>,

    /// Show the browser window instead of running headless
    #[clap(long)]
    headed: bool,

    /// Enable info-level logging
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if args.list {
        println!("Available sites:");
        for site in ScraperRegistry::available() {
            println!(
                "  {:<18} {:<24} {:?}, priority {} - {}",
                site.key.as_str(),
                site.name,
                site.fetch_mode,
                site.priority,
                site.description
            );
        }
        return Ok(());
    }

    let format: ExportFormat = args.format.parse()?;

    let mut config = ScraperConfig::load(&args.config)?;
    if let Some(rps) = args.requests_per_second {
        config.rate_limit.requests_per_second = rps;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if logging::is_verbose() {
        println!("Config: {}", serde_json::to_string(&config)?);
    }

    println!("Karuisearch - Karuizawa property scraper");
    println!("========================================");

    let mut registry = ScraperRegistry::new(config);
    let results = if std::io::stdout().is_terminal() {
        let mut sites: Vec<SiteKey> = if args.sites.is_empty() {
            SiteKey::ALL.to_vec()
        } else {
            args.sites.iter().filter_map(|key| key.parse().ok()).collect()
        };
        sites.sort_by_key(SiteKey::priority);
        sites.dedup();

        let mut progress = SiteProgress::new(&sites);
        let results = registry.run_many_with(&args.sites, args.parallel, |event| {
            if let Err(e) = progress.handle(event) {
                warn!("Progress display failed: {}", e);
            }
        });
        progress.finish(results.total_records())?;
        results
    } else {
        registry.run_many(&args.sites, args.parallel)
    };

    let report = registry.summarize(&results);
    if args.summary {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = args
        .output
        .join(format!("karuizawa_properties_{}.{}", timestamp, format.extension()));
    let content = export::render(&results, format)?;
    export::write_export(&path, &content).with_context(|| format!("Failed to export to {}", path.display()))?;

    if let Some(dir) = &args.frontend {
        let listings_path = dir.join("listings.json");
        let previous = frontend::load_listings(&listings_path)?;
        let today = Local::now().date_naive();
        let listings = frontend::build_listings(&registry.combine(&results), &previous, today);
        frontend::save_json(&listings_path, &listings)?;
        frontend::save_json(dir.join("weekly_summary.json"), &frontend::weekly_summary(&listings, today))?;
    }

    println!("\n=== Summary ===");
    for (site, stats) in registry.stats() {
        match &stats.error {
            None => println!("{:<24} {} properties", site.name(), stats.properties_found),
            Some(error) => println!("{:<24} failed: {}", site.name(), error),
        }
    }
    println!("Total unique properties: {}", report.summary.total_properties_found);
    println!("Saved to: {}", path.display());

    Ok(())
}
