use anyhow::{anyhow, Result};
use clap::Parser;
use karuisearch::config::ScraperConfig;
use karuisearch::export::{self, ExportFormat};
use karuisearch::logging;
use karuisearch::registry::{ScraperRegistry, SiteKey, SiteResults};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Run a single Karuizawa site scraper")]
struct Args {
    /// Site key, e.g. mitsui or royal_resort (see karuisearch --list)
    site: String,

    /// JSON config file; missing files fall back to defaults
    #[clap(short, long, default_value = "karuisearch.json")]
    config: PathBuf,

    /// Write the results to this file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Output format: json or csv
    #[clap(short, long, default_value = "json")]
    format: String,

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

    let site: SiteKey = args.site.parse()?;
    let format: ExportFormat = args.format.parse()?;

    let mut config = ScraperConfig::load(&args.config)?;
    if args.headed {
        config.browser.headless = false;
    }

    let mut registry = ScraperRegistry::new(config);
    let records = registry.run_one(site);

    let stats = registry.stats();
    if let Some(error) = stats.get(&site).and_then(|s| s.error.clone()) {
        return Err(anyhow!("{} scraper failed: {}", site.name(), error));
    }

    let mut results = SiteResults::default();
    results.insert(site, records);
    let content = export::render(&results, format)?;

    match &args.output {
        Some(path) => {
            export::write_export(path, &content)?;
            eprintln!("{}: {} properties saved to {}", site.name(), results.total_records(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
