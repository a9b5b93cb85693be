pub mod browser;
pub mod common_scraper;
pub mod config;
pub mod export;
pub mod extract;
pub mod fetcher;
pub mod frontend;
pub mod logging;
pub mod models;
pub mod price;
pub mod progress;
pub mod rate_limiter;
pub mod registry;
pub mod sites;
