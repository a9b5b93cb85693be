use crate::models::PropertyRecord;
use crate::registry::{SiteKey, SiteResults};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub const CSV_HEADER: [&str; 11] = [
    "site",
    "title",
    "price",
    "location",
    "property_type",
    "size_info",
    "building_age",
    "rooms",
    "image_count",
    "source_url",
    "scraped_at",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("unknown site key in export: {0}")]
    UnknownSite(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Render results in the named format (`json` or `csv`, case-insensitive).
pub fn export(results: &SiteResults, format: &str) -> Result<String, ExportError> {
    render(results, format.parse()?)
}

pub fn render(results: &SiteResults, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => to_json(results),
        ExportFormat::Csv => to_csv(results),
    }
}

/// Pretty JSON object keyed by site, Japanese text left unescaped.
pub fn to_json(results: &SiteResults) -> Result<String, ExportError> {
    let mut object = serde_json::Map::new();
    for batch in results.iter() {
        object.insert(
            batch.site.as_str().to_string(),
            serde_json::to_value(&batch.records)?,
        );
    }
    Ok(serde_json::to_string_pretty(&serde_json::Value::Object(object))?)
}

/// Parse the output of [`to_json`] back into results.
pub fn from_json(json: &str) -> Result<SiteResults, ExportError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut results = SiteResults::default();
    for (key, value) in object {
        let site = SiteKey::from_str(&key).map_err(|_| ExportError::UnknownSite(key.clone()))?;
        let records: Vec<PropertyRecord> = serde_json::from_value(value)?;
        results.insert(site, records);
    }
    Ok(results)
}

pub fn to_csv(results: &SiteResults) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for batch in results.iter() {
        for record in &batch.records {
            writer.write_record([
                batch.site.as_str(),
                &record.title,
                &record.price,
                &record.location,
                &record.property_type,
                &record.size_info,
                &record.building_age,
                &record.rooms,
                &record.image_urls.len().to_string(),
                &record.source_url,
                &record.scraped_at.to_rfc3339(),
            ])?;
        }
    }

    let bytes = writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn write_export(path: impl AsRef<Path>, content: &str) -> Result<(), ExportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    info!("Saved export to {}", path.display());
    Ok(())
}
