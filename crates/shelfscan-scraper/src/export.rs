//! CSV / JSON export and run summaries.
//!
//! Rows are always written sorted by product name. CSV files start with a
//! UTF-8 byte-order mark so spreadsheet tools pick the right encoding.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfscan_core::{Availability, CleanedProductRecord};

use crate::error::ScraperError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Aggregate view of a result set, for logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeSummary {
    pub count: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub mean_price: Option<f64>,
    /// Count per availability, in [`Availability::ALL`] order, zeros omitted.
    pub availability: Vec<(Availability, usize)>,
    pub with_images: usize,
    pub with_urls: usize,
}

/// Records sorted by name (case-sensitive, stable).
#[must_use]
pub fn sorted_by_name(records: &[CleanedProductRecord]) -> Vec<&CleanedProductRecord> {
    let mut sorted: Vec<&CleanedProductRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

/// `products_<UTC timestamp>.<extension>`.
#[must_use]
pub fn default_file_name(extension: &str, now: DateTime<Utc>) -> String {
    format!("products_{}.{extension}", now.format("%Y%m%d_%H%M%S"))
}

/// Writes `records` as CSV with a header row.
///
/// # Errors
///
/// Returns [`ScraperError::Export`] when the file cannot be created or
/// flushed, and [`ScraperError::Csv`] when a row fails to serialize.
pub fn write_csv(path: &Path, records: &[CleanedProductRecord]) -> Result<(), ScraperError> {
    let mut file = create(path)?;
    file.write_all(UTF8_BOM).map_err(|source| export_error(path, source))?;

    let mut writer = csv::Writer::from_writer(file);
    for record in sorted_by_name(records) {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|source| export_error(path, source))?;

    tracing::info!(path = %path.display(), products = records.len(), "exported CSV");
    Ok(())
}

/// Writes `records` as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`ScraperError::Export`] on I/O failure and
/// [`ScraperError::Json`] on serialization failure.
pub fn write_json(path: &Path, records: &[CleanedProductRecord]) -> Result<(), ScraperError> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, &sorted_by_name(records))?;
    file.flush().map_err(|source| export_error(path, source))?;

    tracing::info!(path = %path.display(), products = records.len(), "exported JSON");
    Ok(())
}

#[must_use]
pub fn summarize(records: &[CleanedProductRecord]) -> ScrapeSummary {
    let prices: Vec<f64> = records.iter().filter_map(|r| r.price_numeric).collect();
    let min_price = prices.iter().copied().reduce(f64::min);
    let max_price = prices.iter().copied().reduce(f64::max);
    #[allow(clippy::cast_precision_loss)]
    let mean_price =
        (!prices.is_empty()).then(|| round2(prices.iter().sum::<f64>() / prices.len() as f64));

    let availability = Availability::ALL
        .into_iter()
        .filter_map(|a| {
            let count = records.iter().filter(|r| r.availability == a).count();
            (count > 0).then_some((a, count))
        })
        .collect();

    ScrapeSummary {
        count: records.len(),
        min_price,
        max_price,
        mean_price,
        availability,
        with_images: records.iter().filter(|r| r.image_url.is_some()).count(),
        with_urls: records.iter().filter(|r| r.product_url.is_some()).count(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn create(path: &Path) -> Result<BufWriter<File>, ScraperError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| export_error(parent, source))?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| export_error(path, source))
}

fn export_error(path: &Path, source: std::io::Error) -> ScraperError {
    ScraperError::Export {
        path: path.to_path_buf(),
        source,
    }
}
