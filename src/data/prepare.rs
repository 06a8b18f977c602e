use crate::error::{AppError, Result};
use crate::metrics::PIPELINE_ROWS_TOTAL;
use crate::models::{week_bucket, CleanedShipment, RAW_DATE_FORMAT};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{info, warn};

/// Column headers expected in the raw shipment export
const COL_ORDER_DATE: &str = "order date (DateOrders)";
const COL_CITY: &str = "Order City";
const COL_COUNTRY: &str = "Order Country";
const COL_MODE: &str = "Shipping Mode";
const COL_DAYS_REAL: &str = "Days for shipping (real)";
const COL_DAYS_SCHEDULED: &str = "Days for shipment (scheduled)";

#[derive(Debug, Clone, Copy)]
pub struct PrepareSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub rows_dropped: usize,
}

/// Clean the raw shipment export into the pipeline's base table.
///
/// Selects the origin, mode and transit-day columns, derives `delay_days`
/// and the Monday-start `order_week` bucket, and drops rows with missing or
/// unparseable fields. The raw export is not UTF-8 clean, so fields are
/// decoded lossily instead of going through typed serde rows.
pub fn prepare(raw_path: &Path, output_path: &Path) -> Result<PrepareSummary> {
    info!(path = %raw_path.display(), "Loading raw shipment export");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(raw_path)?;

    let headers = reader.byte_headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| String::from_utf8_lossy(h) == name)
            .ok_or_else(|| AppError::Csv(format!("missing column '{}'", name)))
    };

    let idx_date = col(COL_ORDER_DATE)?;
    let idx_city = col(COL_CITY)?;
    let idx_country = col(COL_COUNTRY)?;
    let idx_mode = col(COL_MODE)?;
    let idx_real = col(COL_DAYS_REAL)?;
    let idx_scheduled = col(COL_DAYS_SCHEDULED)?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output_path)?;

    let mut rows_in = 0usize;
    let mut rows_out = 0usize;

    for record in reader.byte_records() {
        let record = record?;
        rows_in += 1;

        let field = |idx: usize| {
            record
                .get(idx)
                .map(|b| String::from_utf8_lossy(b).trim().to_string())
                .unwrap_or_default()
        };

        let city = field(idx_city);
        let country = field(idx_country);
        let mode = field(idx_mode);
        if city.is_empty() || country.is_empty() || mode.is_empty() {
            continue;
        }

        let Ok(order_date) = NaiveDateTime::parse_from_str(&field(idx_date), RAW_DATE_FORMAT)
        else {
            continue;
        };
        let (Ok(days_real), Ok(days_scheduled)) =
            (field(idx_real).parse::<i64>(), field(idx_scheduled).parse::<i64>())
        else {
            continue;
        };

        let cleaned = CleanedShipment {
            order_week: week_bucket(order_date.date()),
            order_date,
            order_city: city,
            order_country: country,
            shipping_mode: mode,
            delay_days: days_real - days_scheduled,
        };
        writer.serialize(&cleaned)?;
        rows_out += 1;
    }
    writer.flush()?;

    let rows_dropped = rows_in - rows_out;
    PIPELINE_ROWS_TOTAL
        .with_label_values(&["prepare", "written"])
        .inc_by(rows_out as f64);
    PIPELINE_ROWS_TOTAL
        .with_label_values(&["prepare", "dropped"])
        .inc_by(rows_dropped as f64);

    if rows_dropped > 0 {
        warn!(rows_dropped, "Dropped rows with missing or unparseable fields");
    }
    info!(
        rows_in,
        rows_out,
        path = %output_path.display(),
        "Saved cleaned shipments"
    );

    Ok(PrepareSummary {
        rows_in,
        rows_out,
        rows_dropped,
    })
}
