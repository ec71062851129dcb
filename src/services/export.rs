//! Write listings back out as spreadsheets
//!
//! Exports use the source column names so they can be fed back into the pipeline,
//! followed by the derived `Lucro` and `Margem (%)` columns.

use std::path::{Path, PathBuf};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::error::PipelineError;
use crate::models::listing::ListingRow;
use crate::services::analysis::{apply_filter, ListingFilter};
use crate::services::normalizer::COLUMN_MAP;

const PROFIT_HEADER: &str = "Lucro";
const MARGIN_HEADER: &str = "Margem (%)";

/// Write `rows` to `path` as a single-sheet workbook.
pub fn write_listings(rows: &[ListingRow], path: &Path) -> Result<(), PipelineError> {
    let export_err = |e: XlsxError| PipelineError::Export {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("anuncios").map_err(export_err)?;
    write_sheet(worksheet, rows).map_err(export_err)?;
    workbook.save(path).map_err(export_err)?;

    Ok(())
}

fn write_sheet(ws: &mut Worksheet, rows: &[ListingRow]) -> Result<(), XlsxError> {
    let money = Format::new().set_num_format("0.00");

    let headers = COLUMN_MAP
        .iter()
        .map(|(name, _)| *name)
        .chain([PROFIT_HEADER, MARGIN_HEADER]);
    for (col, name) in headers.enumerate() {
        ws.write_string(0, col as u16, name)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        let metrics = row.metrics();

        if let Some(id) = row.id {
            ws.write_number(r, 0, id as f64)?;
        }
        write_text(ws, r, 1, row.integration.as_deref())?;
        write_text(ws, r, 2, row.identifier.as_deref())?;
        write_text(ws, r, 3, row.title.as_deref())?;
        write_text(ws, r, 4, row.product_sku.as_deref())?;
        write_decimal(ws, r, 5, row.cost_price, &money)?;
        write_decimal(ws, r, 6, row.price, &money)?;
        write_text(ws, r, 7, row.listing_type.as_deref())?;
        // Profit and margin stay blank when they are not defined
        if let Some(profit) = metrics.profit {
            write_decimal(ws, r, 8, profit, &money)?;
        }
        if let Some(margin) = metrics.margin_pct {
            write_decimal(ws, r, 9, margin.round_dp(2), &money)?;
        }
    }

    Ok(())
}

fn write_text(ws: &mut Worksheet, row: u32, col: u16, value: Option<&str>) -> Result<(), XlsxError> {
    if let Some(v) = value {
        ws.write_string(row, col, v)?;
    }
    Ok(())
}

fn write_decimal(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: Decimal,
    format: &Format,
) -> Result<(), XlsxError> {
    if let Some(v) = value.to_f64() {
        ws.write_number_with_format(row, col, v, format)?;
    }
    Ok(())
}

/// Filter `rows` and save the result under `dir`.
///
/// An empty result writes nothing and returns `Ok(None)`.
pub fn save_filtered(
    rows: &[ListingRow],
    filter: &ListingFilter,
    dir: &Path,
) -> Result<Option<PathBuf>, PipelineError> {
    let filtered = apply_filter(rows, filter);
    if filtered.is_empty() {
        info!(filter = ?filter, "No listings matched, nothing saved");
        return Ok(None);
    }

    std::fs::create_dir_all(dir).map_err(|e| PipelineError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let path = dir.join(filter.export_file_name());
    write_listings(&filtered, &path)?;

    info!(path = %path.display(), rows = filtered.len(), "Filtered listings saved");
    Ok(Some(path))
}
