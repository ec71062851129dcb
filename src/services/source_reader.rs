//! Load the first worksheet of a spreadsheet into a `RawTable`
//!
//! calamine detects the format from the extension (xlsx, xlsm, xlsb, xls, ods), so
//! legacy `.xls` exports are read directly.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use crate::error::PipelineError;
use crate::models::raw_table::{cell_to_text, RawTable};

pub fn read_table(path: &Path) -> Result<RawTable, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let read_err = |message: String| PipelineError::SourceRead {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| read_err(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| read_err("workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| read_err(e.to_string()))?;

    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_to_text(cell).map(|h| h.trim().to_string()).unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };

    let data: Vec<Vec<Data>> = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| row.to_vec())
        .collect();

    debug!(
        path = %path.display(),
        sheet = %sheet_name,
        columns = headers.len(),
        rows = data.len(),
        "Read spreadsheet"
    );

    Ok(RawTable::new(headers, data))
}
