//! Consolidate every marketplace export in a folder into one spreadsheet
//!
//! Columns are aligned by header name; the output header is the union of all input
//! headers in first-seen order. A repeated header inside one file becomes `Name_2`,
//! `Name_3` and so on, and a blank header becomes `Coluna N`. A file that cannot be read is recorded in the
//! summary and skipped, it never aborts the merge.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use calamine::Data;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::WorkspaceConfig;
use crate::error::PipelineError;
use crate::models::raw_table::RawTable;
use crate::services::source_reader::read_table;

/// Result of reading one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Number of data rows read, or why the file was skipped
    pub result: Result<usize, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub outcomes: Vec<FileOutcome>,
    /// Consolidated file, `None` when nothing could be read
    pub output: Option<PathBuf>,
    pub total_rows: usize,
}

impl MergeSummary {
    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Create the input and output folders if they do not exist yet.
pub fn ensure_workspace(workspace: &WorkspaceConfig) -> Result<(), PipelineError> {
    for dir in [&workspace.input_dir, &workspace.output_dir] {
        std::fs::create_dir_all(dir).map_err(|e| PipelineError::Io {
            path: dir.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Spreadsheets in `dir` eligible for merging, sorted by name.
///
/// Office lock files (`~$...`) and a file named like the merge output are skipped.
pub fn discover_inputs(dir: &Path, output_name: &str) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::Io {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            let is_spreadsheet = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("xls") || e.eq_ignore_ascii_case("xlsx"))
                .unwrap_or(false);
            is_spreadsheet && !name.starts_with("~$") && name != output_name
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Column names used for alignment, one per header.
///
/// Blank headers become `Coluna N` (1-based position) and the second and later
/// copies of a header get a `_2`, `_3`... suffix, so no column shadows another.
fn column_keys(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut keys = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Coluna {}", idx + 1)
        } else {
            header.clone()
        };

        let mut key = base.clone();
        let mut copy = 1;
        while seen.contains(&key) {
            copy += 1;
            key = format!("{}_{}", base, copy);
        }
        seen.insert(key.clone());
        keys.push(key);
    }

    keys
}

/// Concatenate tables, aligning columns by header name.
pub fn concat_tables(tables: &[RawTable]) -> RawTable {
    let mut headers: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let keyed: Vec<Vec<String>> = tables.iter().map(|t| column_keys(&t.headers)).collect();
    for keys in &keyed {
        for key in keys {
            if !positions.contains_key(key) {
                positions.insert(key.clone(), headers.len());
                headers.push(key.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(tables.iter().map(RawTable::len).sum());
    for (table, keys) in tables.iter().zip(&keyed) {
        let targets: Vec<usize> = keys.iter().map(|k| positions[k]).collect();
        for row_idx in 0..table.len() {
            let mut row = vec![Data::Empty; headers.len()];
            for (col, &target) in targets.iter().enumerate() {
                row[target] = table.cell(row_idx, col).clone();
            }
            rows.push(row);
        }
    }

    RawTable::new(headers, rows)
}

/// Write a raw table as-is, header first.
pub fn write_raw_table(table: &RawTable, path: &Path) -> Result<(), PipelineError> {
    let export_err = |e: XlsxError| PipelineError::Export {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_raw_sheet(worksheet, table).map_err(export_err)?;
    workbook.save(path).map_err(export_err)?;
    Ok(())
}

fn write_raw_sheet(ws: &mut Worksheet, table: &RawTable) -> Result<(), XlsxError> {
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, header) in table.headers.iter().enumerate() {
        ws.write_string(0, col as u16, header)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Data::Empty | Data::Error(_) => {}
                Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
                    ws.write_string(r, c, s)?;
                }
                Data::Float(f) => {
                    ws.write_number(r, c, *f)?;
                }
                Data::Int(i) => {
                    ws.write_number(r, c, *i as f64)?;
                }
                Data::Bool(b) => {
                    ws.write_boolean(r, c, *b)?;
                }
                Data::DateTime(dt) => {
                    ws.write_number_with_format(r, c, dt.as_f64(), &datetime_format)?;
                }
            }
        }
    }

    Ok(())
}

/// Merge every export in the input folder into `<output_dir>/<merged_file_name>`.
pub fn merge_workspace(workspace: &WorkspaceConfig) -> Result<MergeSummary, PipelineError> {
    ensure_workspace(workspace)?;

    let inputs = discover_inputs(&workspace.input_dir, &workspace.merged_file_name)?;
    if inputs.is_empty() {
        warn!(dir = %workspace.input_dir.display(), "No spreadsheets found to merge");
        return Ok(MergeSummary::default());
    }

    let mut outcomes = Vec::with_capacity(inputs.len());
    let mut tables = Vec::new();

    for path in inputs {
        match read_table(&path) {
            Ok(table) => {
                info!(file = %path.display(), rows = table.len(), "Read export");
                outcomes.push(FileOutcome {
                    path,
                    result: Ok(table.len()),
                });
                tables.push(table);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable export");
                outcomes.push(FileOutcome {
                    path,
                    result: Err(e.to_string()),
                });
            }
        }
    }

    if tables.is_empty() {
        warn!("No export could be read, consolidated file not written");
        return Ok(MergeSummary {
            outcomes,
            output: None,
            total_rows: 0,
        });
    }

    let merged = concat_tables(&tables);
    let output = workspace.merged_path();
    write_raw_table(&merged, &output)?;

    info!(
        output = %output.display(),
        files = tables.len(),
        rows = merged.len(),
        "Consolidated file written"
    );

    Ok(MergeSummary {
        outcomes,
        output: Some(output),
        total_rows: merged.len(),
    })
}
