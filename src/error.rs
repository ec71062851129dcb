//! Error types shared by every pipeline stage

use std::path::PathBuf;

/// Exit status for failures that a plain re-run may fix (sysexits `EX_TEMPFAIL`)
pub const EXIT_RETRYABLE: i32 = 75;

/// Exit status for failures that need a fixed input or configuration
pub const EXIT_FATAL: i32 = 1;

#[derive(Debug)]
pub enum PipelineError {
    /// The expected spreadsheet does not exist
    SourceNotFound { path: PathBuf },
    /// The file exists but could not be read as a spreadsheet
    SourceRead { path: PathBuf, message: String },
    /// Required source columns are absent
    Schema { missing: Vec<String> },
    /// Rows that cannot be upserted (1-based positions in the normalized sequence)
    InvalidRows { positions: Vec<usize> },
    /// Rows whose prices do not fit the `NUMERIC(12, 2)` columns
    PriceOutOfRange { positions: Vec<usize> },
    /// The destination store could not be reached
    Connectivity { attempts: u32, message: String },
    /// A batch failed to commit
    Write {
        batch: usize,
        committed_rows: usize,
        message: String,
    },
    /// The database refused the data of a batch (SQLSTATE class 22 or 23)
    Rejected {
        batch: usize,
        committed_rows: usize,
        message: String,
    },
    Config { message: String },
    Export { path: PathBuf, message: String },
    Io { path: PathBuf, message: String },
    /// Interactive prompt could not read from the terminal
    Console { message: String },
    /// A report could not be rendered
    Render { message: String },
    /// The read API could not start or stopped with an error
    Serve { message: String },
}

impl PipelineError {
    /// Connectivity and write failures leave the store consistent, so the whole run
    /// can simply be executed again. Rejected data fails the same way on every run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Connectivity { .. } | PipelineError::Write { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_retryable() {
            EXIT_RETRYABLE
        } else {
            EXIT_FATAL
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::SourceNotFound { path } => {
                write!(f, "Source file not found: {}", path.display())
            }
            PipelineError::SourceRead { path, message } => {
                write!(f, "Failed to read spreadsheet {}: {}", path.display(), message)
            }
            PipelineError::Schema { missing } => {
                write!(f, "Missing columns in source: {}", missing.join(", "))
            }
            PipelineError::InvalidRows { positions } => {
                write!(
                    f,
                    "{} row(s) without identifier (rows {})",
                    positions.len(),
                    list_positions(positions)
                )
            }
            PipelineError::PriceOutOfRange { positions } => {
                write!(
                    f,
                    "{} row(s) with a price of 10000000000 or more (rows {})",
                    positions.len(),
                    list_positions(positions)
                )
            }
            PipelineError::Connectivity { attempts, message } => write!(
                f,
                "Database unreachable after {} attempt(s): {}",
                attempts, message
            ),
            PipelineError::Write {
                batch,
                committed_rows,
                message,
            } => write!(
                f,
                "Batch {} failed ({} rows already committed): {}",
                batch, committed_rows, message
            ),
            PipelineError::Rejected {
                batch,
                committed_rows,
                message,
            } => write!(
                f,
                "Batch {} rejected by the database ({} rows already committed): {}",
                batch, committed_rows, message
            ),
            PipelineError::Config { message } => write!(f, "Invalid config: {}", message),
            PipelineError::Export { path, message } => {
                write!(f, "Failed to write {}: {}", path.display(), message)
            }
            PipelineError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
            PipelineError::Console { message } => write!(f, "Console input failed: {}", message),
            PipelineError::Render { message } => write!(f, "Failed to render report: {}", message),
            PipelineError::Serve { message } => write!(f, "API server error: {}", message),
        }
    }
}

fn list_positions(positions: &[usize]) -> String {
    let shown: Vec<String> = positions.iter().take(20).map(|p| p.to_string()).collect();
    let more = if positions.len() > 20 { ", ..." } else { "" };
    format!("{}{}", shown.join(", "), more)
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let conn = PipelineError::Connectivity {
            attempts: 30,
            message: "refused".to_string(),
        };
        let write = PipelineError::Write {
            batch: 2,
            committed_rows: 1000,
            message: "deadlock".to_string(),
        };
        let schema = PipelineError::Schema {
            missing: vec!["Preço".to_string()],
        };

        assert!(conn.is_retryable());
        assert!(write.is_retryable());
        assert!(!schema.is_retryable());
        assert_eq!(conn.exit_code(), EXIT_RETRYABLE);
        assert_eq!(schema.exit_code(), EXIT_FATAL);
    }

    #[test]
    fn test_schema_error_names_columns() {
        let err = PipelineError::Schema {
            missing: vec!["Preço".to_string(), "Título".to_string()],
        };
        assert_eq!(err.to_string(), "Missing columns in source: Preço, Título");
    }

    #[test]
    fn test_invalid_rows_message_is_truncated() {
        let err = PipelineError::InvalidRows {
            positions: (1..=25).collect(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("25 row(s) without identifier"));
        assert!(msg.ends_with(", ...)"));
    }

    #[test]
    fn test_rejected_data_and_console_errors_are_fatal() {
        let rejected = PipelineError::Rejected {
            batch: 1,
            committed_rows: 0,
            message: "numeric field overflow".to_string(),
        };
        let prices = PipelineError::PriceOutOfRange { positions: vec![3] };
        let console = PipelineError::Console {
            message: "not a terminal".to_string(),
        };

        assert_eq!(rejected.exit_code(), EXIT_FATAL);
        assert_eq!(prices.exit_code(), EXIT_FATAL);
        assert_eq!(console.exit_code(), EXIT_FATAL);
        assert_eq!(
            prices.to_string(),
            "1 row(s) with a price of 10000000000 or more (rows 3)"
        );
        assert_eq!(console.to_string(), "Console input failed: not a terminal");
    }
}
