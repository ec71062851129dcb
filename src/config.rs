//! Process configuration
//!
//! Built once at startup from the environment (after `.env` is loaded) and passed by
//! reference to the stages that need it. Nothing below `main` reads env vars.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PipelineError;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// PostgreSQL caps bind parameters at 65535 and a listing binds 8 values.
pub const MAX_BATCH_SIZE: usize = 8000;

pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 30;
pub const DEFAULT_CONNECT_DELAY_SECS: u64 = 2;

pub const DEFAULT_API_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Full connection string; takes precedence over the individual parts
    pub url_override: Option<String>,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        match &self.url_override {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }

    /// Connection target without credentials, for logs
    pub fn redacted(&self) -> String {
        match &self.url_override {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitMode {
    /// Schema guard and every batch share one transaction
    SingleTransaction,
    /// Each batch commits on its own
    PerBatch,
}

impl std::str::FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" | "single-transaction" => Ok(CommitMode::SingleTransaction),
            "per-batch" | "batch" => Ok(CommitMode::PerBatch),
            other => Err(format!(
                "unknown commit mode '{}' (expected 'single' or 'per-batch')",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    pub source_path: PathBuf,
    pub batch_size: usize,
    pub commit_mode: CommitMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub merged_file_name: String,
}

impl WorkspaceConfig {
    pub fn merged_path(&self) -> PathBuf {
        self.output_dir.join(&self.merged_file_name)
    }
}

/// Read API settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Browser origin allowed by CORS; any origin when unset
    pub cors_origin: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub connect_retry: RetryConfig,
    pub workspace: WorkspaceConfig,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            host: get_or("POSTGRES_HOST", "db"),
            port: parse_var("POSTGRES_PORT", get("POSTGRES_PORT"), 5432)?,
            user: get_or("POSTGRES_USER", "appuser"),
            password: get_or("POSTGRES_PASSWORD", "apppass"),
            name: get_or("POSTGRES_DB", "appdb"),
            url_override: get("DATABASE_URL"),
        };

        let batch_size = parse_var("INGEST_BATCH_SIZE", get("INGEST_BATCH_SIZE"), DEFAULT_BATCH_SIZE)?;
        validate_batch_size(batch_size)?;

        let commit_mode = match get("INGEST_COMMIT_MODE") {
            Some(raw) => raw
                .parse::<CommitMode>()
                .map_err(|message| PipelineError::Config { message })?,
            None => CommitMode::SingleTransaction,
        };

        let ingest = IngestConfig {
            source_path: PathBuf::from(get_or("SOURCE_PATH", "/data/todos.xlsx")),
            batch_size,
            commit_mode,
        };

        let attempts = parse_var(
            "DB_CONNECT_ATTEMPTS",
            get("DB_CONNECT_ATTEMPTS"),
            DEFAULT_CONNECT_ATTEMPTS,
        )?;
        if attempts == 0 {
            return Err(PipelineError::Config {
                message: "DB_CONNECT_ATTEMPTS must be at least 1".to_string(),
            });
        }
        let delay_secs = parse_var(
            "DB_CONNECT_DELAY_SECS",
            get("DB_CONNECT_DELAY_SECS"),
            DEFAULT_CONNECT_DELAY_SECS,
        )?;

        let workspace = WorkspaceConfig {
            input_dir: PathBuf::from(get_or("INPUT_DIR", "entrada")),
            output_dir: PathBuf::from(get_or("OUTPUT_DIR", "saida")),
            merged_file_name: get_or("MERGED_FILE_NAME", "todos.xlsx"),
        };

        let api = ApiConfig {
            bind_addr: get_or("API_BIND_ADDR", DEFAULT_API_BIND_ADDR),
            cors_origin: get("API_CORS_ORIGIN"),
        };

        Ok(Self {
            database,
            ingest,
            connect_retry: RetryConfig {
                attempts,
                delay: Duration::from_secs(delay_secs),
            },
            workspace,
            api,
        })
    }
}

pub fn validate_batch_size(batch_size: usize) -> Result<(), PipelineError> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(PipelineError::Config {
            message: format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, batch_size
            ),
        });
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T, PipelineError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|_| PipelineError::Config {
            message: format!("{} has an invalid value: '{}'", key, value),
        }),
    }
}
