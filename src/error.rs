use thiserror::Error;

/// Hard failures: anything that stops a file from loading or an export
/// from being written. Per-row billing problems are never errors.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("file read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel parse failed: {0}")]
    Excel(String),

    #[error("config parse failed: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config validation failed: {0}")]
    ConfigValidation(String),

    #[error("JSON write failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<calamine::Error> for ReconError {
    fn from(err: calamine::Error) -> Self {
        ReconError::Excel(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
