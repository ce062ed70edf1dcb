use std::io;

use thiserror::Error;

/// A structure or cell method failed for reasons other than "no evidence".
///
/// The pipeline records these per table and keeps going with the remaining
/// methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{method}: {message}")]
pub struct MethodError {
    pub method: String,
    pub message: String,
}

impl MethodError {
    #[must_use]
    pub fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("pipeline needs at least one structure method")]
    NoStructureMethods,

    #[error("pipeline needs at least one cell extraction method")]
    NoCellMethods,

    #[error("method name '{0}' is registered more than once")]
    DuplicateMethod(String),

    #[error("confidence multiplier for '{method}' must be a finite value >= 0 (got {value})")]
    InvalidMultiplier { method: String, value: f64 },

    #[error("activation rule names unknown structure method '{0}'")]
    UnknownMethod(String),
}

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid weights file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("evaluation store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode store record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("page {0} does not exist in the document")]
    UnknownPage(u32),

    #[error("invalid region: {0}")]
    InvalidRegion(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid utf-8 in CSV output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
