//! Error types for exam generation and grading

use thiserror::Error;

/// Fatal errors: malformed inputs, external-tool failures, contract violations
#[derive(Debug, Error)]
pub enum MucherError {
    #[error("workbook has no sheets: {path}")]
    EmptyWorkbook { path: String },

    #[error("sheet '{sheet}' has no question rows")]
    EmptyCategory { sheet: String },

    #[error("malformed question in sheet '{sheet}' row {row}: {reason}")]
    MalformedQuestion {
        sheet: String,
        row: usize,
        reason: String,
    },

    #[error("category '{category}' has {available} variants but {requested} were requested")]
    UsageExceedsPool {
        category: String,
        requested: u32,
        available: usize,
    },

    #[error("generator invocation failed: {0}")]
    GeneratorInvocation(String),

    #[error("generator output inconsistent: {0}")]
    GeneratorOutputInconsistent(String),

    #[error("duplicate serial number {0} in generator output")]
    DuplicateSerial(u64),

    #[error("answer key artifact malformed ({path}): {reason}")]
    KeyArtifactMalformed { path: String, reason: String },

    #[error("submission file has no rows: {path}")]
    EmptySubmissions { path: String },

    #[error("unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result type
pub type MucherResult<T> = Result<T, MucherError>;

/// Per-row submission errors. Recoverable: they are accumulated while the
/// remaining rows still grade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("row {row}: serial {serial} is not in the answer key")]
    UnknownSerial { row: usize, serial: u64 },

    #[error("row {row}: {reason}")]
    MalformedSubmission { row: usize, reason: String },
}

impl SubmissionError {
    /// Source row the error refers to (1-based, header included)
    pub fn row(&self) -> usize {
        match self {
            SubmissionError::UnknownSerial { row, .. } => *row,
            SubmissionError::MalformedSubmission { row, .. } => *row,
        }
    }
}
