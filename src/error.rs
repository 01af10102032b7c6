use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("input file '{}' not found", path.display())]
    InputNotFound { path: PathBuf },

    #[error("missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("sheet '{sheet}' not found in workbook")]
    SheetNotFound { sheet: String },

    #[error("row {row}, column '{column}': cannot read '{value}' ({reason})")]
    Value {
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl KpiError {
    /// True when the source artifact itself is absent, as opposed to present but unusable.
    pub fn is_input_not_found(&self) -> bool {
        matches!(self, KpiError::InputNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, KpiError>;
