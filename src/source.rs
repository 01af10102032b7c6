use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::{KpiError, Result};

/// A single cell as read from the source, before any schema is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RawCell::Empty)
    }

    /// The cell as it would appear in the sheet, used in diagnostics.
    pub fn display(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(text) => text.clone(),
            RawCell::Number(number) => number.to_string(),
            RawCell::Date(date) => date.to_string(),
        }
    }
}

/// Header plus data rows of one sheet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
    /// 0-based sheet row of the first data row, for error messages.
    pub first_data_row: usize,
}

impl RawSheet {
    /// Splits full sheet rows at `header_row`; rows above it are discarded.
    pub fn from_rows(mut rows: Vec<Vec<RawCell>>, header_row: usize) -> Self {
        if header_row >= rows.len() {
            return RawSheet {
                first_data_row: header_row + 1,
                ..RawSheet::default()
            };
        }
        let data = rows.split_off(header_row + 1);
        let headers = rows
            .pop()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.display().trim().to_string())
            .collect();
        RawSheet {
            headers,
            rows: data,
            first_data_row: header_row + 1,
        }
    }

    /// 1-based spreadsheet row number of a data row.
    pub fn sheet_row(&self, index: usize) -> usize {
        self.first_data_row + index + 1
    }
}

/// Reads `path` as CSV or as a workbook sheet, depending on its extension.
pub fn read_sheet(path: &Path, sheet: &str, header_row: usize) -> Result<RawSheet> {
    if !path.exists() {
        return Err(KpiError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => read_csv_rows(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path, sheet)?,
        other => {
            return Err(KpiError::Config(format!(
                "unsupported input format '{}' for {}",
                other,
                path.display()
            )))
        }
    };

    let raw = RawSheet::from_rows(rows, header_row);
    info!(
        path = %path.display(),
        columns = raw.headers.len(),
        rows = raw.rows.len(),
        "read source sheet"
    );
    Ok(raw)
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<RawCell>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(RawCell::text).collect());
    }
    Ok(rows)
}

fn read_workbook_rows(path: &Path, sheet: &str) -> Result<Vec<Vec<RawCell>>> {
    let mut workbook = open_workbook_auto(path)?;
    require_sheet(&workbook.sheet_names(), sheet)?;
    let range = workbook.worksheet_range(sheet)?;
    debug!(sheet, start = ?range.start(), "opened worksheet");
    Ok(rows_from_range(&range))
}

fn require_sheet(names: &[String], sheet: &str) -> Result<()> {
    if names.iter().any(|name| name == sheet) {
        Ok(())
    } else {
        Err(KpiError::SheetNotFound {
            sheet: sheet.to_string(),
        })
    }
}

/// Converts a worksheet range into rows. The range starts at the first used cell,
/// so leading rows and columns are padded back in to keep `header_row` aligned
/// with the sheet as a user sees it.
fn rows_from_range(range: &Range<Data>) -> Vec<Vec<RawCell>> {
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<RawCell>> = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        rows.push(cells);
    }
    rows
}

fn cell_from_data(data: &Data) -> RawCell {
    match data {
        Data::Empty => RawCell::Empty,
        Data::String(text) => RawCell::text(text.as_str()),
        Data::Int(value) => RawCell::Number(*value as f64),
        Data::Float(value) => RawCell::Number(*value),
        Data::Bool(value) => RawCell::Text(value.to_string()),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|dt| RawCell::Date(dt.date()))
            .unwrap_or(RawCell::Number(value.as_f64())),
        Data::DateTimeIso(text) => text
            .get(..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::text(text.as_str())),
        Data::DurationIso(text) => RawCell::text(text.as_str()),
        Data::Error(err) => RawCell::Text(format!("#{err:?}")),
        #[allow(unreachable_patterns)]
        _ => RawCell::Empty,
    }
}
