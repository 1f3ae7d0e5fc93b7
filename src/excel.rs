//! Spreadsheet ingestion for question banks and submission sheets

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use log::info;

use crate::error::{MucherError, MucherResult};
use crate::pool::{pool_from_sheets, QuestionPool};

/// Load the question bank into a normalized pool.
///
/// An xlsx workbook maps one sheet to one category. A csv file holds a
/// single category named after the file stem.
pub fn load_question_pool(path: &Path) -> MucherResult<QuestionPool> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    info!("Parsing questions from {}", path.display());
    let sheets = match extension.as_str() {
        "xlsx" | "xls" => workbook_sheets(path)?,
        "csv" => vec![(file_stem(path), csv_rows(path)?)],
        _ => {
            return Err(MucherError::UnsupportedFormat {
                path: path.display().to_string(),
            })
        }
    };

    let pool = pool_from_sheets(&sheets)?;
    info!(
        "Parsed {} question categories ({} variants)",
        pool.len(),
        pool.question_count()
    );
    Ok(pool)
}

/// Load a submission sheet as raw rows of trimmed cell strings.
/// The first sheet of an xlsx workbook is used; csv is read as-is.
pub fn load_sheet_rows(path: &Path) -> MucherResult<Vec<Vec<String>>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xls" => {
            let mut sheets = workbook_sheets(path)?;
            Ok(sheets.swap_remove(0).1)
        }
        "csv" => csv_rows(path),
        _ => Err(MucherError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// All sheets of an xlsx workbook as (name, rows) pairs, in workbook order
fn workbook_sheets(path: &Path) -> MucherResult<Vec<(String, Vec<Vec<String>>)>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let names = workbook.sheet_names().to_owned();
    if names.is_empty() {
        return Err(MucherError::EmptyWorkbook {
            path: path.display().to_string(),
        });
    }

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_string).collect())
            .collect();
        sheets.push((name, rows));
    }
    Ok(sheets)
}

fn csv_rows(path: &Path) -> MucherResult<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }
    Ok(rows)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("questions")
        .to_string()
}

/// Extract a trimmed string from an Excel cell
fn cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
        Data::Empty => String::new(),
    }
}
